use kiss_proxy::cache::{directives, CacheEngine, Lookup, MAX_KEY_BYTES};
use kiss_proxy::error::ProxyError;
use kiss_proxy::pipeline;
use kiss_proxy::request;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

async fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, _) = listener.accept().await.unwrap();
    (server, client)
}

#[cfg(test)]
mod oversized_request_tests {
    use super::*;

    #[tokio::test]
    async fn test_oversized_header_block_is_rejected_not_buffered_forever() {
        let (mut server, mut client) = loopback_pair().await;

        // 70 KiB of header bytes with no terminator: past MAX_REQUEST_SIZE
        // (64 KiB), so the connection must be refused rather than hang.
        let filler = vec![b'a'; 70 * 1024];
        client.write_all(b"GET /").await.unwrap();
        client.write_all(&filler).await.unwrap();
        client.write_all(b" HTTP/1.1\r\nHost: h\r\n\r\n").await.unwrap();

        let mut cache = None;
        let result = pipeline::handle_connection(&mut server, &mut cache).await;
        match result {
            Err(ProxyError::Malformed(_)) => {}
            other => panic!("expected the oversized request to be refused, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod cache_poisoning_resistance_tests {
    use super::*;

    #[test]
    fn test_key_longer_than_limit_cannot_be_admitted() {
        let mut cache = CacheEngine::new();
        let oversized_key = vec![b'x'; MAX_KEY_BYTES + 1];
        assert!(!cache.admit(&oversized_key, b"v", "h", "/u", 0));
        assert_eq!(cache.lookup(&oversized_key), Lookup::Miss);
    }

    #[test]
    fn test_two_distinct_requests_never_collide_on_a_cache_key() {
        let mut cache = CacheEngine::new();
        let a = b"GET /a HTTP/1.1\r\nHost: h\r\n\r\n";
        let b = b"GET /b HTTP/1.1\r\nHost: h\r\n\r\n";
        cache.admit(a, b"resp-a", "h", "/a", 0);

        assert_eq!(cache.lookup(b), Lookup::Miss);
        match cache.lookup(a) {
            Lookup::Fresh(idx) => assert_eq!(cache.entry(idx).unwrap().response_bytes.as_ref(), b"resp-a"),
            other => panic!("expected fresh, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod header_injection_resistance_tests {
    use super::*;

    #[test]
    fn test_host_value_extraction_stops_at_first_crlf() {
        // A Host value cannot smuggle a second header by embedding a raw CRLF:
        // `extract_host` only ever returns the bytes up to the next CRLF.
        let req = b"GET / HTTP/1.1\r\nHost: victim.example\r\nX-Injected: 1\r\n\r\n";
        assert_eq!(request::extract_host(req), Some(&b"victim.example"[..]));
    }

    #[test]
    fn test_directive_spoofing_does_not_false_positive_on_substrings() {
        let spoofed = b"HTTP/1.1 200 OK\r\nCache-Control: public-and-not-private\r\n\r\n";
        assert!(directives::is_cacheable(spoofed));

        let spoofed_max_age = b"HTTP/1.1 200 OK\r\nCache-Control: stale-max-age=999999\r\n\r\n";
        assert_eq!(directives::extract_max_age(spoofed_max_age), 0);
    }

    #[test]
    fn test_overflowing_max_age_cannot_wrap_around_to_a_small_value() {
        let h = b"HTTP/1.1 200 OK\r\nCache-Control: max-age=4294967296\r\n\r\n"; // u32::MAX + 1
        assert_eq!(directives::extract_max_age(h), u32::MAX);
    }
}
