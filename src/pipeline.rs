//! Request Pipeline: per-connection orchestration. Reads
//! one request, consults the cache, forwards to the origin if needed,
//! streams the response back while accumulating a bounded copy, and
//! commits (or refuses) that copy to the cache — all before returning, so
//! a connection never holds a response hostage while deciding
//! cacheability.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::cache::directives;
use crate::cache::{CacheEngine, Lookup, MAX_KEY_BYTES};
use crate::error::{ProxyError, ProxyResult};
use crate::request;

const MAX_REQUEST_SIZE: usize = 64 * 1024;
const READ_CHUNK: usize = 64 * 1024;

fn log(line: &str) {
    println!("{line}");
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

/// Reads one request's header block from `stream` into a fresh buffer,
/// stopping at the first CRLFCRLF or at `MAX_REQUEST_SIZE`. A body (if
/// any) that arrived in the same reads is left in the tail of the buffer
/// but never forwarded or counted in the key.
async fn read_request_headers(stream: &mut TcpStream) -> ProxyResult<(Vec<u8>, usize)> {
    let mut buf = Vec::with_capacity(4096);
    loop {
        if let Some(terminator) = request::locate_header_terminator(&buf) {
            return Ok((buf, terminator));
        }
        if buf.len() >= MAX_REQUEST_SIZE {
            return Err(ProxyError::Malformed("request header exceeds buffer size"));
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ProxyError::Malformed("connection closed before headers completed"));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Finds `Content-Length:` within a response-header prefix the same way
/// the Directive Parser locates `Cache-Control:` — case-insensitive, at a
/// line start.
fn extract_content_length(header_prefix: &[u8]) -> Option<u64> {
    let name = b"Content-Length:";
    if header_prefix.len() < name.len() {
        return None;
    }
    let mut pos = 0;
    loop {
        if pos > header_prefix.len() - name.len() {
            return None;
        }
        let at_line_start = pos == 0 || header_prefix[pos - 1] == b'\n';
        if at_line_start && header_prefix[pos..pos + name.len()].eq_ignore_ascii_case(name) {
            let mut start = pos + name.len();
            while start < header_prefix.len() && header_prefix[start] == b' ' {
                start += 1;
            }
            let end = header_prefix[start..]
                .iter()
                .position(|b| !b.is_ascii_digit())
                .map_or(header_prefix.len(), |r| start + r);
            if end == start {
                return None;
            }
            return std::str::from_utf8(&header_prefix[start..end]).ok()?.parse().ok();
        }
        pos += 1;
    }
}

struct ResponseCommit {
    accumulator: Option<Vec<u8>>,
    header_prefix_for_directives: Vec<u8>,
}

/// STREAM_RESPONSE: reads the origin's response, forwarding every chunk to
/// the client immediately and, if caching applies, appending it to a
/// growable accumulator. Termination is driven by `Content-Length` once
/// the response header is known, or by the origin closing the connection.
async fn stream_response(
    client: &mut TcpStream,
    origin: &mut TcpStream,
    key_len: usize,
    caching_enabled: bool,
) -> ProxyResult<ResponseCommit> {
    let mut accumulator = if caching_enabled && key_len <= MAX_KEY_BYTES {
        Some(Vec::with_capacity(READ_CHUNK))
    } else {
        None
    };

    let mut header_acc: Vec<u8> = Vec::new();
    let mut header_complete = false;
    let mut header_bytes_forwarded = 0u64;
    let mut content_length: Option<u64> = None;
    let mut total_forwarded: u64 = 0;

    loop {
        let mut chunk = [0u8; READ_CHUNK];
        let bytes_read = match origin.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let chunk = &chunk[..bytes_read];

        if let Some(acc) = accumulator.as_mut() {
            if acc.try_reserve(chunk.len()).is_ok() {
                acc.extend_from_slice(chunk);
            } else {
                accumulator = None;
            }
        }

        if !header_complete && header_acc.len() < MAX_REQUEST_SIZE {
            let room = MAX_REQUEST_SIZE - header_acc.len();
            let take = room.min(chunk.len());
            header_acc.extend_from_slice(&chunk[..take]);

            if let Some(off) = request::locate_header_terminator(&header_acc) {
                header_complete = true;
                header_bytes_forwarded = (off + 4) as u64;
                if let Some(len) = extract_content_length(&header_acc[..off]) {
                    content_length = Some(len);
                    log(&format!("Response body length {len}"));
                }
            }
        }

        client.write_all(chunk).await?;
        total_forwarded += bytes_read as u64;

        if header_complete {
            if let Some(len) = content_length {
                if total_forwarded >= header_bytes_forwarded + len {
                    break;
                }
            }
        }
    }

    Ok(ResponseCommit { accumulator, header_prefix_for_directives: header_acc })
}

/// COMMIT: admits or refuses the just-streamed response, taking the
/// stale-replacement branch when the lookup found a stale
/// match for this key.
fn commit_response(
    engine: &mut CacheEngine,
    stale_index: Option<usize>,
    response: ResponseCommit,
    key: &[u8],
    host: &str,
    uri: &str,
) {
    let Some(value) = response.accumulator else {
        // Accumulator was dropped after a failed allocation; this request
        // simply never becomes cacheable. No diagnostic line: this is a
        // resource-exhaustion outcome, not a cacheability refusal.
        return;
    };

    if value.len() > crate::cache::MAX_VALUE_BYTES {
        if let Some(idx) = stale_index {
            engine.release_stale(idx);
        }
        return;
    }

    if directives::is_cacheable(&response.header_prefix_for_directives) {
        let max_age = directives::extract_max_age(&response.header_prefix_for_directives);
        if let Some(idx) = stale_index {
            engine.replace_stale(idx, key, &value, host, uri, max_age);
        } else {
            engine.admit(key, &value, host, uri, max_age);
        }
    } else {
        if let Some(idx) = stale_index {
            engine.release_stale(idx);
        }
        log(&format!("Not caching {host} {uri}"));
    }
}

/// Services exactly one request on `stream` from READ_REQUEST through
/// COMMIT, then returns. `cache` is `None` when caching is disabled.
pub async fn handle_connection(stream: &mut TcpStream, cache: &mut Option<CacheEngine>) -> ProxyResult<()> {
    let (buf, terminator) = read_request_headers(stream).await?;
    let key_len = terminator + 4;
    let header_block = &buf[..key_len];

    let last_line = request::last_header_line(&buf, terminator);
    log(&format!("Request tail {}", String::from_utf8_lossy(last_line)));

    let host_bytes = request::extract_host(header_block).ok_or(ProxyError::Malformed("no Host header"))?;
    let host = String::from_utf8_lossy(host_bytes).into_owned();

    let uri_bytes =
        request::extract_request_target(header_block).ok_or(ProxyError::Malformed("invalid request-line"))?;
    let uri = String::from_utf8_lossy(uri_bytes).into_owned();

    let key = buf[..key_len].to_vec();

    let mut stale_index: Option<usize> = None;
    if let Some(engine) = cache.as_mut() {
        if key_len <= MAX_KEY_BYTES {
            match engine.lookup(&key) {
                Lookup::Fresh(idx) => {
                    log(&format!("Serving {host} {uri} from cache"));
                    let response = engine
                        .entry(idx)
                        .expect("lookup returned a valid index")
                        .response_bytes
                        .clone();
                    stream.write_all(&response).await?;
                    return Ok(());
                }
                Lookup::Stale(idx) => stale_index = Some(idx),
                Lookup::Miss => {
                    engine.prepare_eviction_if_needed(key_len);
                }
            }
        }
    }

    log(&format!("GETting {host} {uri}"));
    let mut origin = crate::net::connect_to_origin(&host).await?;
    origin.write_all(&key).await?;

    let caching_enabled = cache.is_some();
    let response = stream_response(stream, &mut origin, key_len, caching_enabled).await?;

    if let Some(engine) = cache.as_mut() {
        commit_response(engine, stale_index, response, &key, &host, &uri);
    }

    Ok(())
}
