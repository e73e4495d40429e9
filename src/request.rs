//! Header Scanner: locate and extract named headers and the request-target
//! from a raw byte buffer containing (at least) the request-header block.

const CRLFCRLF: &[u8] = b"\r\n\r\n";

/// Case-insensitive byte comparison of two equal-length slices.
fn eq_ignore_case(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// First offset at which `needle` occurs in `haystack`, case-insensitively.
fn find_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| eq_ignore_case(&haystack[i..i + needle.len()], needle))
}

/// First offset at which `needle` occurs, case-sensitively.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

/// Offset of the start of the first `\r\n\r\n` in `buf`, if any.
///
/// The key length stored with a cache entry is `terminator_offset + 4`.
pub fn locate_header_terminator(buf: &[u8]) -> Option<usize> {
    find(buf, CRLFCRLF)
}

/// Extracts the `Host:` header value.
///
/// Matches a line beginning `Host:` (case-insensitive) either at buffer
/// start or immediately after a `\n`. Fails if no such header, or no CRLF
/// terminates its line.
pub fn extract_host(buf: &[u8]) -> Option<&[u8]> {
    let name = b"Host:";
    let mut search_from = 0;
    loop {
        let rel = find_ci(&buf[search_from..], name)?;
        let pos = search_from + rel;
        if pos == 0 || buf[pos - 1] == b'\n' {
            let mut value_start = pos + name.len();
            while value_start < buf.len() && (buf[value_start] == b' ' || buf[value_start] == b'\t') {
                value_start += 1;
            }
            let rel_end = find(&buf[value_start..], b"\r\n")?;
            return Some(&buf[value_start..value_start + rel_end]);
        }
        // Candidate matched "Host:" but not at a line start; keep scanning
        // past it for another occurrence.
        search_from = pos + 1;
        if search_from >= buf.len() {
            return None;
        }
    }
}

/// Extracts the request-target (the URI/path) from the request-line.
///
/// Takes the substring between the first and second ASCII space on the
/// first line. Fails if either space is missing or lands past the line's
/// CRLF.
pub fn extract_request_target(buf: &[u8]) -> Option<&[u8]> {
    let line_end = find(buf, b"\r\n")?;
    let line = &buf[..line_end];
    let first_space = line.iter().position(|&b| b == b' ')?;
    let second_space = line[first_space + 1..].iter().position(|&b| b == b' ')? + first_space + 1;
    Some(&line[first_space + 1..second_space])
}

/// The last header line before the CRLFCRLF terminator, for the `Request
/// tail` diagnostic. Walks backward from `terminator_offset` to the
/// preceding CRLF (see DESIGN.md for the boundary-case resolution).
pub fn last_header_line(buf: &[u8], terminator_offset: usize) -> &[u8] {
    let mut start = terminator_offset;
    while start > 0 && !(start >= 2 && buf[start - 2] == b'\r' && buf[start - 1] == b'\n') {
        start -= 1;
    }
    &buf[start..terminator_offset]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_host_at_buffer_start() {
        let req = b"Host: example.com\r\n\r\n";
        assert_eq!(extract_host(req), Some(&b"example.com"[..]));
    }

    #[test]
    fn finds_host_after_request_line_case_insensitive() {
        let req = b"GET /a HTTP/1.1\r\nhOsT:   example.com\r\nX-Other: 1\r\n\r\n";
        assert_eq!(extract_host(req), Some(&b"example.com"[..]));
    }

    #[test]
    fn rejects_host_without_leading_boundary() {
        // "XHost:" does not start a line, so it must not match.
        let req = b"GET / HTTP/1.1\r\nXHost: nope\r\nHost: real.example\r\n\r\n";
        assert_eq!(extract_host(req), Some(&b"real.example"[..]));
    }

    #[test]
    fn missing_host_fails() {
        let req = b"GET / HTTP/1.1\r\n\r\n";
        assert_eq!(extract_host(req), None);
    }

    #[test]
    fn extracts_request_target() {
        let req = b"GET /a/b?c=1 HTTP/1.1\r\nHost: h\r\n\r\n";
        assert_eq!(extract_request_target(req), Some(&b"/a/b?c=1"[..]));
    }

    #[test]
    fn request_target_requires_two_spaces_before_crlf() {
        let req = b"GET-ONLY-NO-SPACES\r\nHost: h\r\n\r\n";
        assert_eq!(extract_request_target(req), None);
    }

    #[test]
    fn header_terminator_located() {
        let req = b"GET / HTTP/1.1\r\nHost: h\r\n\r\n";
        let off = locate_header_terminator(req).unwrap();
        assert_eq!(&req[off..off + 4], b"\r\n\r\n");
        assert_eq!(off + 4, req.len());
    }

    #[test]
    fn last_line_single_header_line_returns_the_request_line() {
        let req = b"GET / HTTP/1.1\r\n\r\n";
        let off = locate_header_terminator(req).unwrap();
        assert_eq!(last_header_line(req, off), &b"GET / HTTP/1.1"[..]);
    }

    #[test]
    fn last_line_returns_final_header_line() {
        let req = b"GET / HTTP/1.1\r\nHost: h\r\nX-Foo: bar\r\n\r\n";
        let off = locate_header_terminator(req).unwrap();
        assert_eq!(last_header_line(req, off), &b"X-Foo: bar"[..]);
    }
}
