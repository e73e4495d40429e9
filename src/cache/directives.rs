//! Directive Parser: Cache-Control cacheability verdict and max-age
//! extraction, per RFC 7234.

const CRLFCRLF: &[u8] = b"\r\n\r\n";
const CRLF: &[u8] = b"\r\n";
const CACHE_CONTROL: &[u8] = b"Cache-Control:";

/// Directives that make a response non-cacheable, with their byte length.
const DISALLOWED: &[&[u8]] = &[
    b"private",
    b"no-store",
    b"no-cache",
    b"must-revalidate",
    b"proxy-revalidate",
];

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn find_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

fn starts_with_ci(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// The parser only ever inspects the prefix of `response_header` up to the
/// first CRLFCRLF, regardless of what follows it (a body, or nothing).
fn header_prefix(response_header: &[u8]) -> &[u8] {
    match find(response_header, CRLFCRLF) {
        Some(off) => &response_header[..off],
        None => response_header,
    }
}

/// Locates the value of the `Cache-Control` header within the header
/// prefix, if present. Matches the header name at buffer start or after a
/// `\n`, as the Header Scanner does for `Host`.
fn cache_control_value(prefix: &[u8]) -> Option<&[u8]> {
    let mut search_from = 0;
    loop {
        let rel = find_ci(&prefix[search_from..], CACHE_CONTROL)?;
        let pos = search_from + rel;
        if pos == 0 || prefix[pos - 1] == b'\n' {
            let mut value_start = pos + CACHE_CONTROL.len();
            while value_start < prefix.len() && matches!(prefix[value_start], b' ' | b'\t') {
                value_start += 1;
            }
            let end = match find(&prefix[value_start..], CRLF) {
                Some(rel_end) => value_start + rel_end,
                None => prefix.len(),
            };
            return Some(&prefix[value_start..end]);
        }
        search_from = pos + 1;
        if search_from >= prefix.len() {
            return None;
        }
    }
}

fn is_token_delimiter(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b',')
}

/// A directive name "matches" only if the character immediately following
/// the candidate name is a delimiter, `=`, or end-of-value.
fn matches_directive(rest: &[u8], name: &[u8]) -> bool {
    if !starts_with_ci(rest, name) {
        return false;
    }
    match rest.get(name.len()) {
        None => true,
        Some(&b) => is_token_delimiter(b) || b == b'=',
    }
}

/// `max-age=0` is matched as a literal three-token sequence: no `=`
/// continuation is accepted afterwards.
fn matches_max_age_zero(rest: &[u8]) -> bool {
    const TOKEN: &[u8] = b"max-age=0";
    if rest.len() < TOKEN.len() || !rest[..TOKEN.len()].eq_ignore_ascii_case(TOKEN) {
        return false;
    }
    matches!(rest.get(TOKEN.len()), None | Some(b' ') | Some(b'\t') | Some(b','))
}

/// Returns `false` (not cacheable) iff a Cache-Control header is present
/// and carries a disallowing directive. Absence of Cache-Control is always
/// cacheable.
pub fn is_cacheable(response_header: &[u8]) -> bool {
    let prefix = header_prefix(response_header);
    let value = match cache_control_value(prefix) {
        Some(v) => v,
        None => return true,
    };

    let mut i = 0;
    let n = value.len();
    while i < n {
        while i < n && is_token_delimiter(value[i]) {
            i += 1;
        }
        if i >= n {
            break;
        }
        if matches_max_age_zero(&value[i..]) {
            return false;
        }
        if DISALLOWED.iter().any(|name| matches_directive(&value[i..], name)) {
            return false;
        }
        while i < n && !is_token_delimiter(value[i]) {
            i += 1;
        }
    }
    true
}

/// Extracts `max-age` from Cache-Control, saturating at `u32::MAX`.
/// Returns `0` if there is no Cache-Control header, no `max-age` directive
/// token, or the value doesn't parse as a base-10 non-negative integer.
///
/// Requires `max-age` to start at a
/// token boundary (comma/whitespace/start-of-value) rather than matching
/// as a bare substring, so `no-max-age=5` does not yield `5`.
pub fn extract_max_age(response_header: &[u8]) -> u32 {
    let prefix = header_prefix(response_header);
    let value = match cache_control_value(prefix) {
        Some(v) => v,
        None => return 0,
    };

    let mut i = 0;
    let n = value.len();
    while i < n {
        while i < n && is_token_delimiter(value[i]) {
            i += 1;
        }
        if i >= n {
            break;
        }
        const NAME: &[u8] = b"max-age";
        if starts_with_ci(&value[i..], NAME) && value[i..].get(NAME.len()) == Some(&b'=') {
            let mut digits_start = i + NAME.len() + 1;
            while digits_start < n && matches!(value[digits_start], b' ' | b'\t') {
                digits_start += 1;
            }
            let digits_end = value[digits_start..]
                .iter()
                .position(|b| !b.is_ascii_digit())
                .map_or(n, |rel| digits_start + rel);
            if digits_end == digits_start {
                return 0;
            }
            let mut acc: u64 = 0;
            for &b in &value[digits_start..digits_end] {
                acc = acc.saturating_mul(10).saturating_add((b - b'0') as u64);
                if acc > u32::MAX as u64 {
                    return u32::MAX;
                }
            }
            return acc as u32;
        }
        while i < n && !is_token_delimiter(value[i]) {
            i += 1;
        }
    }
    0
}
