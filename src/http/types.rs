//! Core HTTP protocol value types: method, version, status line, URL and
//! header storage.

#![allow(rustdoc::bare_urls)]

// TO LOWER CASE

#[rustfmt::skip]
const ASCII_TABLE: [u8; 256] = [
    //   x0    x1    x2    x3    x4    x5    x6    x7    x8    x9    xA    xB    xC    xD    xE    xF
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, // 0x
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E, 0x1F, // 1x
    0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, 0x29, 0x2A, 0x2B, 0x2C, 0x2D, 0x2E, 0x2F, // 2x
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F, // 3x
    0x40, b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h', b'i', b'j', b'k', b'l', b'm', b'n', b'o', // 4x
    b'p', b'q', b'r', b's', b't', b'u', b'v', b'w', b'x', b'y', b'z', 0x5B, 0x5C, 0x5D, 0x5E, 0x5F, // 5x
    0x60, b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h', b'i', b'j', b'k', b'l', b'm', b'n', b'o', // 6x
    b'p', b'q', b'r', b's', b't', b'u', b'v', b'w', b'x', b'y', b'z', 0x7B, 0x7C, 0x7D, 0x7E, 0x7F, // 7x
    0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x8D, 0x8E, 0x8F, // 8x
    0x90, 0x91, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0x9B, 0x9C, 0x9D, 0x9E, 0x9F, // 9x
    0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, // Ax
    0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xBB, 0xBC, 0xBD, 0xBE, 0xBF, // Bx
    0xC0, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xCB, 0xCC, 0xCD, 0xCE, 0xCF, // Cx
    0xD0, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE, 0xDF, // Dx
    0xE0, 0xE1, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xEB, 0xEC, 0xED, 0xEE, 0xEF, // Ex
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF, // Fx
];

#[inline(always)]
pub(crate) fn to_lower_case(src: &mut [u8]) {
    for byte in src.iter_mut() {
        *byte = ASCII_TABLE[*byte as usize];
    }
}

/// True iff `byte` belongs to the RFC 7230 §3.2.6 `token` character class.
#[inline(always)]
pub(crate) fn is_token_char(byte: u8) -> bool {
    matches!(byte,
        b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~'
    )
}

/// True iff `byte` is printable ASCII (0x21-0x7E), the grammar allowed
/// for origin-form and absolute-form request-targets.
#[inline(always)]
pub(crate) fn is_target_char(byte: u8) -> bool {
    (0x21..=0x7E).contains(&byte)
}

/// True iff `byte` is valid inside a header field-value: VCHAR,
/// obs-text, SP or HTAB.
#[inline(always)]
pub(crate) fn is_field_value_char(byte: u8) -> bool {
    matches!(byte, 0x21..=0x7E | 0x80..=0xFF | b' ' | b'\t')
}

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result.checked_mul(10)?.checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

/// Request method as a zero-copy byte sequence (RFC 7230 §3.2.6 token
/// grammar; no enumerated whitelist — see DESIGN.md Open Question 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method(pub(crate) &'static [u8]);

impl Method {
    pub fn as_bytes(&self) -> &'static [u8] {
        self.0
    }

    /// Cached per spec's data model: `is_head := method == "HEAD"`.
    /// Case-sensitive — the method token has no enumerated whitelist
    /// and no case-folding rule (DESIGN.md Open Question 6), so a
    /// lowercase `head` is a distinct, unrecognized method, not HEAD.
    pub fn is_head(&self) -> bool {
        self.0 == b"HEAD"
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.0))
    }
}

/// HTTP major.minor version. Major is always 1; only the minor digit
/// varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"HTTP/1.1" => Some(Version::Http11),
            b"HTTP/1.0" => Some(Version::Http10),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http11 => "HTTP/1.1",
            Version::Http10 => "HTTP/1.0",
        }
    }
}

/// Status codes this server ever emits. Kept as a closed set (unlike
/// [`Method`]) since every value is produced internally, never parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    MovedPermanently,
    BadRequest,
    Forbidden,
    NotFound,
    PayloadTooLarge,
    UriTooLong,
    TooManyRequests,
    ServiceUnavailable,
    HttpVersionNotSupported,
}

impl StatusCode {
    pub const fn status_line(self) -> &'static str {
        match self {
            StatusCode::Ok => "200 OK",
            StatusCode::MovedPermanently => "301 Moved Permanently",
            StatusCode::BadRequest => "400 Bad Request",
            StatusCode::Forbidden => "403 Forbidden",
            StatusCode::NotFound => "404 Not Found",
            StatusCode::PayloadTooLarge => "413 Payload Too Large",
            StatusCode::UriTooLong => "414 URI Too Long",
            StatusCode::TooManyRequests => "429 Too Many Requests",
            StatusCode::ServiceUnavailable => "503 Service Unavailable",
            StatusCode::HttpVersionNotSupported => "505 HTTP Version Not Supported",
        }
    }
}

/// Request-target split into path and (optional) query, per spec §3:
/// `query` is the raw bytes after the first `?`, with no structured
/// parameter parsing (the teacher's `QueryCollector` machinery is
/// dropped — see DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct Url {
    pub(crate) path: &'static [u8],
    pub(crate) query: Option<&'static [u8]>,
}

impl Url {
    /// Splits `target` into `path` (up to but excluding the first `?`)
    /// and `query` (everything after it, possibly containing further
    /// `?` characters, possibly empty).
    pub(crate) fn split(target: &'static [u8]) -> Self {
        match memchr::memchr(b'?', target) {
            Some(pos) => Url {
                path: &target[..pos],
                query: Some(&target[pos + 1..]),
            },
            None => Url {
                path: target,
                query: None,
            },
        }
    }

    pub fn path(&self) -> &str {
        std::str::from_utf8(self.path).unwrap_or("")
    }

    pub fn query(&self) -> Option<&str> {
        self.query.map(|q| std::str::from_utf8(q).unwrap_or(""))
    }

    pub(crate) fn set_path(&mut self, path: &'static [u8]) {
        self.path = path;
    }
}

/// Insertion-ordered header storage with case-insensitive lookup.
/// Stored names are already lowercased by the parser; duplicates are
/// preserved (per DESIGN.md Open Question 4) except where the caller
/// enforces singleness itself (Host).
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(&'static [u8], &'static [u8])>,
}

impl HeaderMap {
    pub(crate) fn new() -> Self {
        HeaderMap {
            entries: Vec::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn insert(&mut self, name: &'static [u8], value: &'static [u8]) {
        self.entries.push((name, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value for `name` (case-insensitive), if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.as_bytes()))
            .and_then(|(_, v)| std::str::from_utf8(v).ok())
    }

    /// All values for `name` (case-insensitive), insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name.as_bytes()))
            .filter_map(|(_, v)| std::str::from_utf8(v).ok())
    }

    /// How many header fields named `name` (case-insensitive) are
    /// present — used by the Host-header uniqueness check.
    pub fn count(&self, name: &str) -> usize {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name.as_bytes()))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(|(n, v)| (*n, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_splits_on_first_question_mark() {
        let url = Url::split(b"/a/b?x=1?y=2");
        assert_eq!(url.path(), "/a/b");
        assert_eq!(url.query(), Some("x=1?y=2"));
    }

    #[test]
    fn url_without_query() {
        let url = Url::split(b"/a/b");
        assert_eq!(url.path(), "/a/b");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn method_is_head_is_case_sensitive() {
        assert!(Method(b"HEAD").is_head());
        assert!(!Method(b"GET").is_head());
        assert!(!Method(b"head").is_head());
        assert!(!Method(b"Head").is_head());
    }

    #[test]
    fn header_map_case_insensitive_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert(b"host", b"example.org");
        assert_eq!(headers.get("Host"), Some("example.org"));
        assert_eq!(headers.get("HOST"), Some("example.org"));
        assert_eq!(headers.count("host"), 1);
    }

    #[test]
    fn header_map_preserves_duplicates() {
        let mut headers = HeaderMap::new();
        headers.insert(b"x-a", b"1");
        headers.insert(b"x-a", b"2");
        assert_eq!(headers.get_all("x-a").collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn version_from_exact_literal() {
        assert_eq!(Version::from_bytes(b"HTTP/1.1"), Some(Version::Http11));
        assert_eq!(Version::from_bytes(b"HTTP/1.0"), Some(Version::Http10));
        assert_eq!(Version::from_bytes(b"HTTP/2.0"), None);
    }
}
