//! `path -> media type` as a pure function.
//!
//! Deliberately minimal: every extra entry costs a comparison on the hot
//! path for files that will never use it. Add an extension only when a
//! real deployment needs it.

/// A resolved media type: `type/subtype`, plus whether the body is
/// textual (and therefore gets a `;charset=utf-8` suffix in C5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaType {
    pub name: &'static str,
    pub is_text: bool,
}

const GENERIC: MediaType = MediaType {
    name: "application/octet-stream",
    is_text: false,
};

const TABLE: &[(&str, MediaType)] = &[
    ("css", MediaType { name: "text/css", is_text: true }),
    ("html", MediaType { name: "text/html", is_text: true }),
    ("htm", MediaType { name: "text/html", is_text: true }),
    // Microsoft's de facto image/x-icon isn't IANA-registered; use the
    // registered type like most servers besides the obvious exception.
    ("ico", MediaType { name: "image/vnd.microsoft.icon", is_text: false }),
    ("js", MediaType { name: "application/javascript", is_text: true }),
    ("json", MediaType { name: "application/json", is_text: true }),
    ("jpg", MediaType { name: "image/jpeg", is_text: false }),
    ("jpeg", MediaType { name: "image/jpeg", is_text: false }),
    ("otf", MediaType { name: "font/otf", is_text: false }),
    ("png", MediaType { name: "image/png", is_text: false }),
    ("svg", MediaType { name: "image/svg+xml", is_text: true }),
    ("ttf", MediaType { name: "font/ttf", is_text: false }),
    ("txt", MediaType { name: "text/plain", is_text: true }),
    ("woff", MediaType { name: "font/woff", is_text: false }),
    ("woff2", MediaType { name: "font/woff2", is_text: false }),
    ("xml", MediaType { name: "application/xml", is_text: true }),
    ("zip", MediaType { name: "application/zip", is_text: false }),
];

/// Looks up the media type for a path by its last extension. Unknown or
/// missing extensions fall back to `application/octet-stream`.
pub fn detect(path: &str) -> MediaType {
    let extension = match path.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => return GENERIC,
    };

    for (candidate, media_type) in TABLE {
        if candidate.eq_ignore_ascii_case(extension) {
            return *media_type;
        }
    }

    GENERIC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve() {
        assert_eq!(detect("index.html").name, "text/html");
        assert_eq!(detect("style.css").name, "text/css");
        assert_eq!(detect("photo.JPG").name, "image/jpeg");
    }

    #[test]
    fn unknown_extension_is_generic() {
        assert_eq!(detect("blob.bin"), GENERIC);
        assert_eq!(detect("no-extension"), GENERIC);
    }

    #[test]
    fn text_flag_drives_charset_suffix() {
        assert!(detect("a.txt").is_text);
        assert!(!detect("a.png").is_text);
    }
}
