//! Flat per-request error taxonomy and its canned-response mapping.
//!
//! Each parser/validator/resolver step returns a `Result<_, RequestError>`;
//! the exchange controller inspects it exactly once per phase and routes
//! failures through [`RequestError::as_canned_response`] rather than
//! recursing back into the normal response-assembly path.

use crate::http::types::StatusCode;
use thiserror::Error;

/// Wraps [`std::io::Error`] with a `PartialEq` that compares only the
/// error kind, since `io::Error` itself has none.
#[derive(Debug)]
pub struct IoError(pub std::io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl Eq for IoError {}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<std::io::Error> for IoError {
    fn from(value: std::io::Error) -> Self {
        IoError(value)
    }
}

/// Every way a request/response cycle can fail, mapped to a single HTTP
/// status and body by [`RequestError::as_canned_response`].
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    // --- I/O read failure: close, no response attempt. ---
    #[error("connection closed before a full request was read")]
    FailedReadEof,
    #[error("read error: {0}")]
    FailedReadIo(IoError),

    // --- Grammar violations: 400 + reason; close. ---
    #[error("method is empty")]
    EmptyMethod,
    #[error("method contains a non-token octet")]
    IncorrectMethod,
    #[error("request-target is empty")]
    InvalidPathEmpty,
    #[error("request-target contains a non-printable octet")]
    IncorrectPath,
    #[error("absolute-form request-target is malformed")]
    IncorrectPathAbsoluteForm,
    #[error("unsupported HTTP major version")]
    UnsupportedVersion,
    #[error("HTTP version literal is malformed")]
    IncorrectVersion,
    #[error("expected CRLF line ending")]
    IncorrectCrlf,
    #[error("header field-name contains a non-token octet")]
    IncorrectHeaderFieldName,
    #[error("header field-value contains an invalid octet")]
    IncorrectHeaderFieldValue,

    // --- Semantic (Host header) violations: 400 + reason; close. ---
    #[error("no 'Host' header supplied")]
    HostHeaderNone,
    #[error("more than one 'Host' header supplied")]
    HostHeaderMany,
    #[error("'Host' header has an illegal port")]
    HostHeaderIllegalPort,
    #[error("'Host' header port does not match the listener port")]
    HostHeaderIncorrectPort,
    #[error("'Host' header does not match the configured hostname")]
    HostHeaderIncorrect,

    // --- Policy overflow: 413 or 414; close. ---
    #[error("method too long")]
    PolicyTooLongMethod,
    #[error("request-target too long")]
    PolicyTooLongRequestTarget,
    #[error("header field-name too long")]
    PolicyTooLongHeaderFieldName,
    #[error("header field-value too long")]
    PolicyTooLongHeaderFieldValue,
    #[error("too many whitespace octets in a header field")]
    PolicyTooManyOws,

    // --- Resource: 404 / 403 / 503. ---
    #[error("file not found")]
    FileNotFound,
    #[error("insufficient permissions to read file")]
    FileReadInsufficientPermissions,
    #[error("file system overloaded")]
    FileSystemOverload,

    // --- Protocol policy: 301 / 505 / 429. ---
    #[error("upgrade to https required")]
    UpgradeToHttps,
    #[error("too many requests on this connection")]
    TooManyRequestsPerThisConnection,

    // --- I/O write failure: sticky write_failed; abort without shutdown. ---
    #[error("write error: {0}")]
    FailedWriteIo(IoError),
}

/// The body to send alongside a canned-response status line.
pub enum CannedBody {
    /// `text/plain`, formatted as `"Malformed request: <detail>"`.
    PlainText(String),
    /// Pre-rendered HTML constant (404/403/homepage pages).
    Html(&'static str),
    /// No body (redirects, 429, 505 carry none here).
    Empty,
}

/// The outcome of mapping a [`RequestError`] to a response.
pub struct CannedResponse {
    pub status: StatusCode,
    pub body: CannedBody,
    /// `Location:` header value for redirects; `None` otherwise.
    pub location: Option<String>,
    /// Whether the connection may remain persistent after this response.
    /// Only resource errors (404/403/503) and the strict request-cap
    /// rejection preserve persistence; everything else closes.
    pub keep_alive: bool,
}

impl RequestError {
    /// True for I/O read/write failures, where no response should even
    /// be attempted (the socket is already unusable).
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            RequestError::FailedReadEof
                | RequestError::FailedReadIo(_)
                | RequestError::FailedWriteIo(_)
        )
    }

    /// True for write failures specifically — callers must set the
    /// sticky `write_failed` flag and may not attempt further recovery.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, RequestError::FailedWriteIo(_))
    }

    pub fn as_canned_response(&self, hostname: &str, path: &str) -> CannedResponse {
        use RequestError::*;

        let plain = |detail: &str| CannedBody::PlainText(format!("Malformed request: {detail}"));

        match self {
            EmptyMethod => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("method is empty"),
                location: None,
                keep_alive: false,
            },
            IncorrectMethod => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("method contains an invalid character"),
                location: None,
                keep_alive: false,
            },
            InvalidPathEmpty => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("request-target is empty"),
                location: None,
                keep_alive: false,
            },
            IncorrectPath => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("request-target contains an invalid character"),
                location: None,
                keep_alive: false,
            },
            IncorrectPathAbsoluteForm => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("absolute-form request-target is malformed"),
                location: None,
                keep_alive: false,
            },
            UnsupportedVersion => CannedResponse {
                status: StatusCode::HttpVersionNotSupported,
                body: CannedBody::Empty,
                location: None,
                keep_alive: false,
            },
            IncorrectVersion => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("HTTP version is malformed"),
                location: None,
                keep_alive: false,
            },
            IncorrectCrlf => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("expected CRLF line ending"),
                location: None,
                keep_alive: false,
            },
            IncorrectHeaderFieldName => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("header field-name contains an invalid character"),
                location: None,
                keep_alive: false,
            },
            IncorrectHeaderFieldValue => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("header field-value contains an invalid character"),
                location: None,
                keep_alive: false,
            },
            HostHeaderNone => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("no 'Host' header supplied"),
                location: None,
                keep_alive: false,
            },
            HostHeaderMany => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("more than one 'Host' header supplied"),
                location: None,
                keep_alive: false,
            },
            HostHeaderIllegalPort => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("'Host' header has an illegal port"),
                location: None,
                keep_alive: false,
            },
            HostHeaderIncorrectPort => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("'Host' header port does not match the listener port"),
                location: None,
                keep_alive: false,
            },
            HostHeaderIncorrect => CannedResponse {
                status: StatusCode::BadRequest,
                body: plain("'Host' header does not match the configured hostname"),
                location: None,
                keep_alive: false,
            },
            PolicyTooLongMethod => CannedResponse {
                status: StatusCode::PayloadTooLarge,
                body: CannedBody::PlainText("method too long".to_string()),
                location: None,
                keep_alive: false,
            },
            PolicyTooLongRequestTarget => CannedResponse {
                status: StatusCode::UriTooLong,
                body: CannedBody::PlainText("request-target too long".to_string()),
                location: None,
                keep_alive: false,
            },
            PolicyTooLongHeaderFieldName => CannedResponse {
                status: StatusCode::PayloadTooLarge,
                body: CannedBody::PlainText("header field-name too long".to_string()),
                location: None,
                keep_alive: false,
            },
            PolicyTooLongHeaderFieldValue => CannedResponse {
                status: StatusCode::PayloadTooLarge,
                body: CannedBody::PlainText("header field-value too long".to_string()),
                location: None,
                keep_alive: false,
            },
            PolicyTooManyOws => CannedResponse {
                status: StatusCode::PayloadTooLarge,
                body: CannedBody::PlainText(
                    "too many whitespace octets in header field".to_string(),
                ),
                location: None,
                keep_alive: false,
            },
            FileNotFound => CannedResponse {
                status: StatusCode::NotFound,
                body: CannedBody::Html(crate::pages::NOT_FOUND),
                location: None,
                keep_alive: true,
            },
            FileReadInsufficientPermissions => CannedResponse {
                status: StatusCode::Forbidden,
                body: CannedBody::Html(crate::pages::FORBIDDEN),
                location: None,
                keep_alive: true,
            },
            FileSystemOverload => CannedResponse {
                status: StatusCode::ServiceUnavailable,
                body: CannedBody::Empty,
                location: None,
                keep_alive: true,
            },
            UpgradeToHttps => CannedResponse {
                status: StatusCode::MovedPermanently,
                body: CannedBody::Empty,
                location: Some(format!("https://{hostname}{path}")),
                keep_alive: false,
            },
            TooManyRequestsPerThisConnection => CannedResponse {
                status: StatusCode::TooManyRequests,
                body: CannedBody::Empty,
                location: None,
                keep_alive: true,
            },
            FailedReadEof | FailedReadIo(_) | FailedWriteIo(_) => unreachable!(
                "I/O failures must be handled via is_io_failure() before reaching as_canned_response"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_errors_preserve_persistence() {
        let err = RequestError::FileNotFound;
        assert!(err.as_canned_response("example.org", "/x").keep_alive);

        let err = RequestError::FileReadInsufficientPermissions;
        assert!(err.as_canned_response("example.org", "/x").keep_alive);
    }

    #[test]
    fn grammar_errors_close_connection() {
        let err = RequestError::IncorrectMethod;
        assert!(!err.as_canned_response("example.org", "/x").keep_alive);
    }

    #[test]
    fn upgrade_redirect_carries_location() {
        let err = RequestError::UpgradeToHttps;
        let response = err.as_canned_response("example.org", "/path");
        assert_eq!(
            response.location.as_deref(),
            Some("https://example.org/path")
        );
        assert_eq!(response.status, StatusCode::MovedPermanently);
    }

    #[test]
    fn io_failures_are_flagged() {
        assert!(RequestError::FailedReadEof.is_io_failure());
        assert!(!RequestError::IncorrectMethod.is_io_failure());
        assert!(RequestError::FailedWriteIo(IoError(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken"
        )))
        .is_write_failure());
    }
}
