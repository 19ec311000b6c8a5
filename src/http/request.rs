//! Zero-copy request-line/header parser (C2).
//!
//! The parser owns a single fixed-capacity buffer for the lifetime of a
//! connection. Bytes are read into it, scanned in place, and handed out
//! to the caller as `&'static` slices via an `unsafe` lifetime
//! transmutation — sound because the buffer is never reallocated or
//! moved, and because a [`Request`]'s fields are logically retired by
//! [`Request::reset`] before the next [`Parser::parse`] call is allowed
//! to compact or overwrite the bytes they point into.

use crate::errors::RequestError;
use crate::http::types::{
    is_field_value_char, is_target_char, is_token_char, to_lower_case, HeaderMap, Method,
    Url, Version,
};
use crate::policy::Policy;
use crate::transport::Transport;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const SP: u8 = b' ';
const COLON: u8 = b':';

/// A single parsed request. Reused across a connection's requests via
/// [`Request::reset`] rather than reallocated.
#[derive(Debug, Default)]
pub struct Request {
    pub(crate) method: Option<Method>,
    pub(crate) url: Option<Url>,
    pub(crate) version: Option<Version>,
    pub(crate) headers: HeaderMap,
}

impl Request {
    pub fn new() -> Self {
        Request::default()
    }

    /// Drops all references into the parser's buffer, permitting the
    /// next [`Parser::parse`] call to compact or overwrite them.
    pub fn reset(&mut self) {
        self.method = None;
        self.url = None;
        self.version = None;
        self.headers.clear();
    }

    pub fn method(&self) -> Method {
        self.method.expect("request not parsed")
    }

    pub fn url(&self) -> &Url {
        self.url.as_ref().expect("request not parsed")
    }

    /// The request path if the target stage of the parse has completed,
    /// `""` otherwise. Unlike [`Request::url`], safe to call after a
    /// parser error from the method or request-target stage, where no
    /// `url` has been recorded yet.
    pub fn path_or_empty(&self) -> &str {
        self.url.as_ref().map(|url| url.path()).unwrap_or("")
    }

    pub fn url_mut(&mut self) -> &mut Url {
        self.url.as_mut().expect("request not parsed")
    }

    pub fn version(&self) -> Version {
        self.version.expect("request not parsed")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_head(&self) -> bool {
        self.method().is_head()
    }
}

/// Per-field caps and fallback defaults used to size the parser's fixed
/// buffer. A `0` policy cap ("unlimited") is substituted with a generous
/// fixed value here, since the buffer itself cannot be unbounded.
///
/// `header_count` is not a policy field and is never enforced as a
/// rejection cap — spec.md §4.8 names no such limit, and there is no
/// teacher/original grounding for one (see DESIGN.md). It exists purely
/// to size the fixed read buffer generously enough for ordinary
/// requests; a request with more headers than this budget anticipates
/// simply runs the buffer full, which the existing per-field length
/// checks already turn into the matching `POLICY_TOO_LONG_*` error.
struct Budget {
    method: usize,
    target: usize,
    header_name: usize,
    header_value: usize,
    header_count: usize,
}

/// Sizing-only assumption for how many headers a request will carry;
/// see [`Budget`]'s doc comment.
const HEADER_COUNT_BUDGET: usize = 256;

impl Budget {
    fn from_policy(policy: &Policy) -> Self {
        let or_default = |cap: usize, default: usize| if cap == 0 { default } else { cap };
        Budget {
            method: or_default(policy.max_method_length, 64),
            target: or_default(policy.max_request_target_length, 8192),
            header_name: or_default(policy.max_header_field_name_length, 256),
            header_value: or_default(policy.max_header_field_value_length, 8192),
            header_count: HEADER_COUNT_BUDGET,
        }
    }

    /// Total buffer capacity: request line plus every header field,
    /// each with room for its own delimiters, plus slack for leading
    /// OWS runs and the terminating blank line.
    fn buffer_capacity(&self) -> usize {
        let request_line = self.method + 1 + self.target + 1 + 16 + 2;
        let per_header = self.header_name + 1 + 64 + self.header_value + 2;
        request_line + self.header_count * per_header + 2
    }
}

/// Reusable read/scan buffer and the zero-copy HTTP/1.1 grammar scanner
/// over it.
pub struct Parser {
    buffer: Box<[u8]>,
    /// Index of the next unconsumed byte.
    position: usize,
    /// Index one past the last byte filled by a read.
    len: usize,
}

impl Parser {
    pub fn new(policy: &Policy) -> Self {
        let capacity = Budget::from_policy(policy).buffer_capacity();
        Parser {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            position: 0,
            len: 0,
        }
    }

    /// Moves unconsumed bytes to the front of the buffer, discarding the
    /// previous request's bytes. Only safe to call once every field the
    /// previous [`Request`] borrowed from the buffer has been retired by
    /// [`Request::reset`] — `parse` enforces this ordering.
    fn compact(&mut self) {
        if self.position == 0 {
            return;
        }
        self.buffer.copy_within(self.position..self.len, 0);
        self.len -= self.position;
        self.position = 0;
    }

    async fn fill_buffer(
        &mut self,
        transport: &mut Transport,
        timeout: Option<std::time::Duration>,
    ) -> Result<(), RequestError> {
        if self.len >= self.buffer.len() {
            // Buffer is physically full with no stop byte found; the
            // caller's length check will have already rejected this as
            // an overflow before we're asked to read further.
            return Ok(());
        }
        let n = transport
            .read_some(&mut self.buffer[self.len..], timeout)
            .await
            .map_err(|e| RequestError::FailedReadIo(e.into()))?;
        if n == 0 {
            return Err(RequestError::FailedReadEof);
        }
        self.len += n;
        Ok(())
    }

    /// Hands out a slice of the buffer with a `'static` lifetime.
    ///
    /// SAFETY: the buffer is heap-allocated once in [`Parser::new`] and
    /// never reallocated or moved for the Parser's lifetime, so any
    /// address within it remains stable. Aliased mutation (via
    /// [`Parser::compact`] or a later [`Parser::fill_buffer`]) only ever
    /// happens after the request that borrowed this slice has been
    /// dropped via [`Request::reset`], which the caller enforces by
    /// construction (`parse` is the only path that reaches here, and it
    /// always follows a fresh `reset`).
    unsafe fn get_slice_static(&self, start: usize, end: usize) -> &'static [u8] {
        std::mem::transmute::<&[u8], &'static [u8]>(&self.buffer[start..end])
    }

    async fn ensure_available(
        &mut self,
        transport: &mut Transport,
        timeout: Option<std::time::Duration>,
        at_least: usize,
    ) -> Result<(), RequestError> {
        while self.len - self.position < at_least {
            if self.len >= self.buffer.len() {
                return Ok(());
            }
            self.fill_buffer(transport, timeout).await?;
        }
        Ok(())
    }

    /// Scans forward from `self.position` for `stop_byte`, validating
    /// every byte up to it against `is_valid`, reading more into the
    /// buffer as needed. `cap` of `0` means unbounded (subject only to
    /// the buffer's own physical capacity). Returns the token bytes
    /// (excluding the stop byte) and advances `position` past it.
    async fn scan_token(
        &mut self,
        transport: &mut Transport,
        timeout: Option<std::time::Duration>,
        stop_byte: u8,
        is_valid: fn(u8) -> bool,
        cap: usize,
        too_long: RequestError,
        invalid: RequestError,
    ) -> Result<(usize, usize), RequestError> {
        let start = self.position;
        loop {
            let window = &self.buffer[self.position..self.len];
            if let Some(rel) = memchr::memchr(stop_byte, window) {
                let end = self.position + rel;
                let token_len = end - start;
                if cap != 0 && token_len > cap {
                    return Err(too_long);
                }
                for &b in &self.buffer[start..end] {
                    if !is_valid(b) {
                        return Err(invalid);
                    }
                }
                self.position = end + 1;
                return Ok((start, end));
            }

            let scanned_so_far = self.len - start;
            if (cap != 0 && scanned_so_far > cap) || self.len >= self.buffer.len() {
                return Err(too_long);
            }
            self.fill_buffer(transport, timeout).await?;
        }
    }

    async fn expect_lf(
        &mut self,
        transport: &mut Transport,
        timeout: Option<std::time::Duration>,
    ) -> Result<(), RequestError> {
        self.ensure_available(transport, timeout, 1).await?;
        if self.position >= self.len {
            return Err(RequestError::FailedReadEof);
        }
        if self.buffer[self.position] != LF {
            return Err(RequestError::IncorrectCrlf);
        }
        self.position += 1;
        Ok(())
    }

    async fn peek_byte(
        &mut self,
        transport: &mut Transport,
        timeout: Option<std::time::Duration>,
    ) -> Result<u8, RequestError> {
        self.ensure_available(transport, timeout, 1).await?;
        if self.position >= self.len {
            return Err(RequestError::FailedReadEof);
        }
        Ok(self.buffer[self.position])
    }

    /// Parses one full request-line + header block into `request`.
    /// `request` must have been freshly [`Request::reset`] beforehand.
    pub async fn parse(
        &mut self,
        request: &mut Request,
        transport: &mut Transport,
        policy: &Policy,
        timeout: Option<std::time::Duration>,
    ) -> Result<(), RequestError> {
        self.compact();

        let (ms, me) = self
            .scan_token(
                transport,
                timeout,
                SP,
                is_token_char,
                policy.max_method_length,
                RequestError::PolicyTooLongMethod,
                RequestError::IncorrectMethod,
            )
            .await?;
        if ms == me {
            return Err(RequestError::EmptyMethod);
        }
        let method_bytes = unsafe { self.get_slice_static(ms, me) };
        request.method = Some(Method(method_bytes));

        let (ts, te) = self
            .scan_token(
                transport,
                timeout,
                SP,
                is_target_char,
                policy.max_request_target_length,
                RequestError::PolicyTooLongRequestTarget,
                RequestError::IncorrectPath,
            )
            .await?;
        if ts == te {
            return Err(RequestError::InvalidPathEmpty);
        }
        let target_bytes = unsafe { self.get_slice_static(ts, te) };
        request.url = Some(Url::split(target_bytes));

        let (vs, ve) = self
            .scan_token(
                transport,
                timeout,
                CR,
                |_| true,
                16,
                RequestError::IncorrectVersion,
                RequestError::IncorrectVersion,
            )
            .await?;
        let version_bytes = unsafe { self.get_slice_static(vs, ve) };
        let version = classify_version(version_bytes)?;
        request.version = Some(version);
        self.expect_lf(transport, timeout).await?;

        loop {
            let first = self.peek_byte(transport, timeout).await?;
            if first == CR {
                self.position += 1;
                self.expect_lf(transport, timeout).await?;
                break;
            }

            let (ns, ne) = self
                .scan_token(
                    transport,
                    timeout,
                    COLON,
                    is_token_char,
                    policy.max_header_field_name_length,
                    RequestError::PolicyTooLongHeaderFieldName,
                    RequestError::IncorrectHeaderFieldName,
                )
                .await?;
            if ns == ne {
                return Err(RequestError::IncorrectHeaderFieldName);
            }
            to_lower_case(&mut self.buffer[ns..ne]);
            let name_bytes = unsafe { self.get_slice_static(ns, ne) };

            let mut ows = 0usize;
            loop {
                let b = self.peek_byte(transport, timeout).await?;
                if b != SP && b != b'\t' {
                    break;
                }
                ows += 1;
                if policy.max_whitespaces_in_header_field != 0
                    && ows > policy.max_whitespaces_in_header_field
                {
                    return Err(RequestError::PolicyTooManyOws);
                }
                self.position += 1;
            }

            let (vs, ve) = self
                .scan_token(
                    transport,
                    timeout,
                    CR,
                    is_field_value_char,
                    policy.max_header_field_value_length,
                    RequestError::PolicyTooLongHeaderFieldValue,
                    RequestError::IncorrectHeaderFieldValue,
                )
                .await?;
            self.expect_lf(transport, timeout).await?;

            let mut value_end = ve;
            while value_end > vs && matches!(self.buffer[value_end - 1], b' ' | b'\t') {
                value_end -= 1;
            }
            let value_bytes = unsafe { self.get_slice_static(vs, value_end) };

            request.headers.insert(name_bytes, value_bytes);
        }

        Ok(())
    }
}

fn classify_version(bytes: &[u8]) -> Result<Version, RequestError> {
    match Version::from_bytes(bytes) {
        Some(v) => Ok(v),
        None => {
            if bytes.len() >= 6 && &bytes[..5] == b"HTTP/" && bytes[5] != b'1' {
                Err(RequestError::UnsupportedVersion)
            } else {
                Err(RequestError::IncorrectVersion)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_substitutes_defaults_for_unlimited_caps() {
        let policy = Policy {
            max_method_length: 0,
            max_request_target_length: 0,
            max_header_field_name_length: 0,
            max_header_field_value_length: 0,
            ..Policy::default()
        };
        let budget = Budget::from_policy(&policy);
        assert!(budget.buffer_capacity() > 0);
        assert_eq!(budget.method, 64);
    }

    #[test]
    fn budget_honors_explicit_caps() {
        let policy = Policy::default();
        let budget = Budget::from_policy(&policy);
        assert_eq!(budget.method, 18);
        assert_eq!(budget.target, 255);
        assert_eq!(budget.header_count, HEADER_COUNT_BUDGET);
    }

    #[test]
    fn classify_version_distinguishes_unsupported_from_malformed() {
        assert_eq!(classify_version(b"HTTP/1.1"), Ok(Version::Http11));
        assert_eq!(
            classify_version(b"HTTP/2.0"),
            Err(RequestError::UnsupportedVersion)
        );
        assert_eq!(
            classify_version(b"garbage"),
            Err(RequestError::IncorrectVersion)
        );
    }

    #[test]
    fn request_reset_clears_all_fields() {
        let mut request = Request::new();
        request.method = Some(Method(b"GET"));
        request.url = Some(Url::split(b"/x"));
        request.version = Some(Version::Http11);
        request.headers.insert(b"host", b"example.org");

        request.reset();
        assert!(request.method.is_none());
        assert!(request.url.is_none());
        assert!(request.version.is_none());
        assert!(request.headers().is_empty());
    }
}
