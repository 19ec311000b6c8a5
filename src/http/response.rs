//! Response assembler (C5): status line, the mandated header sequence
//! from spec.md §4.5, and the body handoff to C1.
//!
//! The teacher's fluent multi-protocol builder (HTTP/0.9 variants,
//! `WriteBuffer`/`BodyWriter` machinery generalized over an arbitrary
//! header set) is dropped: this server only ever emits one response
//! shape, in one fixed header order, so a generic builder buys nothing
//! but indirection. What's kept is the underlying discipline — build
//! the header block into one buffer, write it once — and the teacher's
//! `number_to_bytes`-style integer formatter, narrowed here to the one
//! case this assembler needs (`Content-Length` is never negative).

use std::io;

use crate::http::types::{StatusCode, Version};
use crate::media_type::MediaType;
use crate::policy::Policy;
use crate::transport::Transport;

/// Header buffer for one response. Reused across a connection's
/// requests via [`Response::reset`] rather than reallocated.
pub struct Response {
    buffer: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Response::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Response {
            buffer: Vec::with_capacity(512),
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Builds the status line and every header spec.md §4.5 names, in
    /// the mandated order: `Content-Length`, `Server`, `Connection`,
    /// then the six conditionally-emitted security headers, then
    /// `Content-Type`, then any caller-supplied extra header (e.g.
    /// `Location`), then the terminating blank line. Does not write the
    /// body — callers stream it separately via [`send_body`] so HEAD
    /// responses never have to buffer one.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &mut self,
        status: StatusCode,
        version: Version,
        content_length: u64,
        media_type: MediaType,
        keep_alive: bool,
        policy: &Policy,
        is_tls: bool,
        hsts_value: &str,
        server_token: &str,
        extra_header: Option<(&str, &str)>,
    ) {
        self.buffer.clear();

        self.buffer.extend_from_slice(version.as_str().as_bytes());
        self.buffer.push(b' ');
        self.buffer
            .extend_from_slice(status.status_line().as_bytes());
        self.buffer.extend_from_slice(b"\r\n");

        self.push_number_header("Content-Length", content_length);
        self.push_header("Server", server_token);
        self.push_header(
            "Connection",
            if keep_alive { "keep-alive" } else { "close" },
        );

        if is_tls && !hsts_value.is_empty() {
            self.push_header("Strict-Transport-Security", hsts_value);
        }
        if policy.enable_content_type_nosniffing {
            self.push_header("X-Content-Type-Options", "nosniff");
        }
        if policy.deny_iframing {
            self.push_header("X-Frame-Options", "SAMEORIGIN");
        }
        if policy.enable_xss_protection_header {
            self.push_header("X-XSS-Protection", "1; mode=block");
        }
        if !policy.content_security_policy.is_empty() {
            self.push_header("Content-Security-Policy", &policy.content_security_policy);
        }
        if policy.disable_referrer {
            self.push_header("Referrer-Policy", "no-referrer");
        }

        if media_type.is_text {
            self.push_header(
                "Content-Type",
                &format!("{};charset=utf-8", media_type.name),
            );
        } else {
            self.push_header("Content-Type", media_type.name);
        }

        if let Some((name, value)) = extra_header {
            self.push_header(name, value);
        }

        self.buffer.extend_from_slice(b"\r\n");
    }

    fn push_header(&mut self, name: &str, value: &str) {
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(b": ");
        self.buffer.extend_from_slice(value.as_bytes());
        self.buffer.extend_from_slice(b"\r\n");
    }

    /// Writes a decimal header value without an intermediate `String`
    /// allocation.
    fn push_number_header(&mut self, name: &str, value: u64) {
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(b": ");
        write_u64(&mut self.buffer, value);
        self.buffer.extend_from_slice(b"\r\n");
    }
}

fn write_u64(buffer: &mut Vec<u8>, mut n: u64) {
    if n == 0 {
        buffer.push(b'0');
        return;
    }
    let start = buffer.len();
    while n > 0 {
        buffer.push(b'0' + (n % 10) as u8);
        n /= 10;
    }
    buffer[start..].reverse();
}

/// The response body, handed to [`send_body`] once the headers are on
/// the wire. Callers check `is_head` themselves and simply never call
/// [`send_body`] for HEAD responses.
pub enum Body<'a> {
    Bytes(&'a [u8]),
    File { file: tokio::fs::File, len: u64 },
}

pub async fn send_body(transport: &mut Transport, body: Body<'_>) -> io::Result<()> {
    match body {
        Body::Bytes(bytes) => transport.write_all(bytes).await,
        Body::File { mut file, len } => transport.send_file(&mut file, len).await,
    }
}
