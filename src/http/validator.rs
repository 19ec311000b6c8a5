//! Request validator (C3): path-form normalization, `Host` header
//! enforcement, upgrade-to-HTTPS short-circuit and the
//! `Connection: close` directive.
//!
//! Grounded on the original C++ implementation's `http/request.hpp`
//! request-target handling and `main.cpp`'s hostname/port bootstrap
//! (`original_source/`), which is where the Host-header rules this
//! module enforces come from — the teacher has no Host validation at
//! all, since `maker_web` never binds requests to a single configured
//! hostname.

use crate::config::Config;
use crate::errors::RequestError;
use crate::http::request::Request;
use crate::http::types::Version;

/// What the validator learned that the exchange controller (C7) must
/// act on but that doesn't belong on [`Request`] itself.
pub struct ValidationOutcome {
    /// Whether the connection may stay open past this response.
    /// HTTP/1.1 defaults to persistent unless the client sends
    /// `Connection: close`; HTTP/1.0 defaults to non-persistent unless
    /// the client sends an explicit `Connection: keep-alive` (spec.md
    /// §3: "persistent … initially true for HTTP/1.1").
    pub persistent: bool,
}

/// Runs every C3 check in spec order: path-form, Host header, upgrade
/// redirect, then the `Connection` directive.
pub fn validate(
    request: &mut Request,
    config: &Config,
    is_tls: bool,
    peer_is_local: bool,
) -> Result<ValidationOutcome, RequestError> {
    normalize_path_form(request, is_tls)?;
    validate_host(request, config, peer_is_local)?;

    if config.upgrade_to_https && !is_tls {
        return Err(RequestError::UpgradeToHttps);
    }

    let connection_value = request.headers().get("connection").map(|value| value.trim());
    let persistent = match request.version() {
        Version::Http11 => !connection_value.is_some_and(|v| v.eq_ignore_ascii_case("close")),
        Version::Http10 => connection_value.is_some_and(|v| v.eq_ignore_ascii_case("keep-alive")),
    };

    Ok(ValidationOutcome { persistent })
}

/// Origin-form (`/path`) is left untouched. Absolute-form
/// (`scheme://authority/path`) is reduced to its path component in
/// place, overwriting [`Request`]'s url so downstream code never has to
/// know which form the client used.
fn normalize_path_form(request: &mut Request, is_tls: bool) -> Result<(), RequestError> {
    let path = request.url().path;
    if path.is_empty() {
        return Err(RequestError::InvalidPathEmpty);
    }
    if path[0] == b'/' {
        return Ok(());
    }

    let scheme: &[u8] = if is_tls { b"https" } else { b"http" };
    let min_len = scheme.len() + "://".len() + 1 /* host */ + 1 /* '/' */;
    if path.len() < min_len || !path[..scheme.len()].eq_ignore_ascii_case(scheme) {
        return Err(RequestError::IncorrectPathAbsoluteForm);
    }

    let rest = &path[scheme.len()..];
    if &rest[..3] != b"://" {
        return Err(RequestError::IncorrectPathAbsoluteForm);
    }

    let authority_and_path = &rest[3..];
    let slash = authority_and_path
        .iter()
        .position(|&b| b == b'/')
        .ok_or(RequestError::IncorrectPathAbsoluteForm)?;
    if slash == 0 {
        // Empty authority: "http:///path".
        return Err(RequestError::IncorrectPathAbsoluteForm);
    }

    let new_path = &authority_and_path[slash..];
    if new_path.is_empty() {
        return Err(RequestError::InvalidPathEmpty);
    }

    request.url_mut().set_path(new_path);
    Ok(())
}

/// Enforces presence, uniqueness, port and hostname agreement for the
/// `Host` header. HTTP/1.0 requests carry no such requirement (RFC 7230
/// §5.4 only mandates `Host` from 1.1 clients).
fn validate_host(request: &Request, config: &Config, peer_is_local: bool) -> Result<(), RequestError> {
    if request.version() != Version::Http11 {
        return Ok(());
    }

    let count = request.headers().count("host");
    if count == 0 {
        return Err(RequestError::HostHeaderNone);
    }
    if count > 1 {
        return Err(RequestError::HostHeaderMany);
    }

    let value = request.headers().get("host").expect("count() == 1 above");
    let (hostname, port) = match value.rsplit_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (value, None),
    };

    if let Some(port_str) = port {
        let valid_digits = !port_str.is_empty()
            && port_str.len() <= 5
            && port_str.bytes().all(|b| b.is_ascii_digit());
        if !valid_digits {
            return Err(RequestError::HostHeaderIllegalPort);
        }
        let parsed: u32 = port_str.parse().map_err(|_| RequestError::HostHeaderIllegalPort)?;
        if parsed != config.bind_addr.port() as u32 {
            return Err(RequestError::HostHeaderIncorrectPort);
        }
    }

    let matches_configured = hostname.eq_ignore_ascii_case(&config.hostname);
    let matches_local = peer_is_local && matches!(hostname, "localhost" | "127.0.0.1" | "0.0.0.0");
    if !matches_configured && !matches_local {
        return Err(RequestError::HostHeaderIncorrect);
    }

    Ok(())
}
