//! Immutable numeric limits and header toggles consumed by the parser,
//! the response assembler and the exchange controller.
//!
//! Every numeric cap treats `0` as "unlimited". Defaults mirror the
//! original C++ implementation's `Security::Policies` struct where it
//! named a value, and are otherwise chosen conservatively.

use std::time::Duration;

/// Request-cap enforcement mode once [`Policy::max_requests_per_connection`]
/// is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCapMode {
    /// Serve the Nth request, then close the connection without error.
    Graceful,
    /// Reject the Nth request with `429 Too Many Requests`.
    Strict,
}

/// Immutable policy record: numeric limits and security-header toggles.
///
/// Construct with [`Policy::default`] and override individual fields,
/// e.g. `Policy { max_method_length: 32, ..Policy::default() }`.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Maximum method length. The longest registered IANA method,
    /// `UPDATEREDIRECTREF`, is 17 octets; 18 covers it with room for a
    /// trailing NUL in implementations that need one. 0 means unlimited.
    pub max_method_length: usize,

    /// Maximum request-target (path + query) length. 0 means unlimited.
    pub max_request_target_length: usize,

    /// Maximum header field-name length. 0 means unlimited.
    pub max_header_field_name_length: usize,

    /// Maximum header field-value length. 0 means unlimited.
    pub max_header_field_value_length: usize,

    /// Upper bound on optional-whitespace octets consumed while skipping
    /// leading OWS before a header value. 0 means unlimited.
    pub max_whitespaces_in_header_field: usize,

    /// Requests allowed on a single connection before
    /// [`Policy::request_cap_mode`] takes effect. 0 means unlimited.
    pub max_requests_per_connection: usize,

    /// Graceful (close quietly) vs strict (429) behavior once
    /// [`Policy::max_requests_per_connection`] is reached.
    pub request_cap_mode: RequestCapMode,

    /// Whole-connection lifetime cap, checked between requests only
    /// (there is no sub-request keep-alive timeout).
    pub max_connection_lifetime: Duration,

    /// Idle-read timeout: how long a worker waits for the next octet
    /// before treating the peer as dead. Not part of the original
    /// design; added per its own "natural extension" note as a
    /// slowloris mitigation. `None` disables the timeout.
    pub idle_read_timeout: Option<Duration>,

    /// Emit `X-Frame-Options: SAMEORIGIN`.
    pub deny_iframing: bool,
    /// Emit `X-XSS-Protection: 1; mode=block`.
    pub enable_xss_protection_header: bool,
    /// Emit `X-Content-Type-Options: nosniff`.
    pub enable_content_type_nosniffing: bool,
    /// Emit `Referrer-Policy: no-referrer`.
    pub disable_referrer: bool,
    /// `Content-Security-Policy` header value; empty means omit the header.
    pub content_security_policy: String,

    // Forces callers through `..Policy::default()` so new fields don't
    // break downstream construction.
    _priv: (),
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            max_method_length: 18,
            max_request_target_length: 255,
            max_header_field_name_length: 40,
            max_header_field_value_length: 255,
            max_whitespaces_in_header_field: 20,
            max_requests_per_connection: 300,
            request_cap_mode: RequestCapMode::Graceful,
            max_connection_lifetime: Duration::from_millis(60_000),
            idle_read_timeout: Some(Duration::from_secs(10)),
            deny_iframing: true,
            enable_xss_protection_header: true,
            enable_content_type_nosniffing: true,
            disable_referrer: true,
            content_security_policy: String::new(),
            _priv: (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_values() {
        let policy = Policy::default();
        assert_eq!(policy.max_method_length, 18);
        assert_eq!(policy.max_request_target_length, 255);
        assert_eq!(policy.max_requests_per_connection, 300);
        assert_eq!(policy.request_cap_mode, RequestCapMode::Graceful);
    }

    #[test]
    fn zero_means_unlimited_by_convention() {
        let policy = Policy {
            max_method_length: 0,
            ..Policy::default()
        };
        assert_eq!(policy.max_method_length, 0);
    }
}
