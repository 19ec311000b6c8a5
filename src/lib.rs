//! originserve - a security-first static-file HTTP/1.1 origin server.
//!
//! Serves files from a single configured document root over plain TCP
//! or TLS, to a single configured hostname, with byte-level request
//! validation and a conservative, policy-gated set of security response
//! headers. Persistent connections are supported; request bodies,
//! chunked transfer-encoding, HTTP/2, HTTP/3, content negotiation,
//! compression, response caching and virtual hosting are explicitly out
//! of scope (see `SPEC_FULL.md`).
//!
//! # Architecture
//!
//! | Component | Module | Responsibility |
//! |---|---|---|
//! | C1 Byte Transport | [`transport`] | Plain/TLS read, write, sendfile |
//! | C2 Request Parser | [`http::request`] | Zero-copy request-line/header scan |
//! | C3 Request Validator | [`http::validator`] | Path-form, `Host`, upgrade, `Connection` |
//! | C4 Resource Resolver | [`resolver`] | Path join, index fallback, jail check |
//! | C5 Response Assembler | [`http::response`] | Status line, header policy gating |
//! | C7 Exchange Controller | [`server::connection`] | Per-connection request/response loop |
//!
//! The listening-socket acceptor ([`server::server_impl`]) and the
//! process entry point (`src/main.rs`) sit outside the core pipeline,
//! as collaborators rather than components proper.
pub mod config;
pub mod errors;
pub mod http {
    pub mod request;
    pub mod response;
    pub mod types;
    pub mod validator;
}
pub mod media_type;
pub mod pages;
pub mod policy;
#[cfg(unix)]
pub mod privilege;
pub mod resolver;
pub mod server {
    pub mod connection;
    pub mod server_impl;
}
pub mod transport;

pub use crate::config::{Config, TransportMode};
pub use crate::errors::RequestError;
pub use crate::http::request::{Parser, Request};
pub use crate::http::response::Response;
pub use crate::http::types::{HeaderMap, Method, StatusCode, Url, Version};
pub use crate::policy::{Policy, RequestCapMode};
pub use crate::transport::Transport;
