//! Exchange controller (C7): the per-connection request/response loop.
//!
//! State machine per spec.md §4.7 — SETUP, then repeatedly READING →
//! (RESPONDING | RECOVERY) → loop-or-CLEANUP — collapsed here into one
//! `while` loop over [`Parser::parse`], [`validate`], [`resolve`] and
//! [`Response::build`], since Rust's `?`/early-`continue` control flow
//! expresses the same state transitions without a literal enum. Grounded
//! on the teacher's `server/connection.rs` top-level connection-owning
//! loop, stripped of its generic `Handler<S>`/`ConnectionData` framework
//! (this crate has exactly one connection behavior, not a pluggable
//! one) and rebuilt around this crate's concrete `Transport`/`Request`/
//! `Response`/resolver types.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::errors::{CannedBody, RequestError};
use crate::http::request::{Parser, Request};
use crate::http::response::{send_body, Body, Response};
use crate::http::validator::validate;
use crate::media_type::{self, MediaType};
use crate::policy::{Policy, RequestCapMode};
use crate::resolver::{resolve, ResolvedFile};
use crate::transport::Transport;

/// Owns one accepted connection end-to-end: reads requests, validates
/// and resolves them, writes responses, and decides when to stop
/// looping and tear the connection down. This is the server's external
/// listener interface (spec.md §6) — the acceptor in
/// [`crate::server::server_impl`] is the only caller.
pub async fn handle_connection(
    mut transport: Transport,
    peer_addr: SocketAddr,
    config: Arc<Config>,
    policy: Arc<Policy>,
) {
    if let Err(error) = transport.set_nodelay() {
        tracing::debug!(target: "connection", %error, "failed to set TCP_NODELAY");
    }

    let peer_is_local = is_local(peer_addr);
    let is_tls = matches!(transport, Transport::Tls(_));

    let mut parser = Parser::new(&policy);
    let mut request = Request::new();
    let mut response = Response::new();

    let started_at = Instant::now();
    let mut persistent = true;
    let mut requests_served: usize = 0;
    let mut write_failed = false;

    while persistent && !write_failed && within_lifetime(started_at, &policy) {
        request.reset();

        // Graceful mode closes without ever reading the overflow
        // request; strict mode must still read and reject it below, so
        // its check happens only after a successful `parse` — checking
        // it here too (before any bytes are read) would reject the same
        // never-consumed request forever, flooding the client with 429s
        // without the loop ever blocking on the socket again.
        if request_cap_reached(requests_served, &policy)
            && policy.request_cap_mode == RequestCapMode::Graceful
        {
            break;
        }

        match parser
            .parse(&mut request, &mut transport, &policy, policy.idle_read_timeout)
            .await
        {
            Ok(()) => {}
            Err(error) if error.is_io_failure() => break,
            Err(error) => {
                // `request.url` is only populated once both the method
                // and request-target stages have succeeded; a failure
                // in either stage (e.g. the oversize-method case) must
                // not reach for it.
                let path = request.path_or_empty().to_string();
                let keep = recover(&mut transport, &mut response, error, &config, &path, &policy, is_tls).await;
                requests_served += 1;
                match keep {
                    Some(keep_alive) => {
                        persistent = keep_alive;
                        continue;
                    }
                    None => {
                        write_failed = true;
                        continue;
                    }
                }
            }
        }

        if request_cap_reached(requests_served, &policy) {
            // Only the strict mode reaches here — graceful already broke
            // out above. The request has just been fully read off the
            // wire, so rejecting it here can't starve the client: the
            // next loop iteration's `parse` call blocks on the next
            // request's bytes exactly as it would for any other request.
            let path = request.path_or_empty().to_string();
            let keep = recover(
                &mut transport,
                &mut response,
                RequestError::TooManyRequestsPerThisConnection,
                &config,
                &path,
                &policy,
                is_tls,
            )
            .await;
            requests_served += 1;
            match keep {
                Some(keep_alive) => persistent = keep_alive,
                None => write_failed = true,
            }
            continue;
        }

        match validate(&mut request, &config, is_tls, peer_is_local) {
            Ok(outcome) => persistent = outcome.persistent,
            Err(error) => {
                let path = request.path_or_empty().to_string();
                let keep = recover(&mut transport, &mut response, error, &config, &path, &policy, is_tls).await;
                requests_served += 1;
                match keep {
                    Some(keep_alive) => {
                        persistent = keep_alive;
                        continue;
                    }
                    None => {
                        write_failed = true;
                        continue;
                    }
                }
            }
        };

        let path = request.url().path().to_string();
        match resolve(&config.document_root, &path).await {
            Ok(resolved) => {
                let result = respond_ok(
                    &mut transport,
                    &mut response,
                    &request,
                    resolved,
                    &config,
                    &policy,
                    is_tls,
                    persistent,
                )
                .await;
                if result.is_err() {
                    write_failed = true;
                }
            }
            Err(RequestError::FileNotFound) if path.starts_with("/index.html") => {
                let result = respond_homepage(
                    &mut transport,
                    &mut response,
                    &request,
                    &config,
                    &policy,
                    is_tls,
                    persistent,
                )
                .await;
                if result.is_err() {
                    write_failed = true;
                }
            }
            Err(error) => {
                let keep = recover(&mut transport, &mut response, error, &config, &path, &policy, is_tls).await;
                match keep {
                    Some(keep_alive) => persistent = persistent && keep_alive,
                    None => write_failed = true,
                }
            }
        }

        requests_served += 1;
    }

    transport.shutdown().await;
}

fn within_lifetime(started_at: Instant, policy: &Policy) -> bool {
    policy.max_connection_lifetime.is_zero() || started_at.elapsed() < policy.max_connection_lifetime
}

fn request_cap_reached(requests_served: usize, policy: &Policy) -> bool {
    policy.max_requests_per_connection != 0 && requests_served >= policy.max_requests_per_connection
}

fn is_local(addr: SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
    }
}

/// Writes a canned error response for `error`. Returns `Some(keep_alive)`
/// on a successful write, `None` if the write itself failed (the
/// caller must then set the sticky write-failed flag and stop).
async fn recover(
    transport: &mut Transport,
    response: &mut Response,
    error: RequestError,
    config: &Config,
    path: &str,
    policy: &Policy,
    is_tls: bool,
) -> Option<bool> {
    let canned = error.as_canned_response(&config.hostname, path);
    let (body_bytes, media_type): (&[u8], MediaType) = match &canned.body {
        CannedBody::PlainText(text) => (
            text.as_bytes(),
            MediaType {
                name: "text/plain",
                is_text: true,
            },
        ),
        CannedBody::Html(html) => (
            html.as_bytes(),
            MediaType {
                name: "text/html",
                is_text: true,
            },
        ),
        CannedBody::Empty => (
            b"",
            MediaType {
                name: "text/plain",
                is_text: true,
            },
        ),
    };

    response.build(
        canned.status,
        crate::http::types::Version::Http11,
        body_bytes.len() as u64,
        media_type,
        canned.keep_alive,
        policy,
        is_tls,
        &config.hsts_value,
        &config.server_token,
        canned.location.as_deref().map(|location| ("Location", location)),
    );

    if transport.write_all(response.buffer()).await.is_err() {
        return None;
    }
    if !body_bytes.is_empty() && transport.write_all(body_bytes).await.is_err() {
        return None;
    }

    Some(canned.keep_alive)
}

#[allow(clippy::too_many_arguments)]
async fn respond_ok(
    transport: &mut Transport,
    response: &mut Response,
    request: &Request,
    resolved: ResolvedFile,
    config: &Config,
    policy: &Policy,
    is_tls: bool,
    keep_alive: bool,
) -> std::io::Result<()> {
    // Detected from the *served* file's path, not the request path: a
    // directory request (e.g. `GET /`) resolves to `<dir>/index.html`
    // via the resolver's index fallback, and the extension that drives
    // `Content-Type` has to come from that final path, not from the
    // extension-less directory path the client asked for.
    let media_type = media_type::detect(&resolved.canonical_path.to_string_lossy());
    let is_head = request.is_head();

    response.build(
        crate::http::types::StatusCode::Ok,
        request.version(),
        resolved.size,
        media_type,
        keep_alive,
        policy,
        is_tls,
        &config.hsts_value,
        &config.server_token,
        None,
    );

    transport.write_all(response.buffer()).await?;
    if !is_head {
        send_body(
            transport,
            Body::File {
                file: resolved.file,
                len: resolved.size,
            },
        )
        .await?;
    }
    Ok(())
}

/// Serves the built-in welcome page for a missing `/index.html`
/// (spec.md §4.4 step 4): the only case where a 404-shaped resolver
/// failure is answered with `200 OK` instead of a canned error.
async fn respond_homepage(
    transport: &mut Transport,
    response: &mut Response,
    request: &Request,
    config: &Config,
    policy: &Policy,
    is_tls: bool,
    keep_alive: bool,
) -> std::io::Result<()> {
    let body = crate::pages::HOMEPAGE.as_bytes();
    let media_type = MediaType {
        name: "text/html",
        is_text: true,
    };

    response.build(
        crate::http::types::StatusCode::Ok,
        request.version(),
        body.len() as u64,
        media_type,
        keep_alive,
        policy,
        is_tls,
        &config.hsts_value,
        &config.server_token,
        None,
    );

    transport.write_all(response.buffer()).await?;
    if !request.is_head() {
        send_body(transport, Body::Bytes(body)).await?;
    }
    Ok(())
}
