//! Listening-socket acceptor (out-of-scope collaborator per spec.md §2,
//! kept here so the crate is runnable end to end).
//!
//! Spawns one tokio task per accepted connection running
//! [`connection::handle_connection`] — the spec's literal
//! "worker-per-connection" model (§5) — tracked in a mutex-guarded
//! registry so [`run`] can drain outstanding connections before
//! returning on shutdown. Grounded on the teacher's `server/server_impl.rs`
//! accept loop, stripped of its generic `Handler`/`ServerBuilder<H,S,F>`
//! framework (no `ConnectionFilter`, no pluggable connection data — this
//! crate serves exactly one pipeline) and its `crossbeam::queue::SegQueue`
//! pre-spawned worker pool, which had no remaining purpose once the
//! generic dispatch layer was gone (noted in DESIGN.md).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::AbortHandle;
use tokio_rustls::TlsAcceptor;

use crate::config::Config;
use crate::policy::Policy;
use crate::server::connection::handle_connection;
use crate::transport::Transport;

/// Tracks in-flight connection tasks so a graceful shutdown can wait
/// for them to finish instead of severing them mid-response.
#[derive(Default)]
struct ConnectionRegistry {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, AbortHandle>>,
}

impl ConnectionRegistry {
    fn insert(&self, handle: AbortHandle) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.tasks.lock().expect("registry mutex poisoned").insert(id, handle);
        id
    }

    fn remove(&self, id: u64) {
        self.tasks.lock().expect("registry mutex poisoned").remove(&id);
    }

    fn active_count(&self) -> usize {
        self.tasks.lock().expect("registry mutex poisoned").len()
    }
}

/// Accepts connections on `listener` until `shutdown` fires, then drains
/// in-flight connections before returning. TLS handshakes (when
/// `tls_acceptor` is set) happen inside each spawned task so a slow or
/// hostile handshake never blocks the accept loop itself.
pub async fn run(
    listener: TcpListener,
    config: Arc<Config>,
    policy: Arc<Policy>,
    tls_acceptor: Option<TlsAcceptor>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let registry = Arc::new(ConnectionRegistry::default());

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(pair) => pair,
                    Err(error) => {
                        tracing::warn!(target: "server", %error, "accept failed");
                        continue;
                    }
                };

                let config = Arc::clone(&config);
                let policy = Arc::clone(&policy);
                let tls_acceptor = tls_acceptor.clone();
                let registry = Arc::clone(&registry);

                let task = tokio::spawn(async move {
                    let transport = match tls_acceptor {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(tls_stream) => Transport::Tls(Box::new(tls_stream)),
                            Err(error) => {
                                tracing::warn!(target: "server", %error, peer = %peer_addr, "TLS handshake failed");
                                return;
                            }
                        },
                        None => Transport::Plain(stream),
                    };

                    handle_connection(transport, peer_addr, config, policy).await;
                });

                let id = registry.insert(task.abort_handle());
                let registry_for_cleanup = Arc::clone(&registry);
                tokio::spawn(async move {
                    let _ = task.await;
                    registry_for_cleanup.remove(id);
                });
            }
            _ = shutdown.changed() => {
                tracing::info!(target: "server", "shutdown requested, draining connections");
                break;
            }
        }
    }

    while registry.active_count() > 0 {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
