//! Process entry point: ignores `SIGPIPE`, loads configuration, binds
//! the listening socket, builds the TLS acceptor if configured, drops
//! privileges, then serves connections until an interrupt or `SIGTERM`
//! is received.
//!
//! Ordering grounded on the original C++ implementation's `main.cpp`
//! (`original_source/`): bind first (binding a privileged port needs
//! the privilege about to be dropped), drop privileges after, serve
//! after that. Logging setup follows `kowito-chopin`'s
//! `tracing_subscriber::registry().with(EnvFilter).with(fmt::layer())`
//! pattern (`examples/kowito-chopin/chopin-core/src/logging.rs`).

use std::io::BufReader;
use std::sync::Arc;

use rustls_pemfile::{certs, pkcs8_private_keys};
use socket2::{Domain, Socket, Type};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use originserve::config::{Config, TransportMode};
use originserve::policy::Policy;

/// Backlog passed to `listen(2)` — generous enough that a burst of
/// accepts doesn't get dropped at the kernel before this process gets a
/// chance to call `accept`.
const LISTEN_BACKLOG: i32 = 1024;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Ignores `SIGPIPE` so a peer closing its read side mid-write surfaces
/// as an `EPIPE` `io::Error` instead of killing the process — spec.md
/// §5's explicit requirement, grounded on the original's identical
/// `signal(SIGPIPE, SIG_IGN)` call in `main.cpp`.
#[cfg(unix)]
fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
fn ignore_sigpipe() {}

fn bind_listener(config: &Config) -> std::io::Result<TcpListener> {
    let domain = if config.bind_addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&config.bind_addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}

fn load_tls_acceptor(cert_path: &std::path::Path, key_path: &std::path::Path) -> BoxResult<TlsAcceptor> {
    let cert_file = std::fs::File::open(cert_path)
        .map_err(|error| format!("opening TLS certificate {cert_path:?}: {error}"))?;
    let mut cert_reader = BufReader::new(cert_file);
    let cert_chain = certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| format!("parsing TLS certificate {cert_path:?}: {error}"))?;

    let key_file = std::fs::File::open(key_path)
        .map_err(|error| format!("opening TLS private key {key_path:?}: {error}"))?;
    let mut key_reader = BufReader::new(key_file);
    let key = pkcs8_private_keys(&mut key_reader)
        .next()
        .ok_or_else(|| format!("no PKCS#8 private key found in {key_path:?}"))?
        .map_err(|error| format!("parsing TLS private key {key_path:?}: {error}"))?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, rustls::pki_types::PrivateKeyDer::Pkcs8(key))
        .map_err(|error| format!("building TLS server config: {error}"))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Startup failures (bad cert, unbindable address, unknown
/// privilege-drop user) surface as a non-zero exit status through this
/// alias rather than pulling in an error-handling crate for the
/// binary's small amount of fallible setup.
type BoxResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> BoxResult<()> {
    ignore_sigpipe();
    init_logging();

    let config = Arc::new(Config::from_env());
    let policy = Arc::new(Policy::default());

    let listener = bind_listener(&config)?;
    tracing::info!(target: "main", addr = %config.bind_addr, tls = config.is_tls(), "listening");

    let tls_acceptor = match &config.transport {
        TransportMode::Tls { cert_path, key_path } => Some(load_tls_acceptor(cert_path, key_path)?),
        TransportMode::Plain => None,
    };

    #[cfg(unix)]
    if let Some((group, user)) = &config.drop_privileges_to {
        let status = originserve::privilege::drop_privileges(group, user);
        tracing::info!(target: "main", ?status, %group, %user, "dropped privileges");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let server = tokio::spawn(originserve::server::server_impl::run(
        listener,
        Arc::clone(&config),
        Arc::clone(&policy),
        tls_acceptor,
        shutdown_rx,
    ));

    wait_for_shutdown_signal().await;
    tracing::info!(target: "main", "shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = server.await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
