//! End-to-end coverage for [`originserve::server::connection::handle_connection`]:
//! feeds raw request bytes over a real loopback socket and asserts on the
//! raw response bytes, exercising the full parse -> validate -> resolve
//! -> respond pipeline for each scenario in spec.md §8 rather than the
//! individual C2/C3/C4 helpers in isolation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use originserve::config::{Config, TransportMode};
use originserve::policy::{Policy, RequestCapMode};
use originserve::server::connection::handle_connection;
use originserve::Transport;

fn base_config(document_root: std::path::PathBuf) -> Config {
    Config {
        hostname: "example.org".into(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        document_root,
        transport: TransportMode::Plain,
        upgrade_to_https: false,
        hsts_value: String::new(),
        server_token: "originserve".into(),
        drop_privileges_to: None,
    }
}

/// Binds an ephemeral listener, accepts exactly one connection and
/// drives it through [`handle_connection`]. `config.bind_addr` is
/// overwritten with the actual bound address so `Host` header port
/// checks against it succeed.
async fn spawn_server(mut config: Config, policy: Policy) -> SocketAddr {
    let listener = TcpListener::bind(config.bind_addr).await.unwrap();
    let local_addr = listener.local_addr().unwrap();
    config.bind_addr = local_addr;
    let config = Arc::new(config);
    let policy = Arc::new(policy);

    tokio::spawn(async move {
        let (stream, peer) = listener.accept().await.unwrap();
        handle_connection(Transport::Plain(stream), peer, config, policy).await;
    });

    local_addr
}

/// Reads whatever the server writes back within a short idle window.
/// The server writes its whole response in one or two `write_all`
/// calls in quick succession, so a 500ms gap with no further bytes
/// reliably means the response is complete.
async fn read_response(stream: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match tokio::time::timeout(Duration::from_millis(500), stream.read(&mut chunk)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => out.extend_from_slice(&chunk[..n]),
            Ok(Err(_)) => break,
        }
    }
    out
}

async fn document_root_with_index() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("index.html"), b"hi\n")
        .await
        .unwrap();
    dir
}

#[tokio::test]
async fn simple_get_returns_index_body() {
    let dir = document_root_with_index().await;
    let config = base_config(dir.path().to_path_buf());
    let addr = spawn_server(config, Policy::default()).await;

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(format!("GET / HTTP/1.1\r\nHost: example.org:{}\r\n\r\n", addr.port()).as_bytes())
        .await
        .unwrap();
    let response = read_response(&mut client).await;
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "got: {text}");
    assert!(text.contains("Content-Length: 3\r\n"));
    assert!(text.contains("Content-Type: text/html;charset=utf-8\r\n"));
    assert!(text.contains("Connection: keep-alive\r\n"));
    assert!(text.ends_with("hi\n"));
}

#[tokio::test]
async fn head_request_suppresses_body() {
    let dir = document_root_with_index().await;
    let config = base_config(dir.path().to_path_buf());
    let addr = spawn_server(config, Policy::default()).await;

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(format!("HEAD / HTTP/1.1\r\nHost: example.org:{}\r\n\r\n", addr.port()).as_bytes())
        .await
        .unwrap();
    let response = read_response(&mut client).await;
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "got: {text}");
    assert!(text.contains("Content-Length: 3\r\n"));
    assert!(text.ends_with("\r\n\r\n"), "HEAD must not carry a body: {text}");
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let dir = document_root_with_index().await;
    let config = base_config(dir.path().to_path_buf());
    let addr = spawn_server(config, Policy::default()).await;

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(
            format!(
                "GET /does-not-exist HTTP/1.1\r\nHost: example.org:{}\r\n\r\n",
                addr.port()
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    let response = read_response(&mut client).await;
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"), "got: {text}");
    assert!(text.contains("Connection: keep-alive\r\n"));
}

#[tokio::test]
async fn oversize_method_is_rejected_without_panicking() {
    let dir = document_root_with_index().await;
    let config = base_config(dir.path().to_path_buf());
    let addr = spawn_server(config, Policy::default()).await;

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"VERYLONGMETHODNAMETHATEXCEEDS / HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let response = read_response(&mut client).await;
    let text = String::from_utf8_lossy(&response);

    // Regression for the panic on `Request::url()` before the
    // request-target stage has run: the connection must answer 413,
    // not drop silently.
    assert!(text.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "got: {text}");
    assert!(text.contains("method too long"));
    assert!(text.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn missing_host_on_http11_is_rejected() {
    let dir = document_root_with_index().await;
    let config = base_config(dir.path().to_path_buf());
    let addr = spawn_server(config, Policy::default()).await;

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET / HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let response = read_response(&mut client).await;
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {text}");
    assert!(text.contains("Malformed request: no 'Host' header supplied"));
    assert!(text.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn upgrade_to_https_redirects_and_closes() {
    let dir = document_root_with_index().await;
    let mut config = base_config(dir.path().to_path_buf());
    config.upgrade_to_https = true;
    let addr = spawn_server(config, Policy::default()).await;

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /path HTTP/1.1\r\nHost: example.org\r\n\r\n")
        .await
        .unwrap();
    let response = read_response(&mut client).await;
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 301 Moved Permanently\r\n"), "got: {text}");
    assert!(text.contains("Location: https://example.org/path\r\n"));
    assert!(text.contains("Content-Length: 0\r\n"));
    assert!(text.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn http10_without_connection_header_closes_after_one_request() {
    let dir = document_root_with_index().await;
    let config = base_config(dir.path().to_path_buf());
    let addr = spawn_server(config, Policy::default()).await;

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
    let response = read_response(&mut client).await;
    let text = String::from_utf8_lossy(&response);

    // HTTP/1.0 has no Host requirement and defaults to non-persistent,
    // even though the resource itself resolves successfully.
    assert!(text.starts_with("HTTP/1.0 200 OK\r\n"), "got: {text}");
    assert!(text.contains("Connection: close\r\n"));

    // The server must have torn the connection down rather than still
    // waiting on another request: a second write should fail or the
    // peer should read EOF.
    let mut probe = [0u8; 1];
    let result = tokio::time::timeout(Duration::from_millis(200), client.read(&mut probe)).await;
    assert!(matches!(result, Ok(Ok(0))) || result.is_err());
}

#[tokio::test]
async fn directory_fallback_reports_media_type_from_served_file() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
    tokio::fs::write(dir.path().join("sub/index.html"), b"hi\n")
        .await
        .unwrap();
    let config = base_config(dir.path().to_path_buf());
    let addr = spawn_server(config, Policy::default()).await;

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(format!("GET /sub HTTP/1.1\r\nHost: example.org:{}\r\n\r\n", addr.port()).as_bytes())
        .await
        .unwrap();
    let response = read_response(&mut client).await;
    let text = String::from_utf8_lossy(&response);

    // The request path `/sub` carries no extension; the media type must
    // be derived from the resolved `sub/index.html`, not from `/sub`.
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "got: {text}");
    assert!(text.contains("Content-Type: text/html;charset=utf-8\r\n"), "got: {text}");
    assert!(text.ends_with("hi\n"));
}

#[tokio::test]
async fn strict_request_cap_rejects_each_request_without_flooding() {
    let dir = document_root_with_index().await;
    let config = base_config(dir.path().to_path_buf());
    let policy = Policy {
        max_requests_per_connection: 1,
        request_cap_mode: RequestCapMode::Strict,
        ..Policy::default()
    };
    let addr = spawn_server(config, policy).await;

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();

    let request = format!("GET / HTTP/1.1\r\nHost: example.org:{}\r\n\r\n", addr.port());

    // First request is within the cap and must be served normally.
    client.write_all(request.as_bytes()).await.unwrap();
    let first = String::from_utf8_lossy(&read_response(&mut client).await).to_string();
    assert!(first.starts_with("HTTP/1.1 200 OK\r\n"), "got: {first}");

    // Second request is over the cap: the server must read it off the
    // wire and reject it with exactly one 429, not spin emitting 429s
    // without ever consuming the bytes of the request that arrived.
    client.write_all(request.as_bytes()).await.unwrap();
    let second = String::from_utf8_lossy(&read_response(&mut client).await).to_string();
    assert!(second.starts_with("HTTP/1.1 429 Too Many Requests\r\n"), "got: {second}");
    assert_eq!(second.matches("429 Too Many Requests").count(), 1, "got: {second}");

    // No request was sent after the second: the connection must be
    // blocked waiting for one, not still writing more 429s.
    let mut probe = [0u8; 1];
    let result = tokio::time::timeout(Duration::from_millis(200), client.read(&mut probe)).await;
    assert!(result.is_err(), "server kept writing without reading the next request: {result:?}");
}
