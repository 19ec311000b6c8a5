//! Byte transport (C1): octet read/write over plain or TLS sockets,
//! short-write-safe bulk writes, and a zero-copy file-transfer path.
//!
//! Grounded in the teacher's `tokio::select!`-based read-vs-timeout race
//! (`Parser::fill_buffer`), generalized to also cover a TLS stream and a
//! `sendfile(2)` body path that the teacher never needed (it has no
//! filesystem-serving component at all).

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

/// A connection's byte transport: either a plain TCP socket or a
/// TLS session terminated over one.
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    /// Enables `TCP_NODELAY` on the underlying socket so small HTTP
    /// response prefixes aren't held back by Nagle's algorithm.
    pub fn set_nodelay(&self) -> io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.set_nodelay(true),
            Transport::Tls(stream) => stream.get_ref().0.set_nodelay(true),
        }
    }

    /// Reads whatever is available into `buf`, returning the number of
    /// bytes read (`0` signals EOF). Races against `timeout` when one is
    /// supplied, surfacing an expiry as a `TimedOut` I/O error — this is
    /// the idle-read-timeout slowloris mitigation named as a natural
    /// extension.
    pub async fn read_some(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> io::Result<usize> {
        let read_fut = async {
            match self {
                Transport::Plain(stream) => stream.read(buf).await,
                Transport::Tls(stream) => stream.read(buf).await,
            }
        };

        match timeout {
            Some(duration) => {
                tokio::select! {
                    result = read_fut => result,
                    _ = tokio::time::sleep(duration) => {
                        Err(io::Error::new(io::ErrorKind::TimedOut, "idle read timeout"))
                    }
                }
            }
            None => read_fut.await,
        }
    }

    /// Writes the whole buffer, looping over partial writes.
    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.write_all(bytes).await,
            Transport::Tls(stream) => stream.write_all(bytes).await,
        }
    }

    /// Sends `len` bytes from the start of `file`. Plain transport on
    /// Linux prefers `sendfile(2)` so the file's contents never cross
    /// into userspace; every other case (TLS, non-Linux) bounces through
    /// a fixed-size buffer, since TLS cannot consume a raw file
    /// descriptor and non-Linux Unixes have an incompatible `sendfile`
    /// signature not worth special-casing here.
    pub async fn send_file(&mut self, file: &mut tokio::fs::File, len: u64) -> io::Result<()> {
        match self {
            #[cfg(target_os = "linux")]
            Transport::Plain(stream) => send_file_linux(stream, file, len).await,
            #[cfg(not(target_os = "linux"))]
            Transport::Plain(stream) => send_file_bounce(stream, file, len).await,
            Transport::Tls(stream) => send_file_bounce(stream, file, len).await,
        }
    }

    /// Half-closes the write side then lets `Drop` close the socket.
    /// Deliberately does not poll the outbound queue for drain (see
    /// DESIGN.md Open Question 1) — the original's `TIOCOUTQ` poll-sleep
    /// loop is not ported.
    pub async fn shutdown(&mut self) {
        let result = match self {
            Transport::Plain(stream) => stream.shutdown().await,
            Transport::Tls(stream) => stream.shutdown().await,
        };
        if let Err(error) = result {
            tracing::warn!(target: "Transport::shutdown", %error, "shutdown syscall failed, ignoring");
        }
    }
}

#[cfg(target_os = "linux")]
async fn send_file_linux(
    stream: &mut TcpStream,
    file: &mut tokio::fs::File,
    len: u64,
) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let file_fd = file.as_raw_fd();
    let sock_fd = stream.as_raw_fd();
    let mut offset: libc::off64_t = 0;
    let mut remaining = len;

    while remaining > 0 {
        stream.writable().await?;

        let count = remaining.min(0x7fff_f000) as usize;
        let ret = unsafe { libc::sendfile64(sock_fd, file_fd, &mut offset, count) };

        if ret < 0 {
            let err = io::Error::last_os_error();
            if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) {
                continue;
            }
            return Err(err);
        }

        if ret == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "sendfile returned 0"));
        }

        remaining -= ret as u64;
    }

    Ok(())
}

async fn send_file_bounce<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    file: &mut tokio::fs::File,
    len: u64,
) -> io::Result<()> {
    let mut remaining = len;
    let mut chunk = [0u8; 4096];

    while remaining > 0 {
        let want = remaining.min(chunk.len() as u64) as usize;
        let n = file.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shorter than advertised length",
            ));
        }
        writer.write_all(&chunk[..n]).await?;
        remaining -= n as u64;
    }

    Ok(())
}
