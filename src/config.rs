//! Process-startup configuration: identity/network settings that are
//! disjoint from the numeric/boolean [`crate::policy::Policy`] record.
//!
//! Loaded from environment variables so the binary needs no CLI-parsing
//! dependency; every field has a default so an unconfigured process
//! still starts and serves `ORIGINSERVE_ROOT` (default `./public`) on
//! `127.0.0.1:8080`.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Plain TCP, or TLS with certificate/chain/key paths.
#[derive(Debug, Clone)]
pub enum TransportMode {
    Plain,
    Tls {
        cert_path: PathBuf,
        key_path: PathBuf,
    },
}

/// Settings loaded once at startup and shared immutably across workers.
#[derive(Debug, Clone)]
pub struct Config {
    /// Configured hostname; must match the `Host` header for HTTP/1.1
    /// requests from non-local peers.
    pub hostname: String,
    /// Address the listening socket binds to.
    pub bind_addr: SocketAddr,
    /// Document root all requests are resolved against.
    pub document_root: PathBuf,
    /// Plain or TLS.
    pub transport: TransportMode,
    /// Redirect plain-transport requests to the https:// equivalent.
    pub upgrade_to_https: bool,
    /// `Strict-Transport-Security` header value; empty disables HSTS.
    pub hsts_value: String,
    /// `Server:` response header token.
    pub server_token: String,
    /// Optional unprivileged group/user to drop to after binding.
    pub drop_privileges_to: Option<(String, String)>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let hostname = env_or("ORIGINSERVE_HOSTNAME", "localhost");
        let bind_addr = env_or("ORIGINSERVE_BIND", "127.0.0.1:8080")
            .parse()
            .unwrap_or_else(|_| "127.0.0.1:8080".parse().unwrap());
        let document_root = PathBuf::from(env_or("ORIGINSERVE_ROOT", "./public"));

        let transport = match env::var("ORIGINSERVE_TLS_CERT") {
            Ok(cert) => TransportMode::Tls {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(env_or("ORIGINSERVE_TLS_KEY", "")),
            },
            Err(_) => TransportMode::Plain,
        };

        let upgrade_to_https = env_flag("ORIGINSERVE_UPGRADE_TO_HTTPS", false);
        let hsts_value = env_or(
            "ORIGINSERVE_HSTS",
            "max-age=63072000; includeSubDomains; preload",
        );
        let server_token = env_or("ORIGINSERVE_SERVER_TOKEN", "originserve");

        let drop_privileges_to = match (
            env::var("ORIGINSERVE_DROP_GROUP"),
            env::var("ORIGINSERVE_DROP_USER"),
        ) {
            (Ok(group), Ok(user)) => Some((group, user)),
            _ => None,
        };

        Config {
            hostname,
            bind_addr,
            document_root,
            transport,
            upgrade_to_https,
            hsts_value,
            server_token,
            drop_privileges_to,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.transport, TransportMode::Tls { .. })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.as_str(), "1" | "true" | "TRUE" | "yes"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_transport_by_default() {
        // SAFETY-free: reads the process environment, which tests don't
        // mutate for this key.
        let cfg = Config {
            hostname: "example.org".into(),
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            document_root: PathBuf::from("/srv/www"),
            transport: TransportMode::Plain,
            upgrade_to_https: false,
            hsts_value: String::new(),
            server_token: "originserve".into(),
            drop_privileges_to: None,
        };
        assert!(!cfg.is_tls());
    }
}
