//! Server configuration.
//!
//! Settings are plain data: loaded once (from YAML or built in code), cloned
//! into the server at construction, and never mutated afterwards.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for the HTTP listener and request parsing limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Port to listen on.
    pub port: u16,
    /// Maximum number of pending connections on the listening socket.
    pub backlog: u32,
    /// Maximum size in bytes of a request line or header line.
    pub max_line_size: usize,
    /// Maximum number of request headers.
    pub max_header_count: usize,
    /// Maximum size in bytes of a url-encoded form body.
    pub max_form_size: usize,
    /// Socket read timeout in milliseconds.
    pub read_timeout_ms: u64,
    /// TLS certificate configuration. When present, every accepted
    /// connection performs a server-side TLS handshake before any
    /// protocol bytes are read.
    pub tls: Option<TlsSettings>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            backlog: 100,
            max_line_size: 8192,
            max_header_count: 100,
            max_form_size: 2 * 1024 * 1024,
            read_timeout_ms: 5000,
            tls: None,
        }
    }
}

impl ServerSettings {
    /// Load settings from a YAML file. Missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// PEM certificate and private key paths for the TLS acceptor.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsSettings {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

/// Settings for a WebSocket endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WsSettings {
    /// Maximum size in bytes of a reassembled message. A message that
    /// grows past this bound terminates the connection.
    pub max_message_size: usize,
    /// Host pattern the `Origin` header must match, when set. The header
    /// must equal `http://<pattern>` or `https://<pattern>` exactly.
    pub origin: Option<String>,
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            max_message_size: 1024,
            origin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = ServerSettings::default();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.backlog, 100);
        assert_eq!(settings.max_line_size, 8192);
        assert_eq!(settings.max_header_count, 100);
        assert_eq!(settings.read_timeout(), Duration::from_millis(5000));
        assert!(settings.tls.is_none());
    }

    #[test]
    fn yaml_overrides() {
        let settings: ServerSettings =
            serde_yaml::from_str("port: 9090\nmax_line_size: 1024\n").unwrap();
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.max_line_size, 1024);
        // untouched keys keep their defaults
        assert_eq!(settings.max_header_count, 100);
    }
}
