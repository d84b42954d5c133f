//! Configuration for the administrative socket connection.

use crate::error::{AdminError, Result};
use crate::types::ProtocolVersion;
use std::path::Path;
use std::time::Duration;

/// Default management host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default management port (`varnishd -T`).
pub const DEFAULT_PORT: u16 = 6082;

/// Configuration for connecting to the management socket.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Host name or address of the management interface.
    pub host: String,
    /// Port of the management interface.
    pub port: u16,
    /// Major CLI version spoken by the daemon.
    pub version: ProtocolVersion,
    /// Shared secret used when the daemon demands authentication.
    pub secret: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read timeout for a single response frame.
    pub read_timeout: Duration,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            version: ProtocolVersion::V3,
            secret: None,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
        }
    }
}

impl AdminConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the protocol version.
    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the shared secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Load the shared secret from a `varnishadm -S` style file.
    pub fn secret_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.secret = Some(read_secret_file(path.as_ref())?);
        Ok(self)
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// The `host:port` string used for dialing and in error messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read the shared secret from a file.
///
/// One trailing line terminator is removed: the handshake appends its own
/// newline after the secret, and secret files are usually written with one.
pub fn read_secret_file(path: &Path) -> Result<String> {
    let data = std::fs::read_to_string(path).map_err(|e| AdminError::SecretFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let secret = data
        .strip_suffix("\r\n")
        .or_else(|| data.strip_suffix('\n'))
        .unwrap_or(&data);

    if secret.is_empty() {
        return Err(AdminError::SecretFile {
            path: path.display().to_string(),
            reason: "file is empty".to_string(),
        });
    }

    Ok(secret.to_string())
}
