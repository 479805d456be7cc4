//! Server and harvest configuration

use crate::article::HeaderField;
use crate::error::{HarvestError, Result};
use std::time::Duration;

/// Default TLS port for NNTP (NNTPS)
pub const DEFAULT_TLS_PORT: u16 = 563;

/// Default number of article ids requested per field query
pub const DEFAULT_BATCH_SIZE: u64 = 10;

/// Default delay between attempts when the store reports it is busy
pub const DEFAULT_BUSY_BACKOFF: Duration = Duration::from_secs(1);

/// NNTP server configuration
///
/// Contains all the information needed to open an encrypted session.
///
/// # Example
///
/// ```
/// use nntp_harvest::ServerConfig;
///
/// let config = ServerConfig::tls("news.example.com", "user", "pass");
/// assert_eq!(config.port, 563);
///
/// let config = ServerConfig::from_address("news.example.com:443", "user", "pass").unwrap();
/// assert_eq!(config.port, 443);
/// ```
#[must_use]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerConfig {
    /// Server hostname (e.g., "news.example.com")
    pub host: String,

    /// Server port (563 for implicit TLS)
    pub port: u16,

    /// Allow insecure TLS connections (self-signed certificates, expired certificates)
    ///
    /// **Security Warning:** Setting this to `true` disables certificate validation,
    /// making your connection vulnerable to man-in-the-middle attacks.
    ///
    /// Default: `false`
    #[cfg_attr(feature = "serde", serde(default))]
    pub allow_insecure_tls: bool,

    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: String,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            allow_insecure_tls: false,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create a configuration on the standard secure port (563)
    pub fn tls(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(host, DEFAULT_TLS_PORT, username, password)
    }

    /// Create a configuration from a `host[:port]` address
    ///
    /// The port defaults to 563 when omitted.
    pub fn from_address(
        address: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| HarvestError::Config(format!("Invalid port in {address}")))?;
                (host, port)
            }
            None => (address, DEFAULT_TLS_PORT),
        };

        if host.is_empty() {
            return Err(HarvestError::Config(format!("Missing host in {address}")));
        }

        Ok(Self::new(host, port, username, password))
    }

    /// Accept any server certificate
    ///
    /// **Security Warning:** only for servers you trust on a secure network.
    pub fn insecure(mut self) -> Self {
        self.allow_insecure_tls = true;
        self
    }
}

/// Tunables for the ingestion loop
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HarvestSettings {
    /// Maximum number of article ids per batch window
    pub batch_size: u64,
    /// Delay before retrying a busy `begin`/`commit`
    pub busy_backoff: Duration,
    /// Header fields to fetch, in query order
    pub fields: Vec<HeaderField>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            busy_backoff: DEFAULT_BUSY_BACKOFF,
            fields: HeaderField::TRACKED.to_vec(),
        }
    }
}

impl HarvestSettings {
    /// Settings with a custom batch width and defaults for the rest
    pub fn with_batch_size(batch_size: u64) -> Self {
        Self {
            batch_size,
            ..Default::default()
        }
    }

    /// Check the settings before any connection is made
    ///
    /// Subject must come first: it defines record identity for the batch.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(HarvestError::Config(
                "batch size must be at least 1".to_string(),
            ));
        }
        match self.fields.first() {
            None => Err(HarvestError::Config(
                "at least one header field is required".to_string(),
            )),
            Some(HeaderField::Subject) => Ok(()),
            Some(other) => Err(HarvestError::Config(format!(
                "first header field must be Subject, got {}",
                other.wire_name()
            ))),
        }
    }
}
