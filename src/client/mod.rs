//! NNTP client session over an encrypted stream

mod auth;
mod connection;
mod group_ops;
mod headers;
mod io;
mod state;

use crate::config::ServerConfig;
use state::ConnectionState;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::debug;

/// Byte stream an [`NntpClient`] can run over
///
/// Production sessions use TLS over TCP; tests plug in in-memory duplex
/// streams.
pub trait NntpIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> NntpIo for T {}

/// Async NNTP client for harvesting compact header blocks
///
/// # Example
///
/// ```no_run
/// use nntp_harvest::{NntpClient, ServerConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ServerConfig::tls("news.example.com", "user", "pass");
/// let mut client = NntpClient::connect(Arc::new(config)).await?;
/// client.authenticate().await?;
///
/// let info = client.select_group("alt.test").await?;
/// println!("Group has {} articles ({}-{})", info.count, info.low, info.high);
/// client.quit().await?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct NntpClient<S: NntpIo = TlsStream<TcpStream>> {
    /// Buffered stream (both reader and writer)
    stream: BufReader<S>,
    /// Connection state
    state: ConnectionState,
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Currently selected newsgroup
    current_group: Option<String>,
    /// Whether this connection is broken (received garbage/invalid data)
    is_broken: bool,
}

impl<S: NntpIo> NntpClient<S> {
    /// Check if this connection is broken and should be discarded
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    /// Mark this connection as broken
    fn mark_broken(&mut self) {
        self.is_broken = true;
    }

    /// Get the currently selected newsgroup, if any
    pub fn current_group(&self) -> Option<&str> {
        self.current_group.as_deref()
    }

    /// Check if the client is currently authenticated
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, ConnectionState::Authenticated)
    }
}

impl<S: NntpIo> Drop for NntpClient<S> {
    fn drop(&mut self) {
        debug!("NntpClient dropped");
    }
}
