//! Connection management for NNTP client
//!
//! This module handles TCP/TLS connection establishment, socket tuning,
//! and server greeting validation.

use crate::config::ServerConfig;
use crate::error::{HarvestError, Result};
use crate::response::Status;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, warn};

use super::state::ConnectionState;
use super::{NntpClient, NntpIo};

/// TCP connection timeout in seconds
const TCP_CONNECT_TIMEOUT_SECS: u64 = 120;

/// TLS handshake timeout in seconds
const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 60;

/// BufReader capacity; compact header blocks arrive in large bursts
const BUFREADER_CAPACITY: usize = 256 * 1024;

/// Socket receive buffer requested from the OS
const RECV_BUFFER_SIZE: usize = 1024 * 1024;

/// Dangerous certificate verifier that accepts all certificates
///
/// **Security Warning:** This verifier disables all certificate validation,
/// making connections vulnerable to man-in-the-middle attacks. Only use this
/// with servers you trust on a secure network.
#[derive(Debug)]
pub(super) struct DangerousAcceptAnyCertificate;

impl ServerCertVerifier for DangerousAcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

/// Build the rustls client configuration for `config`
fn tls_config(config: &ServerConfig) -> ClientConfig {
    if config.allow_insecure_tls {
        warn!("TLS certificate validation disabled - connection vulnerable to MITM attacks");
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousAcceptAnyCertificate))
            .with_no_client_auth()
    } else {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    }
}

/// Resolve and connect a tuned TCP socket
async fn connect_tcp(config: &ServerConfig) -> Result<TcpStream> {
    use socket2::{Domain, Protocol, Socket, Type};
    use std::net::ToSocketAddrs;

    let addr = format!("{}:{}", config.host, config.port);
    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| {
            HarvestError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Failed to resolve address: {}", e),
            ))
        })?
        .next()
        .ok_or_else(|| {
            HarvestError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "No address resolved",
            ))
        })?;

    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(HarvestError::Io)?;

    // Request/response protocol: send commands immediately
    socket.set_nodelay(true).map_err(HarvestError::Io)?;

    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        warn!(
            "Failed to set receive buffer size to {} bytes: {}",
            RECV_BUFFER_SIZE, e
        );
    }

    // socket2::Socket::connect() is blocking; connect before switching to non-blocking
    let tcp_stream = timeout(
        Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS),
        tokio::task::spawn_blocking(move || -> std::io::Result<std::net::TcpStream> {
            socket.connect(&socket_addr.into())?;
            socket.set_nonblocking(true)?;
            Ok(socket.into())
        }),
    )
    .await
    .map_err(|_| HarvestError::Timeout)?
    .map_err(|e| HarvestError::Io(std::io::Error::other(format!("Task join error: {}", e))))?
    .map_err(HarvestError::Io)?;

    TcpStream::from_std(tcp_stream).map_err(HarvestError::Io)
}

impl NntpClient {
    /// Connect to NNTP server with TLS
    ///
    /// Establishes a secure connection to the NNTP server specified in the config
    /// and reads the greeting. Does not authenticate - call
    /// [`authenticate`](Self::authenticate) after connecting.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`HarvestError::Io`] - TCP connection fails (DNS resolution, network unreachable, etc.)
    /// - [`HarvestError::Tls`] - TLS handshake fails (invalid certificate, protocol error)
    /// - [`HarvestError::Timeout`] - Connection or handshake times out
    /// - [`HarvestError::UnexpectedStatus`] - Greeting is not 200
    pub async fn connect(config: Arc<ServerConfig>) -> Result<Self> {
        debug!("Connecting to NNTP server {}:{}", config.host, config.port);

        let tcp_stream = connect_tcp(&config).await?;

        use tokio_rustls::rustls::crypto::{CryptoProvider, ring};
        let _ = CryptoProvider::install_default(ring::default_provider());

        let connector = TlsConnector::from(Arc::new(tls_config(&config)));
        let server_name = ServerName::try_from(config.host.as_str())
            .map_err(|e| HarvestError::Tls(format!("Invalid domain: {}", e)))?
            .to_owned();

        let tls_stream: TlsStream<TcpStream> = timeout(
            Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS),
            connector.connect(server_name, tcp_stream),
        )
        .await
        .map_err(|_| HarvestError::Timeout)?
        .map_err(|e| HarvestError::Tls(format!("TLS handshake failed: {}", e)))?;

        Self::from_stream(tls_stream, config).await
    }
}

impl<S: NntpIo> NntpClient<S> {
    /// Start a session over an already established stream
    ///
    /// Reads the server greeting, which must be `200`.
    pub async fn from_stream(io: S, config: Arc<ServerConfig>) -> Result<Self> {
        let mut client = Self {
            stream: BufReader::with_capacity(BUFREADER_CAPACITY, io),
            state: ConnectionState::Ready,
            config,
            current_group: None,
            is_broken: false,
        };

        let greeting = client.receive().await?;
        debug!("Server greeting: {} {}", greeting.code, greeting.message);

        if greeting.status != Status::GreetingOk {
            return Err(HarvestError::UnexpectedStatus {
                code: greeting.code,
                message: greeting.message,
            });
        }

        Ok(client)
    }
}
