//! Connection state for the NNTP client

/// Session progress, from greeting to QUIT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ConnectionState {
    /// Greeting accepted, not authenticated
    Ready,
    /// AUTHINFO USER sent, waiting for the exchange to finish
    InProgress,
    /// Successfully authenticated
    Authenticated,
    /// QUIT sent
    Closed,
}
