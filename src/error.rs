//! Harvester error types

use thiserror::Error;

/// Errors raised while talking to the server, decoding header blocks,
/// or persisting articles
///
/// Every variant except [`HarvestError::StoreBusy`] is fatal for the run.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error during secure connection
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection or read timeout
    #[error("Connection timeout")]
    Timeout,

    /// Connection closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,

    /// Malformed response framing (short status code, missing terminator)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server answered with a status the current step cannot accept
    #[error("Unexpected status {code}: {message}")]
    UnexpectedStatus {
        /// 3-digit response code
        code: u16,
        /// Status message from server
        message: String,
    },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Response content does not have the expected shape
    #[error("Format error: {0}")]
    Format(String),

    /// Inflating a compact header block failed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Compact header block ended before the compressed stream did
    #[error("Premature end of compressed header block")]
    PrematureEnd,

    /// Per-field header responses disagree on article identity or count
    #[error(
        "Alignment error in {field} at record {index}: expected article {expected:?}, got {found:?}"
    )]
    Alignment {
        /// Header field whose response did not line up
        field: &'static str,
        /// Position within the batch
        index: usize,
        /// Article id already recorded at this position, if any
        expected: Option<u64>,
        /// Article id reported by this field, if any
        found: Option<u64>,
    },

    /// Store is locked by another connection; the operation may be retried
    #[error("Store is busy")]
    StoreBusy,

    /// Any other store failure
    #[error("Store error: {0}")]
    Store(sqlx::Error),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid settings
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// SQLite primary result code for `SQLITE_BUSY`
const SQLITE_BUSY: i32 = 5;

impl From<sqlx::Error> for HarvestError {
    fn from(err: sqlx::Error) -> Self {
        if is_busy(&err) {
            return HarvestError::StoreBusy;
        }
        HarvestError::Store(err)
    }
}

/// Extended result codes keep the primary code in the low byte
fn is_busy(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| code & 0xff == SQLITE_BUSY)
}

impl HarvestError {
    /// Whether the failed operation may be retried as-is
    pub fn is_transient(&self) -> bool {
        matches!(self, HarvestError::StoreBusy)
    }
}

/// Result type alias using HarvestError
pub type Result<T> = std::result::Result<T, HarvestError>;
