//! NNTP response types and status codes

/// Status classes the harvester understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200 - server ready
    GreetingOk,
    /// 211 - group selected
    GroupOk,
    /// 221 - compact header block follows
    HeaderBlockOk,
    /// 281 - authentication accepted
    AuthOk,
    /// 381 - password required
    PasswordRequired,
    /// Any other code; the caller decides whether that is a failure
    Unrecognized,
}

impl Status {
    /// Classify a 3-digit response code
    pub fn from_code(code: u16) -> Self {
        match code {
            codes::READY => Status::GreetingOk,
            codes::GROUP_SELECTED => Status::GroupOk,
            codes::HEADER_BLOCK_FOLLOWS => Status::HeaderBlockOk,
            codes::AUTH_ACCEPTED => Status::AuthOk,
            codes::PASSWORD_REQUIRED => Status::PasswordRequired,
            _ => Status::Unrecognized,
        }
    }

    /// Whether a multiline block follows the status line
    pub fn is_multiline(self) -> bool {
        matches!(self, Status::HeaderBlockOk)
    }
}

/// NNTP response with status code, message, and optional multiline payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NntpResponse {
    /// 3-digit NNTP response code
    pub code: u16,
    /// Classified status
    pub status: Status,
    /// First line, leading spaces stripped
    pub message: String,
    /// Raw block bytes up to (not including) the terminator
    pub payload: Option<Vec<u8>>,
}

impl NntpResponse {
    /// Check if the code is one the harvester does not handle
    pub fn is_unrecognized(&self) -> bool {
        self.status == Status::Unrecognized
    }
}

/// NNTP response codes used by the harvester
pub mod codes {
    /// Server ready
    pub const READY: u16 = 200;
    /// Closing connection
    pub const CLOSING_CONNECTION: u16 = 205;
    /// Group selected
    pub const GROUP_SELECTED: u16 = 211;
    /// Compressed header block follows (XZHDR)
    pub const HEADER_BLOCK_FOLLOWS: u16 = 221;
    /// Authentication accepted
    pub const AUTH_ACCEPTED: u16 = 281;
    /// Password required
    pub const PASSWORD_REQUIRED: u16 = 381;
    /// No such newsgroup
    pub const NO_SUCH_GROUP: u16 = 411;
}
