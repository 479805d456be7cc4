//! Compact header blocks
//!
//! `XZHDR` answers with a raw DEFLATE stream wrapped in a yEnc-style
//! transport encoding:
//!
//! ```text
//! =ybegin line=128 size=-1
//! <escaped bytes, 128 columns per line>
//! =yend ...
//! ```
//!
//! Every byte is shifted by 42; bytes that would collide with line
//! framing are written as `=` followed by the shifted byte plus 64.

mod decode;
mod encode;

pub use decode::decode;
pub use encode::encode;

/// First line of every compact block, CRLF included
pub const PREAMBLE: &[u8] = b"=ybegin line=128 size=-1\r\n";

/// Prefix of the line that ends the encoded data
pub const TRAILER: &[u8] = b"=yend";

/// Columns per encoded line
pub const LINE_WIDTH: usize = 128;

/// Input and output chunk size for the inflater
pub(crate) const CHUNK_SIZE: usize = 256 * 1024;

/// Offset added to every byte before transmission
pub(crate) const SHIFT: u8 = 42;

/// Offset added to the shifted byte when it is escaped
pub(crate) const ESCAPE_SHIFT: u8 = 64;

/// Escape marker
pub(crate) const ESCAPE: u8 = b'=';

/// Escape codes a well-formed block may contain
///
/// NUL, TAB, LF, CR, `=`, `.` and space, each plus 64.
pub(crate) const KNOWN_ESCAPES: [u8; 7] = [b'@', b'I', b'J', b'M', b'}', b'n', b'`'];
