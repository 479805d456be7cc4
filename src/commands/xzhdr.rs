//! XZHDR: one header field for a range of articles, as a compact block

use crate::article::HeaderField;
use tracing::warn;

/// Build XZHDR command for an inclusive article range
pub fn xzhdr(field: HeaderField, lower: u64, upper: u64) -> String {
    format!("XZHDR {} {}-{}\r\n", field.wire_name(), lower, upper)
}

/// One `<article_id> <value>` line of a decoded header block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLine<'a> {
    /// Article number
    pub article_id: u64,
    /// Raw header value, without the CRLF
    pub value: &'a [u8],
}

/// Iterator over the lines of a decoded header block
///
/// Stops at the first line without a CRLF or without a nonzero
/// article number; everything before it is still yielded.
#[derive(Debug, Clone)]
pub struct HeaderLines<'a> {
    rest: &'a [u8],
}

/// Split a decoded header block into lines
pub fn parse_header_lines(plaintext: &[u8]) -> HeaderLines<'_> {
    HeaderLines { rest: plaintext }
}

impl<'a> Iterator for HeaderLines<'a> {
    type Item = HeaderLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let Some(end) = self.rest.windows(2).position(|w| w == b"\r\n") else {
            warn!("Invalid header record found");
            self.rest = &[];
            return None;
        };
        let line = &self.rest[..end];

        let digits = line.iter().take_while(|b| b.is_ascii_digit()).count();
        let article_id = std::str::from_utf8(&line[..digits])
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        if article_id == 0 {
            warn!("Invalid article id");
            self.rest = &[];
            return None;
        }

        let spaces = line[digits..].iter().take_while(|b| **b == b' ').count();
        let value = &line[digits + spaces..];

        self.rest = &self.rest[end + 2..];
        Some(HeaderLine { article_id, value })
    }
}
