//! Sentinel scanning over a byte stream of unknown length
//!
//! NNTP responses carry no length prefix: a status line ends at `CRLF`
//! and a multiline block ends at `CRLF "." CRLF`. The reader pulls one
//! byte at a time and feeds a [`SentinelScanner`], which tracks how much
//! of the delimiter the most recent bytes match.

use crate::error::{HarvestError, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Delimiter ending a single response line
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Delimiter ending a multiline block
pub const BLOCK_TERMINATOR: &[u8] = b"\r\n.\r\n";

/// Growth increment for the accumulation buffer
const BUFFER_INCREMENT: usize = 1024;

/// Incremental matcher for a fixed delimiter
///
/// Keeps a running match length plus a prefix-fallback table, so a
/// mismatching byte can still begin (or continue) a new match.
#[derive(Debug, Clone)]
pub struct SentinelScanner {
    sentinel: &'static [u8],
    fallback: Vec<usize>,
    matched: usize,
}

impl SentinelScanner {
    /// Create a scanner for `sentinel`
    ///
    /// # Panics
    ///
    /// Panics if `sentinel` is empty.
    pub fn new(sentinel: &'static [u8]) -> Self {
        assert!(!sentinel.is_empty(), "sentinel must not be empty");

        // fallback[i]: length of the longest proper prefix of sentinel[..=i]
        // that is also a suffix of it
        let mut fallback = vec![0; sentinel.len()];
        let mut k = 0;
        for i in 1..sentinel.len() {
            while k > 0 && sentinel[i] != sentinel[k] {
                k = fallback[k - 1];
            }
            if sentinel[i] == sentinel[k] {
                k += 1;
            }
            fallback[i] = k;
        }

        Self {
            sentinel,
            fallback,
            matched: 0,
        }
    }

    /// Scanner that starts as if `primed` sentinel bytes were already seen
    ///
    /// Used for blocks that begin right after a line's CRLF, so an empty
    /// block (`".\r\n"`) still completes the terminator.
    pub fn primed(sentinel: &'static [u8], primed: usize) -> Self {
        let mut scanner = Self::new(sentinel);
        scanner.matched = primed.min(sentinel.len() - 1);
        scanner
    }

    /// The delimiter this scanner looks for
    pub fn sentinel(&self) -> &'static [u8] {
        self.sentinel
    }

    /// Number of delimiter bytes matched so far
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Feed one byte; returns `true` when the delimiter is complete
    pub fn push(&mut self, byte: u8) -> bool {
        while self.matched > 0 && self.sentinel[self.matched] != byte {
            self.matched = self.fallback[self.matched - 1];
        }
        if self.sentinel[self.matched] == byte {
            self.matched += 1;
        }
        if self.matched == self.sentinel.len() {
            self.matched = 0;
            return true;
        }
        false
    }
}

/// Read bytes until `scanner` completes, returning everything before the delimiter
///
/// EOF before the delimiter is a [`HarvestError::Protocol`]: a partial
/// line or block is never returned. `limit` caps the accumulated size.
pub async fn read_until_sentinel<R>(
    reader: &mut R,
    mut scanner: SentinelScanner,
    limit: usize,
) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer: Vec<u8> = Vec::with_capacity(BUFFER_INCREMENT);

    loop {
        let byte = match reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(HarvestError::Protocol(format!(
                    "connection closed before {:?} after {} bytes",
                    String::from_utf8_lossy(scanner.sentinel()),
                    buffer.len()
                )));
            }
            Err(e) => return Err(HarvestError::Io(e)),
        };

        if buffer.len() == buffer.capacity() {
            buffer.reserve(BUFFER_INCREMENT);
        }
        buffer.push(byte);

        if scanner.push(byte) {
            // A primed scanner may have matched bytes that never entered the buffer
            let keep = buffer.len().saturating_sub(scanner.sentinel().len());
            buffer.truncate(keep);
            return Ok(buffer);
        }

        if buffer.len() > limit {
            return Err(HarvestError::Protocol(format!(
                "response exceeds maximum size of {} bytes",
                limit
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(sentinel: &'static [u8], input: &[u8]) -> Option<usize> {
        let mut scanner = SentinelScanner::new(sentinel);
        input
            .iter()
            .position(|&b| scanner.push(b))
            .map(|end| end + 1 - sentinel.len())
    }

    #[test]
    fn test_finds_line_terminator() {
        assert_eq!(scan_all(LINE_TERMINATOR, b"200 ready\r\n"), Some(9));
        assert_eq!(scan_all(LINE_TERMINATOR, b"\r\n"), Some(0));
        assert_eq!(scan_all(LINE_TERMINATOR, b"no end"), None);
    }

    #[test]
    fn test_lone_cr_does_not_match() {
        assert_eq!(scan_all(LINE_TERMINATOR, b"a\rb\r\r\n"), Some(4));
    }

    #[test]
    fn test_block_terminator_after_false_start() {
        // "\r\n\r\n.\r\n": the second CRLF restarts the match
        assert_eq!(scan_all(BLOCK_TERMINATOR, b"x\r\n\r\n.\r\n"), Some(3));
        // "\r\n.\r" followed by "\r\n.\r\n"
        assert_eq!(scan_all(BLOCK_TERMINATOR, b"a\r\n.\r\r\n.\r\n"), Some(5));
        // Dot-stuffed line is not a terminator
        assert_eq!(scan_all(BLOCK_TERMINATOR, b"a\r\n..\r\nb\r\n.\r\n"), Some(8));
    }

    #[test]
    fn test_primed_scanner_matches_empty_block() {
        let mut scanner = SentinelScanner::primed(BLOCK_TERMINATOR, 2);
        assert_eq!(scanner.matched(), 2);
        assert!(!scanner.push(b'.'));
        assert!(!scanner.push(b'\r'));
        assert!(scanner.push(b'\n'));
    }

    #[tokio::test]
    async fn test_read_returns_prefix_before_sentinel() {
        let mut input: &[u8] = b"hello world\r\nrest";
        let line = read_until_sentinel(&mut input, SentinelScanner::new(LINE_TERMINATOR), 1024)
            .await
            .unwrap();
        assert_eq!(line, b"hello world");
        // Bytes after the sentinel stay unread
        assert_eq!(input, b"rest");
    }

    #[tokio::test]
    async fn test_read_across_chunk_boundaries() {
        let expected = b"line one\r\nline two";
        for split in 1..expected.len() + 4 {
            let mut stream: Vec<u8> = expected.to_vec();
            stream.extend_from_slice(BLOCK_TERMINATOR);
            let (a, b) = stream.split_at(split.min(stream.len()));

            let mut mock = tokio_test::io::Builder::new().read(a).read(b).build();
            let block =
                read_until_sentinel(&mut mock, SentinelScanner::new(BLOCK_TERMINATOR), 1 << 20)
                    .await
                    .unwrap();
            assert_eq!(block, expected, "split at {split}");
        }
    }

    #[tokio::test]
    async fn test_read_primed_block() {
        let mut input: &[u8] = b".\r\n";
        let block = read_until_sentinel(
            &mut input,
            SentinelScanner::primed(BLOCK_TERMINATOR, 2),
            1024,
        )
        .await
        .unwrap();
        assert!(block.is_empty());

        let mut input: &[u8] = b"abc\r\n.\r\n";
        let block = read_until_sentinel(
            &mut input,
            SentinelScanner::primed(BLOCK_TERMINATOR, 2),
            1024,
        )
        .await
        .unwrap();
        assert_eq!(block, b"abc");
    }

    #[tokio::test]
    async fn test_eof_before_sentinel_is_protocol_error() {
        let mut input: &[u8] = b"partial block\r\n";
        let result =
            read_until_sentinel(&mut input, SentinelScanner::new(BLOCK_TERMINATOR), 1024).await;
        assert!(matches!(result, Err(HarvestError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_limit_is_enforced() {
        let data = vec![b'a'; 64];
        let mut input: &[u8] = &data;
        let result =
            read_until_sentinel(&mut input, SentinelScanner::new(LINE_TERMINATOR), 16).await;
        assert!(matches!(result, Err(HarvestError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_buffer_grows_past_increment() {
        let mut data = vec![b'x'; BUFFER_INCREMENT * 3 + 7];
        data.extend_from_slice(LINE_TERMINATOR);
        let mut input: &[u8] = &data;
        let line = read_until_sentinel(&mut input, SentinelScanner::new(LINE_TERMINATOR), 1 << 20)
            .await
            .unwrap();
        assert_eq!(line.len(), BUFFER_INCREMENT * 3 + 7);
    }
}
