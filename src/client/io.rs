//! Low-level I/O operations for NNTP protocol communication
//!
//! Every exchange goes through [`NntpClient::send_command`] and
//! [`NntpClient::receive`]:
//! - status code read as exactly three ASCII digits
//! - message line scanned up to CRLF
//! - compact header block scanned up to `CRLF "." CRLF`
//! - timeouts around every read

use super::{NntpClient, NntpIo};
use crate::error::{HarvestError, Result};
use crate::response::{NntpResponse, Status};
use crate::scan::{self, BLOCK_TERMINATOR, LINE_TERMINATOR, SentinelScanner};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{trace, warn};

const SINGLE_LINE_TIMEOUT: Duration = Duration::from_secs(60);
const MULTILINE_TIMEOUT: Duration = Duration::from_secs(180);
/// Maximum length of a status line
const MAX_LINE_SIZE: usize = 64 * 1024;
/// Maximum size for a header block to prevent OOM from malicious/broken servers (64 MB)
const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;

impl<S: NntpIo> NntpClient<S> {
    /// Send a command to the server
    pub(super) async fn send_command(&mut self, command: &str) -> Result<()> {
        trace!("Sending command: {}", command.trim());
        self.stream.get_mut().write_all(command.as_bytes()).await?;
        self.stream.get_mut().flush().await?;
        Ok(())
    }

    /// Read one response, including its header block when the status announces one
    ///
    /// Framing failures mark the connection broken.
    pub(super) async fn receive(&mut self) -> Result<NntpResponse> {
        let result = self.receive_inner().await;
        if let Err(HarvestError::Protocol(_) | HarvestError::Timeout) = &result {
            self.mark_broken();
        }
        result
    }

    async fn receive_inner(&mut self) -> Result<NntpResponse> {
        let (code, message) = timeout(SINGLE_LINE_TIMEOUT, self.read_status_line())
            .await
            .map_err(|_| HarvestError::Timeout)??;

        let mut response = NntpResponse {
            code,
            status: Status::from_code(code),
            message,
            payload: None,
        };
        if response.is_unrecognized() {
            warn!("Unrecognized response: {} {}", response.code, response.message);
        }

        if response.status.is_multiline() {
            // The message line's CRLF also opens the block, so an empty
            // block is just ".\r\n"
            let scanner = SentinelScanner::primed(BLOCK_TERMINATOR, LINE_TERMINATOR.len());
            let block = timeout(
                MULTILINE_TIMEOUT,
                scan::read_until_sentinel(&mut self.stream, scanner, MAX_BLOCK_SIZE),
            )
            .await
            .map_err(|_| HarvestError::Timeout)??;
            trace!("Received block of {} bytes", block.len());
            response.payload = Some(block);
        }

        Ok(response)
    }

    /// Read the 3-digit code and the rest of the status line
    ///
    /// A failed read of the code leaves the stream out of sync, whatever the cause.
    async fn read_status_line(&mut self) -> Result<(u16, String)> {
        let mut digits = [0u8; 3];
        if let Err(e) = self.stream.read_exact(&mut digits).await {
            return Err(match e.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    HarvestError::Protocol("connection closed before status code".to_string())
                }
                _ => HarvestError::Protocol(format!("status code read failed: {e}")),
            });
        }

        let code = parse_code(&digits)?;

        let line = scan::read_until_sentinel(
            &mut self.stream,
            SentinelScanner::new(LINE_TERMINATOR),
            MAX_LINE_SIZE,
        )
        .await?;
        let message = String::from_utf8_lossy(&line)
            .trim_start_matches(' ')
            .to_string();
        trace!("Received: {} {}", code, message);

        Ok((code, message))
    }
}

/// Parse three ASCII digits into a status code
fn parse_code(digits: &[u8; 3]) -> Result<u16> {
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(HarvestError::Protocol(format!(
            "Invalid status code: {:?}",
            String::from_utf8_lossy(digits)
        )));
    }
    Ok(digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0')))
}
