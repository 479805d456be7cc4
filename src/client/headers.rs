//! Compact header retrieval (XZHDR)

use super::{NntpClient, NntpIo};
use crate::article::HeaderField;
use crate::commands;
use crate::error::{HarvestError, Result};
use crate::multiplex::{BatchWindow, HeaderSource};
use crate::response::Status;
use async_trait::async_trait;
use tracing::debug;

impl<S: NntpIo> NntpClient<S> {
    /// Fetch one field for a window of articles as a raw compact block
    ///
    /// The block is returned still encoded; see [`crate::compact::decode`].
    pub async fn xzhdr(&mut self, field: HeaderField, window: BatchWindow) -> Result<Vec<u8>> {
        debug!("XZHDR {} {}-{}", field, window.lower, window.upper);

        let cmd = commands::xzhdr(field, window.lower, window.upper);
        self.send_command(&cmd).await?;
        let response = self.receive().await?;

        if response.status != Status::HeaderBlockOk {
            return Err(HarvestError::UnexpectedStatus {
                code: response.code,
                message: response.message,
            });
        }

        response.payload.ok_or_else(|| {
            HarvestError::Protocol("221 response carried no header block".to_string())
        })
    }
}

#[async_trait]
impl<S: NntpIo> HeaderSource for NntpClient<S> {
    async fn fetch_header_block(
        &mut self,
        field: HeaderField,
        window: BatchWindow,
    ) -> Result<Vec<u8>> {
        self.xzhdr(field, window).await
    }
}
