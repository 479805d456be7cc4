use super::{NntpClient, NntpIo};
use crate::commands::{self, GroupInfo};
use crate::error::{HarvestError, Result};
use crate::response::{Status, codes};
use tracing::{debug, warn};

impl<S: NntpIo> NntpClient<S> {
    /// Select a newsgroup
    ///
    /// Returns [`GroupInfo`] with article count and range.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`HarvestError::UnexpectedStatus`] - The server did not answer `211`
    /// - [`HarvestError::Format`] - Could not parse the server response
    pub async fn select_group(&mut self, newsgroup: &str) -> Result<GroupInfo> {
        debug!("Selecting newsgroup: {}", newsgroup);

        let cmd = commands::group(newsgroup);
        self.send_command(&cmd).await?;
        let response = self.receive().await?;

        if response.status != Status::GroupOk {
            if response.code == codes::NO_SUCH_GROUP {
                warn!("No such newsgroup: {}", newsgroup);
            }
            return Err(HarvestError::UnexpectedStatus {
                code: response.code,
                message: response.message,
            });
        }

        let info = commands::parse_group_line(&response.message)?;
        self.current_group = Some(newsgroup.to_string());

        debug!(
            "Group {} selected: {} articles ({}-{})",
            info.name, info.count, info.low, info.high
        );
        Ok(info)
    }
}
