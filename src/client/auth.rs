//! NNTP authentication (AUTHINFO USER/PASS) and session shutdown

use super::state::ConnectionState;
use super::{NntpClient, NntpIo};
use crate::commands;
use crate::error::{HarvestError, Result};
use crate::response::{Status, codes};
use tracing::{debug, warn};

impl<S: NntpIo> NntpClient<S> {
    /// Authenticate with username and password (AUTHINFO USER/PASS)
    ///
    /// Sends AUTHINFO USER; a `281` finishes the exchange, a `381` is
    /// followed by AUTHINFO PASS, which must be answered with `281`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`HarvestError::Protocol`] - Already authenticated
    /// - [`HarvestError::AuthFailed`] - Credentials rejected or unexpected status
    /// - [`HarvestError::Timeout`] - Server did not respond in time
    pub async fn authenticate(&mut self) -> Result<()> {
        debug!("Authenticating as {}", self.config.username);

        if matches!(self.state, ConnectionState::Authenticated) {
            return Err(HarvestError::Protocol("Already authenticated".to_string()));
        }

        let cmd = commands::authinfo_user(&self.config.username);
        self.send_command(&cmd).await?;
        self.state = ConnectionState::InProgress;

        let response = self.receive().await?;

        match response.status {
            Status::AuthOk => {}
            Status::PasswordRequired => {
                let cmd = commands::authinfo_pass(&self.config.password);
                self.send_command(&cmd).await?;
                let response = self.receive().await?;

                if response.status != Status::AuthOk {
                    self.state = ConnectionState::Ready;
                    return Err(HarvestError::AuthFailed(format!(
                        "{} {}",
                        response.code, response.message
                    )));
                }
            }
            _ => {
                self.state = ConnectionState::Ready;
                return Err(HarvestError::AuthFailed(format!(
                    "{} {}",
                    response.code, response.message
                )));
            }
        }

        self.state = ConnectionState::Authenticated;
        debug!("Authentication successful");
        Ok(())
    }

    /// Close the session with QUIT
    ///
    /// Any reply ends the session; one other than `205` is only logged.
    /// Calling this twice is a no-op.
    pub async fn quit(&mut self) -> Result<()> {
        if matches!(self.state, ConnectionState::Closed) {
            return Ok(());
        }
        self.state = ConnectionState::Closed;

        self.send_command(commands::quit()).await?;
        let response = self.receive().await?;
        if response.code == codes::CLOSING_CONNECTION {
            debug!("QUIT: {} {}", response.code, response.message);
        } else {
            warn!("Unexpected QUIT reply: {} {}", response.code, response.message);
        }
        Ok(())
    }
}
