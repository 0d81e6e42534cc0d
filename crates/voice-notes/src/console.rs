//! Line-oriented console input.
//!
//! Reads stdin, parses each line into an [`AppCommand`] and forwards it to
//! the main application. Parse errors are reported on the spot and never
//! reach the app.

use crate::{AppCommand, AppError, AppResult};

use std::panic::Location;

use error_location::ErrorLocation;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{mpsc, watch},
};
use tracing::{debug, info, instrument};

/// Console reader feeding the command channel.
pub struct Console {
    command_tx: mpsc::Sender<AppCommand>,
}

impl Console {
    /// Create a console that sends parsed commands on `command_tx`.
    pub fn new(command_tx: mpsc::Sender<AppCommand>) -> Self {
        Self { command_tx }
    }

    /// Read commands until `quit`, end of input, or shutdown.
    ///
    /// End of input is treated as `quit`.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> AppResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("Console input closed");
                        self.send(AppCommand::Quit).await?;
                        break;
                    };

                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    match line.parse::<AppCommand>() {
                        Ok(command) => {
                            debug!(command = ?command, "Console command");
                            let quit = command == AppCommand::Quit;
                            self.send(command).await?;
                            if quit {
                                break;
                            }
                        }
                        Err(AppError::InvalidCommand { reason, .. }) => println!("{}", reason),
                        Err(e) => return Err(e),
                    }
                }

                _ = shutdown_rx.changed() => {
                    debug!("Console shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn send(&self, command: AppCommand) -> AppResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|e| AppError::ChannelSendFailed {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}
