use crate::{
    AppCommand, AppError, AppResult, RecordingState, app_command::HELP, config::Config,
    time_format::format_elapsed,
};

use std::{io, panic::Location, sync::Arc, time::Duration, time::Instant};

use error_location::ErrorLocation;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use voice_notes_core::{
    AudioController, AudioEvent, AudioState, PermissionState, Record, RecordStore, Subscription,
};

/// How long shutdown waits for a stopped recording to be classified.
const SHUTDOWN_SAVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Main application state.
///
/// Owns the console's view of the current recording and turns controller
/// events into store updates: a finished recording becomes a record, a
/// failed or discarded one has its scratch file removed.
pub struct App {
    pub(crate) store: Arc<RecordStore>,
    pub(crate) controller: AudioController,
    pub(crate) config: Config,
    pub(crate) command_rx: mpsc::Receiver<AppCommand>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) recording: RecordingState,
    pub(crate) listing: Vec<Record>,
}

impl App {
    /// Run the main application event loop.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!("Voice-Notes starting");
        println!("{}", HELP);

        let mut events = self.controller.subscribe();

        loop {
            tokio::select! {
                Some(command) = self.command_rx.recv() => {
                    if command == AppCommand::Quit {
                        info!("Shutdown requested");
                        break;
                    }
                    if let Err(e) = self.handle_command(command).await {
                        error!(error = ?e, "Command failed");
                        println!("Error: {}", e);
                    }
                }

                Some(event) = events.recv() => {
                    self.handle_event(event).await;
                }

                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => info!("Interrupted, shutting down"),
                        Err(e) => error!(error = %e, "Failed to listen for ctrl-c"),
                    }
                    break;
                }

                else => {
                    info!("All channels closed, shutting down");
                    break;
                }
            }
        }

        self.finish_pending_recording(&mut events).await;

        if let Err(e) = self.controller.shutdown().await {
            warn!(error = %e, "Audio controller already stopped");
        }
        let _ = self.shutdown_tx.send(true);
        info!("Voice-Notes shut down successfully");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn handle_command(&mut self, command: AppCommand) -> AppResult<()> {
        match command {
            AppCommand::Record { name, format } => self.start_recording(name, format).await?,
            AppCommand::Stop => self.stop().await?,
            AppCommand::Discard => {
                if self.recording.mark_discarded() {
                    self.controller.stop_recording().await?;
                } else {
                    println!("Not recording");
                }
            }
            AppCommand::List => self.list(),
            AppCommand::Play { index } => {
                let record = self.record_at(index)?;
                self.controller.play_record(&self.store, &record).await?;
            }
            AppCommand::Delete { index } => self.delete(index).await?,
            AppCommand::Elapsed => self.print_elapsed().await?,
            AppCommand::Permission => self.check_permission().await?,
            AppCommand::Session(event) => {
                info!(event = ?event, "Forwarding session event");
                self.controller.notify(event);
            }
            AppCommand::Help => println!("{}", HELP),
            AppCommand::Quit => {}
        }

        Ok(())
    }

    async fn start_recording(
        &mut self,
        name: String,
        format: Option<voice_notes_core::AudioFormat>,
    ) -> AppResult<()> {
        if self.recording.is_recording() {
            println!("Already recording; 'stop' or 'discard' first");
            return Ok(());
        }

        let format = format.unwrap_or(self.config.recording.format);
        if !self.controller.supports_format(format) {
            let available: Vec<String> = self
                .controller
                .supported_formats()
                .iter()
                .map(|f| f.to_string())
                .collect();
            println!(
                "{} recording is not available here; use --format {}",
                format,
                available.join(" or ")
            );
            return Ok(());
        }

        let temp_path = self.store.temporary_record_path(format.file_extension())?;

        if let Err(e) = self.controller.start_recording(&temp_path, format).await {
            self.store.remove_temporary_file(&temp_path);
            return Err(e.into());
        }

        let session_id = Uuid::new_v4();
        info!(session_id = %session_id, name = %name, format = %format, "Recording started");
        println!("Recording '{}' ({})", name, format);

        self.recording = RecordingState::Recording {
            session_id,
            started_at: Instant::now(),
            name,
            temp_path,
            format,
            discard: false,
        };

        Ok(())
    }

    async fn stop(&mut self) -> AppResult<()> {
        if self.recording.is_recording() {
            self.controller.stop_recording().await?;
        } else if self.controller.state() == AudioState::Playing {
            self.controller.stop_playing().await?;
        } else {
            println!("Nothing to stop");
        }
        Ok(())
    }

    fn list(&mut self) {
        self.listing = self.store.list();

        if self.listing.is_empty() {
            println!("No notes yet");
            return;
        }

        for (position, record) in self.listing.iter().enumerate() {
            let marker = if self.controller.is_playing_record(&self.store, record) {
                ">"
            } else {
                " "
            };
            println!(
                "{} {:>3}. {}  ({})",
                marker,
                position + 1,
                record.name,
                record.create_time.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    async fn delete(&mut self, index: usize) -> AppResult<()> {
        let record = self.record_at(index)?;

        if self.controller.is_playing_record(&self.store, &record) {
            self.controller.stop_playing().await?;
        }

        let store = Arc::clone(&self.store);
        let target = record.clone();
        tokio::task::spawn_blocking(move || store.remove_record(&target))
            .await
            .map_err(join_error)??;

        println!("Deleted '{}'", record.name);
        self.listing = self.store.list();

        Ok(())
    }

    async fn print_elapsed(&self) -> AppResult<()> {
        if !self.recording.is_recording() {
            println!("Not recording");
            return Ok(());
        }

        let elapsed = self.controller.current_recording_elapsed().await?;
        let limit = self.config.recording.maximum_duration();

        if limit.is_zero() {
            println!("{}", format_elapsed(elapsed));
        } else {
            println!(
                "{} ({} left)",
                format_elapsed(elapsed),
                format_elapsed(limit.saturating_sub(elapsed))
            );
        }

        Ok(())
    }

    async fn check_permission(&self) -> AppResult<()> {
        let state = self.controller.microphone_permission_state().await?;

        let granted = match state {
            PermissionState::Granted => true,
            PermissionState::Denied => false,
            PermissionState::Undetermined => self.controller.request_microphone_permission().await?,
        };

        println!(
            "Microphone access {}",
            if granted { "granted" } else { "denied" }
        );

        Ok(())
    }

    #[track_caller]
    fn record_at(&mut self, index: usize) -> AppResult<Record> {
        if self.listing.is_empty() {
            self.listing = self.store.list();
        }

        self.listing
            .get(index.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| AppError::InvalidCommand {
                reason: format!("No note #{}; run 'list'", index),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    async fn handle_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::DidStartPlaying => println!("Playing"),
            AudioEvent::DidEndPlaying => println!("Playback ended"),
            AudioEvent::DidFinishRecording => self.save_recording().await,
            AudioEvent::RecordingFailed(failure) => {
                if let RecordingState::Recording {
                    session_id,
                    temp_path,
                    ..
                } = self.recording.take()
                {
                    warn!(session_id = %session_id, error = %failure, "Recording not saved");
                    self.store.remove_temporary_file(&temp_path);
                }
                println!("{}", failure);
            }
        }
    }

    async fn save_recording(&mut self) {
        let RecordingState::Recording {
            session_id,
            started_at,
            name,
            temp_path,
            format,
            discard,
        } = self.recording.take()
        else {
            warn!("Recording finished with no recording in progress");
            return;
        };

        if discard {
            info!(session_id = %session_id, "Recording discarded");
            self.store.remove_temporary_file(&temp_path);
            println!("Discarded '{}'", name);
            return;
        }

        let store = Arc::clone(&self.store);
        let source = temp_path.clone();
        let record_name = name.clone();
        let result = tokio::task::spawn_blocking(move || {
            store.create_record(&source, &record_name, format.file_extension())
        })
        .await;

        match result {
            Ok(Ok(record)) => {
                info!(
                    session_id = %session_id,
                    file_name = %record.file_name,
                    wall_ms = started_at.elapsed().as_millis(),
                    "Recording saved"
                );
                println!("Saved '{}'", record.name);
                self.listing = self.store.list();
            }
            Ok(Err(e)) => {
                error!(session_id = %session_id, error = %e, "Failed to save recording");
                self.store.remove_temporary_file(&temp_path);
                println!("Could not save '{}': {}", name, e);
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Save task failed");
                self.store.remove_temporary_file(&temp_path);
            }
        }
    }

    /// Stop a recording still running at shutdown and save or drop it.
    async fn finish_pending_recording(&mut self, events: &mut Subscription) {
        if !self.recording.is_recording() {
            return;
        }

        if let Err(e) = self.controller.stop_recording().await {
            warn!(error = %e, "Could not stop recording at shutdown");
            return;
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_SAVE_TIMEOUT;
        while self.recording.is_recording() {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Some(event)) => self.handle_event(event).await,
                Ok(None) | Err(_) => {
                    warn!("Recording outcome not received before shutdown");
                    break;
                }
            }
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError::from(io::Error::other(e))
}
