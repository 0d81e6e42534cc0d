use crate::{
    CoreError, CoreResult,
    audio::{DeviceEvent, DeviceEvents, PlaybackDevice},
};

use std::{
    fs::File,
    io::BufReader,
    panic::Location,
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    thread::JoinHandle,
    time::Duration,
};

use error_location::ErrorLocation;
use rodio::{Decoder, OutputStream, Sink};
use tracing::{debug, error, info, instrument, warn};

/// How often the player thread checks whether the sink ran dry.
const END_POLL_INTERVAL: Duration = Duration::from_millis(50);

enum PlayerCommand {
    Play,
    Pause,
    Stop,
}

/// Default-output playback device.
///
/// The rodio output stream cannot leave the thread that opened it, so each
/// device owns a player thread and talks to it over a command channel.
pub struct RodioPlayback {
    commands: mpsc::Sender<PlayerCommand>,
    thread: Option<JoinHandle<()>>,
}

impl RodioPlayback {
    /// Open `source` on the default output device, paused.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeviceUnavailable`] if the file cannot be read or
    /// decoded, or there is no output device.
    #[track_caller]
    #[instrument(skip(events))]
    pub fn open(source: &Path, events: DeviceEvents) -> CoreResult<Self> {
        let file = File::open(source).map_err(|e| CoreError::DeviceUnavailable {
            reason: format!("Failed to open {:?}: {}", source, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path = source.to_path_buf();

        let thread = std::thread::Builder::new()
            .name("voice-notes-player".to_string())
            .spawn(move || run_player(file, path, command_rx, ready_tx, events))
            .map_err(|e| CoreError::DeviceUnavailable {
                reason: format!("Failed to spawn player thread: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands: command_tx,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CoreError::DeviceUnavailable {
                    reason: "Player thread exited during setup".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
        }
    }
}

impl PlaybackDevice for RodioPlayback {
    #[track_caller]
    fn play(&mut self) -> CoreResult<()> {
        self.commands
            .send(PlayerCommand::Play)
            .map_err(|_| CoreError::DeviceUnavailable {
                reason: "Player thread is gone".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn pause(&mut self) {
        if self.commands.send(PlayerCommand::Pause).is_err() {
            debug!("Pause ignored, player thread is gone");
        }
    }

    fn stop(&mut self) {
        let _ = self.commands.send(PlayerCommand::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Player thread panicked");
            }
        }
    }
}

impl Drop for RodioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

#[track_caller]
fn unavailable(reason: String) -> CoreError {
    CoreError::DeviceUnavailable {
        reason,
        location: ErrorLocation::from(Location::caller()),
    }
}

fn run_player(
    file: File,
    path: PathBuf,
    commands: mpsc::Receiver<PlayerCommand>,
    ready: mpsc::Sender<CoreResult<()>>,
    events: DeviceEvents,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(output) => output,
        Err(e) => {
            let _ = ready.send(Err(unavailable(format!("No output device: {}", e))));
            return;
        }
    };

    let sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            let _ = ready.send(Err(unavailable(format!("Failed to create sink: {}", e))));
            return;
        }
    };

    let decoder = match Decoder::new(BufReader::new(file)) {
        Ok(decoder) => decoder,
        Err(e) => {
            let _ = ready.send(Err(unavailable(format!(
                "Failed to decode {:?}: {}",
                path, e
            ))));
            return;
        }
    };

    sink.pause();
    sink.append(decoder);
    let _ = ready.send(Ok(()));
    debug!(path = ?path, "Player ready");

    loop {
        match commands.recv_timeout(END_POLL_INTERVAL) {
            Ok(PlayerCommand::Play) => sink.play(),
            Ok(PlayerCommand::Pause) => sink.pause(),
            Ok(PlayerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => {
                sink.stop();
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !sink.is_paused() && sink.empty() {
                    info!(path = ?path, "Playback reached end of file");
                    events.send(DeviceEvent::PlaybackFinished { success: true });
                    break;
                }
            }
        }
    }

    if !sink.empty() {
        warn!(path = ?path, "Player stopped before end of file");
    }
}
