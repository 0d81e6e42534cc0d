//! Seams between the controller and the audio hardware.
//!
//! Devices run their own threads and report back through [`DeviceEvents`];
//! they never touch controller state directly. Every event is tagged with the
//! device session it came from, so a callback from an already released device
//! is recognized and dropped by the controller.

use crate::{
    CoreResult,
    audio::{AudioFormat, CaptureSettings, controller::ControllerMessage},
};

use std::{path::Path, time::Duration};

use tokio::sync::mpsc;
use tracing::debug;

/// Asynchronous device notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Capture ended on its own (duration limit reached).
    RecordingFinished {
        /// Whether the device considers the capture successful.
        success: bool,
    },
    /// Capture failed mid-recording.
    EncodeError {
        /// Device error description.
        reason: String,
    },
    /// Playback reached the end of the file.
    PlaybackFinished {
        /// Whether the whole file was played.
        success: bool,
    },
    /// Playback failed mid-file.
    DecodeError {
        /// Device error description.
        reason: String,
    },
}

/// Sink handed to a device when it is opened.
#[derive(Debug, Clone)]
pub struct DeviceEvents {
    session: u64,
    tx: mpsc::UnboundedSender<ControllerMessage>,
}

impl DeviceEvents {
    pub(crate) fn new(session: u64, tx: mpsc::UnboundedSender<ControllerMessage>) -> Self {
        Self { session, tx }
    }

    /// Queue `event` for the controller. Safe to call from any thread.
    pub fn send(&self, event: DeviceEvent) {
        let message = ControllerMessage::Device {
            session: self.session,
            event,
        };
        if self.tx.send(message).is_err() {
            debug!(session = self.session, "Device event dropped, controller gone");
        }
    }

    /// Device session these events belong to.
    pub fn session(&self) -> u64 {
        self.session
    }
}

/// A microphone pipeline bound to one output file.
pub trait CaptureDevice: Send {
    /// Start capturing. A device honoring a duration limit reports
    /// [`DeviceEvent::RecordingFinished`] when it reaches it.
    fn record(&mut self) -> CoreResult<()>;

    /// Suspend capture without finalizing the file.
    fn pause(&mut self);

    /// Stop capturing, finalize the file, and release the hardware.
    ///
    /// Returns whether the file was written successfully. Calling it again
    /// after the first call returns `false` and does nothing.
    fn stop(&mut self) -> bool;

    /// Audio captured so far.
    fn current_time(&self) -> Duration;
}

/// A speaker pipeline bound to one input file.
pub trait PlaybackDevice: Send {
    /// Start or resume playback.
    fn play(&mut self) -> CoreResult<()>;

    /// Suspend playback.
    fn pause(&mut self);

    /// Stop playback and release the hardware. Returns once released.
    fn stop(&mut self);
}

/// Factory for devices plus the duration probe used to classify recordings.
pub trait AudioBackend: Send {
    /// Whether `open_capture` can encode `format` on this host.
    fn supports_format(&self, format: AudioFormat) -> bool {
        let _ = format;
        true
    }

    /// Prepare a capture device writing to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeviceUnavailable`](crate::CoreError) if the
    /// device or encoding is not available.
    fn open_capture(
        &mut self,
        target: &Path,
        settings: &CaptureSettings,
        events: DeviceEvents,
    ) -> CoreResult<Box<dyn CaptureDevice>>;

    /// Prepare a playback device reading `source`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeviceUnavailable`](crate::CoreError) if the file
    /// cannot be decoded or no output device is available.
    fn open_playback(
        &mut self,
        source: &Path,
        events: DeviceEvents,
    ) -> CoreResult<Box<dyn PlaybackDevice>>;

    /// Duration of the audio file at `path`, read by opening it as a playable
    /// asset. `None` if the file cannot be opened.
    fn probe_duration(&self, path: &Path) -> Option<Duration>;
}
