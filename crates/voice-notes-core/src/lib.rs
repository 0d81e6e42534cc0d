//! Voice Notes Core Library
//!
//! Local audio-notes engine: a durable [`RecordStore`] of named recordings,
//! an [`AudioController`] that serializes recording and playback on the
//! audio hardware, and an [`EventBus`] that reports lifecycle changes.
//!
//! # Example
//!
//! ```no_run
//! use voice_notes_core::{
//!     AudioController, AudioEvent, AudioFormat, ControllerConfig, CoreResult, DesktopBackend,
//!     DesktopSession, EventBus, RecordStore, StoreLayout,
//! };
//!
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> CoreResult<()> {
//!     let store = RecordStore::open(StoreLayout::new("voice-notes-data"));
//!     let (controller, _worker) = AudioController::spawn(
//!         Box::new(DesktopBackend::new()),
//!         Box::new(DesktopSession::new()),
//!         ControllerConfig::default(),
//!         EventBus::new(),
//!     );
//!     let mut events = controller.subscribe();
//!
//!     let scratch = store.temporary_record_path(AudioFormat::Lossless.file_extension())?;
//!     controller.start_recording(&scratch, AudioFormat::Lossless).await?;
//!     tokio::time::sleep(Duration::from_secs(3)).await;
//!     controller.stop_recording().await?;
//!
//!     if let Some(AudioEvent::DidFinishRecording) = events.recv().await {
//!         let record = store.create_record(&scratch, "First note", "wav")?;
//!         println!("Saved {}", record.name);
//!     }
//!     Ok(())
//! }
//! ```

mod audio;
mod error;
mod events;
mod store;

pub use {
    audio::{
        AudioBackend, AudioController, AudioFormat, AudioSession, AudioState, CaptureDevice,
        CaptureSettings, ControllerConfig, ControllerSnapshot, CpalCapture, DesktopBackend,
        DesktopSession, DeviceEvent, DeviceEvents, INTERRUPTION_GRACE_DELAY,
        MINIMUM_RECORD_DURATION, OutputPort, OutputRoute, PermissionCallback, PermissionState,
        PlaybackDevice, RECORDING_CHANNELS, RECORDING_SAMPLE_RATE, RecordingOutcome, Resampler,
        RodioPlayback, SessionEvent, classify_recording, probe_duration,
    },
    error::CoreError,
    error::Result as CoreResult,
    events::{AudioEvent, EventBus, RecordingFailure, Subscription},
    store::{Record, RecordStore, StoreLayout},
};
