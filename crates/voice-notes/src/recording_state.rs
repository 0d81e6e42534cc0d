use std::{path::PathBuf, time::Instant};

use uuid::Uuid;
use voice_notes_core::AudioFormat;

/// What the console believes about the current recording.
///
/// The controller decides whether a recording succeeded; this only carries
/// what is needed to turn the scratch file into a record afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingState {
    /// Not currently recording.
    Idle,
    /// Currently recording audio.
    Recording {
        /// Unique session ID for log correlation.
        session_id: Uuid,
        /// When recording started.
        started_at: Instant,
        /// Name the record will get.
        name: String,
        /// Scratch file the controller records into.
        temp_path: PathBuf,
        /// Encoding of the scratch file.
        format: AudioFormat,
        /// Drop the file instead of saving it once the recording ends.
        discard: bool,
    },
}

impl RecordingState {
    /// Whether a recording is in progress.
    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording { .. })
    }

    /// Mark the current recording to be thrown away. Returns `false` when
    /// there is nothing to discard.
    pub fn mark_discarded(&mut self) -> bool {
        match self {
            RecordingState::Recording { discard, .. } => {
                *discard = true;
                true
            }
            RecordingState::Idle => false,
        }
    }

    /// Take the state, leaving `Idle` behind.
    pub fn take(&mut self) -> RecordingState {
        std::mem::replace(self, RecordingState::Idle)
    }
}
