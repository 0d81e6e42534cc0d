use crate::events::RecordingFailure;

use std::time::Duration;

/// Recordings shorter than this are reported as failures.
pub const MINIMUM_RECORD_DURATION: Duration = Duration::from_secs(1);

/// Result of a finished recording.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingOutcome {
    /// The file is usable.
    Finished,
    /// The file is not usable.
    Failed(RecordingFailure),
}

/// Classify a stopped recording from the duration read back from its file.
///
/// Too-short recordings fail even when the device reported success; only
/// then do the encoder error and the device's success flag matter.
pub fn classify_recording(
    duration: Duration,
    device_success: bool,
    encode_error: Option<String>,
) -> RecordingOutcome {
    if duration < MINIMUM_RECORD_DURATION {
        RecordingOutcome::Failed(RecordingFailure::TooShort { duration })
    } else if let Some(reason) = encode_error {
        RecordingOutcome::Failed(RecordingFailure::EncodeFailed { reason })
    } else if device_success {
        RecordingOutcome::Finished
    } else {
        RecordingOutcome::Failed(RecordingFailure::Unknown)
    }
}
