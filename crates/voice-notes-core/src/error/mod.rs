use std::{panic::Location, path::PathBuf};

use error_location::ErrorLocation;
use thiserror::Error;

/// Record store and audio controller errors with source location tracking.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Record name was empty.
    #[error("Record name must not be empty {location}")]
    InvalidName {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Playback or recording target path was empty.
    #[error("Audio target path is empty {location}")]
    EmptyTarget {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Source file handed to the store does not exist.
    #[error("Record source file not found: {path:?} {location}")]
    SourceMissing {
        /// Path to the missing source file.
        path: PathBuf,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Record folder cannot be used.
    #[error("Record store unavailable: {reason} {location}")]
    StoreUnavailable {
        /// Description of why the folder is unusable.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// New record could not be saved.
    #[error("Saving record failed: {reason} {location}")]
    SaveFailed {
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Record removal could not be persisted.
    #[error("Removing record failed: {reason} {location}")]
    RemoveFailed {
        /// Description of the failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Capture or playback device could not be prepared or started.
    #[error("Audio device unavailable: {reason} {location}")]
    DeviceUnavailable {
        /// Description of the device error.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Request conflicts with the controller's current activity.
    #[error("Audio controller busy: {reason} {location}")]
    Busy {
        /// Description of the conflicting activity.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Captured audio could not be resampled or encoded.
    #[error("Encoding failed: {reason} {location}")]
    EncodeFailed {
        /// Description of the encoder error.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Controller worker is no longer running.
    #[error("Audio controller closed {location}")]
    ControllerClosed {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// IO error from filesystem operations.
    #[error("IO error: {source} {location}")]
    Io {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl From<std::io::Error> for CoreError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        CoreError::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
