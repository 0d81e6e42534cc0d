use crate::config::{default_format, default_maximum_duration_secs};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use voice_notes_core::AudioFormat;

/// Recording defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Recording cutoff in seconds; 0 records until stopped.
    #[serde(default = "default_maximum_duration_secs")]
    pub maximum_duration_secs: u64,
    /// Encoding used when `record` is given no format.
    #[serde(default = "default_format")]
    pub format: AudioFormat,
}

impl RecordingConfig {
    /// Cutoff as a duration; zero means unbounded.
    pub fn maximum_duration(&self) -> Duration {
        Duration::from_secs(self.maximum_duration_secs)
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            maximum_duration_secs: default_maximum_duration_secs(),
            format: default_format(),
        }
    }
}
