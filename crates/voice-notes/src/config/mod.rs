#[allow(clippy::module_inception)]
mod config;
mod logging_config;
mod recording_config;
mod storage_config;

pub(crate) use {
    config::Config, logging_config::LoggingConfig, recording_config::RecordingConfig,
    storage_config::StorageConfig,
};

use voice_notes_core::AudioFormat;

pub(crate) const DEFAULT_SWEEP_ORPHANS: bool = true;
pub(crate) const DEFAULT_MAXIMUM_DURATION_SECS: u64 = 300;
pub(crate) const DEFAULT_FORMAT: AudioFormat = AudioFormat::Lossless;
pub(crate) const DEFAULT_LOG_FILTER: &str = "voice_notes=info,voice_notes_core=info";

pub(crate) fn default_sweep_orphans() -> bool {
    DEFAULT_SWEEP_ORPHANS
}

pub(crate) fn default_maximum_duration_secs() -> u64 {
    DEFAULT_MAXIMUM_DURATION_SECS
}

pub(crate) fn default_format() -> AudioFormat {
    DEFAULT_FORMAT
}

pub(crate) fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
