use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Sample rate every recording is stored at.
pub const RECORDING_SAMPLE_RATE: u32 = 16_000;

/// Channel count every recording is stored with.
pub const RECORDING_CHANNELS: u16 = 1;

/// The three supported recording encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Uncompressed linear PCM.
    Lossless,
    /// MPEG-4 AAC.
    Aac,
    /// MPEG Layer III.
    Mp3,
}

impl AudioFormat {
    /// Every supported encoding.
    pub const ALL: [AudioFormat; 3] = [AudioFormat::Lossless, AudioFormat::Aac, AudioFormat::Mp3];

    /// Extension used for files of this encoding.
    pub fn file_extension(self) -> &'static str {
        match self {
            AudioFormat::Lossless => "wav",
            AudioFormat::Aac => "m4a",
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// Four-character codec identifier handed to capture backends.
    pub fn codec_id(self) -> &'static str {
        match self {
            AudioFormat::Lossless => "lpcm",
            AudioFormat::Aac => "aac ",
            AudioFormat::Mp3 => ".mp3",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioFormat::Lossless => "lossless",
            AudioFormat::Aac => "aac",
            AudioFormat::Mp3 => "mp3",
        };
        f.write_str(name)
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lossless" | "wav" => Ok(AudioFormat::Lossless),
            "aac" | "m4a" => Ok(AudioFormat::Aac),
            "mp3" => Ok(AudioFormat::Mp3),
            other => Err(format!("unknown audio format '{}'", other)),
        }
    }
}

/// Parameters a capture device is opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Output encoding.
    pub format: AudioFormat,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// Hard cutoff; `None` records until stopped.
    pub max_duration: Option<Duration>,
}

impl CaptureSettings {
    /// Mono, [`RECORDING_SAMPLE_RATE`] settings for `format`.
    ///
    /// A zero `max_duration` means unbounded.
    pub fn new(format: AudioFormat, max_duration: Duration) -> Self {
        Self {
            format,
            sample_rate: RECORDING_SAMPLE_RATE,
            channels: RECORDING_CHANNELS,
            max_duration: (!max_duration.is_zero()).then_some(max_duration),
        }
    }
}
