use std::fmt;

/// What the audio hardware is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioState {
    /// No device is active.
    #[default]
    Idle,
    /// The capture device owns the hardware.
    Recording,
    /// The playback device owns the hardware.
    Playing,
}

impl fmt::Display for AudioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioState::Idle => "idle",
            AudioState::Recording => "recording",
            AudioState::Playing => "playing",
        };
        f.write_str(name)
    }
}
