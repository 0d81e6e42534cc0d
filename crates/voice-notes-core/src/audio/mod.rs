mod backend;
mod capture;
mod classify;
pub(crate) mod controller;
mod device;
mod format;
mod playback;
mod probe;
mod resampler;
mod session;
mod state;

pub use {
    backend::DesktopBackend,
    capture::CpalCapture,
    classify::{MINIMUM_RECORD_DURATION, RecordingOutcome, classify_recording},
    controller::{AudioController, ControllerConfig, ControllerSnapshot, INTERRUPTION_GRACE_DELAY},
    device::{AudioBackend, CaptureDevice, DeviceEvent, DeviceEvents, PlaybackDevice},
    format::{AudioFormat, CaptureSettings, RECORDING_CHANNELS, RECORDING_SAMPLE_RATE},
    playback::RodioPlayback,
    probe::probe_duration,
    resampler::Resampler,
    session::{
        AudioSession, DesktopSession, OutputPort, OutputRoute, PermissionCallback,
        PermissionState, SessionEvent,
    },
    state::AudioState,
};

#[cfg(test)]
pub(crate) use capture::{CaptureBuffer, mix_to_mono, write_wav};
