use crate::{
    CoreResult,
    audio::{
        AudioBackend, AudioFormat, CaptureDevice, CaptureSettings, CpalCapture, DeviceEvents,
        PlaybackDevice, RodioPlayback, probe_duration,
    },
};

use std::{path::Path, time::Duration};

/// Devices for desktop hosts: cpal capture, rodio playback and a symphonia
/// duration probe.
#[derive(Debug, Default)]
pub struct DesktopBackend;

impl DesktopBackend {
    /// Create the backend. Devices are opened per recording or playback.
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for DesktopBackend {
    /// Only the WAV encoder is available.
    fn supports_format(&self, format: AudioFormat) -> bool {
        format == AudioFormat::Lossless
    }

    fn open_capture(
        &mut self,
        target: &Path,
        settings: &CaptureSettings,
        events: DeviceEvents,
    ) -> CoreResult<Box<dyn CaptureDevice>> {
        Ok(Box::new(CpalCapture::open(target, settings, events)?))
    }

    fn open_playback(
        &mut self,
        source: &Path,
        events: DeviceEvents,
    ) -> CoreResult<Box<dyn PlaybackDevice>> {
        Ok(Box::new(RodioPlayback::open(source, events)?))
    }

    fn probe_duration(&self, path: &Path) -> Option<Duration> {
        probe_duration(path)
    }
}
