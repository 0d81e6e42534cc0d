use crate::{
    CoreError, CoreResult,
    audio::{
        AudioFormat, CaptureDevice, CaptureSettings, DeviceEvent, DeviceEvents, Resampler,
    },
};

use std::{
    panic::Location,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use cpal::{
    Device, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use error_location::ErrorLocation;
use tracing::{debug, error, info, instrument, warn};

/// State shared between the device and the cpal callback thread.
pub(crate) struct CaptureBuffer {
    samples: Mutex<Vec<f32>>,
    /// Interleaved sample count at which capture ends on its own.
    limit: Option<usize>,
    paused: AtomicBool,
    /// Set before the stream is dropped so no in-flight callback writes
    /// after `stop()` takes the samples.
    shutdown: AtomicBool,
    /// Set once the device has reported its end to the controller.
    reported: AtomicBool,
}

impl CaptureBuffer {
    /// Empty buffer that stops accepting samples at `limit`.
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            limit,
            paused: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            reported: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<f32>> {
        self.samples.lock().unwrap_or_else(|e| {
            error!("Sample buffer lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }

    /// Append a callback's samples, trimmed to the limit. Reports
    /// `RecordingFinished` the first time the limit is hit.
    pub(crate) fn push(&self, data: &[f32], events: &DeviceEvents) {
        if self.shutdown.load(Ordering::Acquire) || self.paused.load(Ordering::Acquire) {
            return;
        }

        let mut buf = self.lock();
        let room = self.limit.map_or(data.len(), |limit| {
            limit.saturating_sub(buf.len()).min(data.len())
        });
        buf.extend_from_slice(&data[..room]);

        let full = self.limit.is_some_and(|limit| buf.len() >= limit);
        drop(buf);

        if full && !self.reported.swap(true, Ordering::AcqRel) {
            debug!("Recording duration limit reached");
            events.send(DeviceEvent::RecordingFinished { success: true });
        }
    }

    /// Report a stream error unless the end was already reported.
    pub(crate) fn fail(&self, reason: String, events: &DeviceEvents) {
        if !self.reported.swap(true, Ordering::AcqRel) {
            events.send(DeviceEvent::EncodeError { reason });
        }
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub(crate) fn shut_down(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Interleaved samples held so far.
    pub(crate) fn sample_count(&self) -> usize {
        self.lock().len()
    }

    /// Take every sample, leaving the buffer empty.
    pub(crate) fn take(&self) -> Vec<f32> {
        std::mem::take(&mut *self.lock())
    }
}

/// Default-microphone capture device writing a mono 16-bit WAV file.
///
/// Audio is buffered at the device rate while recording and converted to
/// the stored format when the device is stopped.
pub struct CpalCapture {
    device: Device,
    config: StreamConfig,
    target: PathBuf,
    output_rate: u32,
    stream: Option<Stream>,
    buffer: Arc<CaptureBuffer>,
    events: DeviceEvents,
    stopped: bool,
}

impl CpalCapture {
    /// Prepare the default input device to record into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeviceUnavailable`] if there is no microphone or
    /// the requested format has no encoder on this host.
    #[track_caller]
    #[instrument(skip(events))]
    pub fn open(target: &Path, settings: &CaptureSettings, events: DeviceEvents) -> CoreResult<Self> {
        if settings.format != AudioFormat::Lossless {
            return Err(CoreError::DeviceUnavailable {
                reason: format!("No encoder for {} on this host", settings.format),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CoreError::DeviceUnavailable {
                reason: "No microphone found".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let supported = device
            .default_input_config()
            .map_err(|e| CoreError::DeviceUnavailable {
                reason: format!("Failed to get config: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let config: StreamConfig = supported.into();

        let limit = settings.max_duration.map(|max| {
            (max.as_secs_f64() * config.sample_rate as f64) as usize * config.channels as usize
        });

        info!(
            device_id = ?device.id(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            target = ?target,
            "Capture device opened"
        );

        Ok(Self {
            device,
            config,
            target: target.to_path_buf(),
            output_rate: settings.sample_rate,
            stream: None,
            buffer: Arc::new(CaptureBuffer::new(limit)),
            events,
            stopped: false,
        })
    }

    #[track_caller]
    fn build_stream(&self) -> CoreResult<Stream> {
        let buffer = Arc::clone(&self.buffer);
        let events = self.events.clone();
        let error_buffer = Arc::clone(&self.buffer);
        let error_events = self.events.clone();

        self.device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| buffer.push(data, &events),
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_buffer.fail(err.to_string(), &error_events);
                },
                None,
            )
            .map_err(|e| CoreError::DeviceUnavailable {
                reason: format!("Failed to build stream: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn encode(&self, samples: &[f32]) -> CoreResult<()> {
        let mono = mix_to_mono(samples, self.config.channels);
        let resampled = if self.config.sample_rate == self.output_rate {
            mono
        } else {
            Resampler::new(self.config.sample_rate, self.output_rate)?.resample(&mono)?
        };
        write_wav(&self.target, &resampled, self.output_rate)
    }
}

impl CaptureDevice for CpalCapture {
    #[track_caller]
    fn record(&mut self) -> CoreResult<()> {
        if self.stream.is_none() {
            self.stream = Some(self.build_stream()?);
        }
        self.buffer.set_paused(false);

        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| CoreError::DeviceUnavailable {
                reason: format!("Failed to start stream: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;
        }

        info!("Audio capture started");
        Ok(())
    }

    fn pause(&mut self) {
        self.buffer.set_paused(true);
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                warn!(error = %e, "Pausing input stream failed");
            }
        }
    }

    #[instrument(skip(self))]
    fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;

        self.buffer.shut_down();
        if let Some(stream) = self.stream.take() {
            drop(stream);
            // Let a callback already in flight observe the shutdown flag.
            std::thread::sleep(Duration::from_millis(5));
            info!("Audio capture stopped");
        }

        let samples = self.buffer.take();
        debug!(sample_count = samples.len(), "Captured audio samples");

        match self.encode(&samples) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, target = ?self.target, "Writing recording failed");
                false
            }
        }
    }

    fn current_time(&self) -> Duration {
        let samples = self.buffer.sample_count();
        let frames = samples / self.config.channels.max(1) as usize;
        Duration::from_secs_f64(frames as f64 / self.config.sample_rate.max(1) as f64)
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        if !self.stopped {
            self.buffer.shut_down();
            self.stream.take();
        }
    }
}

/// Average interleaved frames down to one channel.
pub(crate) fn mix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Write mono samples as a 16-bit PCM WAV file.
#[track_caller]
pub(crate) fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> CoreResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| wav_error(path, e))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).map_err(|e| wav_error(path, e))?;
    }
    writer.finalize().map_err(|e| wav_error(path, e))?;

    debug!(path = ?path, sample_count = samples.len(), "WAV file written");
    Ok(())
}

#[track_caller]
fn wav_error(path: &Path, e: hound::Error) -> CoreError {
    CoreError::EncodeFailed {
        reason: format!("Failed to write {:?}: {}", path, e),
        location: ErrorLocation::from(Location::caller()),
    }
}
