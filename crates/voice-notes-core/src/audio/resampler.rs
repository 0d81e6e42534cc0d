use crate::{CoreError, CoreResult};

use std::panic::Location;

use audioadapter_buffers::direct::InterleavedSlice;
use error_location::ErrorLocation;
use rubato::{Fft, FixedSync, Resampler as RubatoResampler};
use tracing::{debug, instrument};

/// Frames fed to the FFT resampler per call.
const CHUNK_FRAMES: usize = 1024;

/// Mono sample-rate converter used to bring captured audio to the stored rate.
pub struct Resampler {
    resampler: Fft<f32>,
    input_rate: u32,
    output_rate: u32,
}

impl Resampler {
    #[track_caller]
    #[instrument]
    pub fn new(input_rate: u32, output_rate: u32) -> CoreResult<Self> {
        let resampler = Fft::<f32>::new(
            input_rate as usize,
            output_rate as usize,
            CHUNK_FRAMES,
            2,
            1,
            FixedSync::Input,
        )
        .map_err(|e| CoreError::EncodeFailed {
            reason: format!("Failed to create resampler: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        debug!(input_rate, output_rate, "Resampler initialized");

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
        })
    }

    /// Convert `samples` in one pass. The last partial chunk is zero padded
    /// and the output trimmed back to the expected length.
    #[track_caller]
    #[instrument(skip(self, samples))]
    pub fn resample(&mut self, samples: &[f32]) -> CoreResult<Vec<f32>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let expected_len =
            (samples.len() as f64 * self.output_rate as f64 / self.input_rate as f64) as usize;
        let mut output = Vec::with_capacity(expected_len);
        let mut output_chunk = vec![0.0f32; self.resampler.output_frames_max()];

        for chunk in samples.chunks(CHUNK_FRAMES) {
            let mut input_chunk = chunk.to_vec();
            input_chunk.resize(CHUNK_FRAMES, 0.0);

            let input_adapter = InterleavedSlice::new(&input_chunk, 1, CHUNK_FRAMES)
                .map_err(|e| resample_error("Failed to create input adapter", e))?;

            let output_frames = output_chunk.len();
            let mut output_adapter = InterleavedSlice::new_mut(&mut output_chunk, 1, output_frames)
                .map_err(|e| resample_error("Failed to create output adapter", e))?;

            let (_, written) = self
                .resampler
                .process_into_buffer(&input_adapter, &mut output_adapter, None)
                .map_err(|e| resample_error("Resampling failed", e))?;

            output.extend_from_slice(&output_chunk[..written]);
        }

        output.truncate(expected_len);

        debug!(
            input_len = samples.len(),
            output_len = output.len(),
            "Resampled audio"
        );

        Ok(output)
    }
}

#[track_caller]
fn resample_error(context: &str, e: impl std::fmt::Display) -> CoreError {
    CoreError::EncodeFailed {
        reason: format!("{}: {}", context, e),
        location: ErrorLocation::from(Location::caller()),
    }
}
