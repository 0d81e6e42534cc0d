use std::{fs::File, path::Path, time::Duration};

use symphonia::core::{
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
    units::TimeBase,
};
use tracing::debug;

/// Duration of the audio file at `path`, or `None` if it cannot be opened
/// as audio.
///
/// Uses the container's frame count when present and otherwise sums packet
/// durations.
pub fn probe_duration(path: &Path) -> Option<Duration> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = ?path, error = %e, "Probe could not open file");
            return None;
        }
    };
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = match symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(probed) => probed,
        Err(e) => {
            debug!(path = ?path, error = %e, "Probe found no audio");
            return None;
        }
    };

    let mut format = probed.format;
    let track = format.default_track()?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))?;

    let frames = match params.n_frames {
        Some(frames) => frames,
        None => {
            let mut total = 0u64;
            while let Ok(packet) = format.next_packet() {
                if packet.track_id() == track_id {
                    total += packet.dur;
                }
            }
            total
        }
    };

    let time = time_base.calc_time(frames);
    let duration = Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac);
    debug!(path = ?path, duration_ms = duration.as_millis(), "Probed audio duration");

    Some(duration)
}
