use std::io::{Cursor, Seek, Write};
use std::path::Path;

use crate::audio::Track;
use crate::error::Result;
use crate::player::LoopingSource;

/// Interleaved samples needed for `seconds` of audio, rounded up to whole sample frames.
pub fn samples_for_duration(track: &Track, seconds: f64) -> usize {
    let per_channel = (seconds.max(0.0) * track.sample_rate() as f64).ceil() as usize;
    per_channel * track.channels() as usize
}

pub fn write_loop<W: Write + Seek>(
    out: W,
    track: &Track,
    start_frame: usize,
    end_frame: usize,
    loop_duration_secs: f64,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels: track.channels(),
        sample_rate: track.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // Same sequence as playback, cut off at the requested duration
    let total = samples_for_duration(track, loop_duration_secs);
    let source = LoopingSource::new(track, start_frame, end_frame, Some(total))?;

    let mut writer = hound::WavWriter::new(out, spec)?;
    for sample in source {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

pub fn save_loop<P: AsRef<Path>>(
    track: &Track,
    start_frame: usize,
    end_frame: usize,
    output_path: P,
    loop_duration_secs: f64,
) -> Result<()> {
    let mut buffer = Cursor::new(Vec::new());
    write_loop(&mut buffer, track, start_frame, end_frame, loop_duration_secs)?;
    std::fs::write(&output_path, buffer.into_inner())?;
    log::info!(
        "Saved {:.1}s loop to {:?}",
        loop_duration_secs,
        output_path.as_ref()
    );
    Ok(())
}
