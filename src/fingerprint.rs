//! Per-frame dominant-frequency fingerprint.
//!
//! Each interior frame of a track is folded to mono, transformed with a real FFT
//! and reduced to the strongest bin inside a narrow low-frequency band. Frames
//! where nothing rises above the band's floor are masked (`None`).

use num_complex::Complex;
use realfft::RealFftPlanner;

use crate::audio::{Frame, Track};
use crate::error::{LoopError, Result};
use crate::{ChannelFold, FingerprintSettings};

#[derive(Clone, Debug, PartialEq)]
pub struct FingerprintSeries {
    values: Vec<Option<f64>>,
    frame_offset: usize,
}

impl FingerprintSeries {
    /// `frame_offset` is the track frame that series index 0 came from.
    pub fn new(values: Vec<Option<f64>>, frame_offset: usize) -> Self {
        Self {
            values,
            frame_offset,
        }
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn frame_offset(&self) -> usize {
        self.frame_offset
    }

    pub fn masked_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// `[start, start + len)`, or `None` if it runs past the end.
    pub fn window(&self, start: usize, len: usize) -> Option<&[Option<f64>]> {
        self.values.get(start..start.checked_add(len)?)
    }

    pub fn to_track_frame(&self, index: usize) -> usize {
        index + self.frame_offset
    }
}

pub fn extract_fingerprint(track: &Track, settings: &FingerprintSettings) -> Result<FingerprintSeries> {
    track.require_s16()?;

    let lead = settings.leading_boundary_frames;
    let interior_end = track
        .frame_count()
        .saturating_sub(settings.trailing_boundary_frames);
    let interior = interior_end.saturating_sub(lead);

    if interior < settings.min_interior_frames.max(1) {
        return Err(LoopError::InsufficientData(format!(
            "{} interior frames, need at least {}",
            interior, settings.min_interior_frames
        )));
    }

    let channels = track.channels().max(1) as usize;
    let mut planner = RealFftPlanner::<f64>::new();
    let mut values = Vec::with_capacity(interior);

    for frame in &track.frames()[lead..interior_end] {
        let mono = fold_to_mono(frame, channels, settings.channel_fold);
        let spectrum = magnitude_spectrum(&mut planner, &mono)?;
        values.push(dominant_frequency(&spectrum, mono.len(), settings));
    }

    let series = FingerprintSeries::new(values, lead);
    log::debug!(
        "Fingerprint: {} values, {} masked, offset {}",
        series.len(),
        series.masked_count(),
        series.frame_offset()
    );
    Ok(series)
}

pub fn fold_to_mono(frame: &Frame, channels: usize, fold: ChannelFold) -> Vec<f64> {
    let samples: Vec<i16> = frame.samples_i16().collect();
    match fold {
        ChannelFold::FirstChannel => samples
            .iter()
            .step_by(channels)
            .map(|&s| s as f64)
            .collect(),
        ChannelFold::Average => samples
            .chunks_exact(channels)
            .map(|chunk| chunk.iter().map(|&s| s as f64).sum::<f64>() / channels as f64)
            .collect(),
    }
}

fn magnitude_spectrum(planner: &mut RealFftPlanner<f64>, mono: &[f64]) -> Result<Vec<f64>> {
    if mono.is_empty() {
        return Ok(Vec::new());
    }

    let r2c = planner.plan_fft_forward(mono.len());
    let mut input = mono.to_vec();
    let mut output = r2c.make_output_vec();
    r2c.process(&mut input, &mut output)
        .map_err(|e| LoopError::Fft(e.to_string()))?;

    Ok(magnitudes(&output))
}

fn magnitudes(spectrum: &[Complex<f64>]) -> Vec<f64> {
    spectrum.iter().map(|c| c.norm()).collect()
}

/// Masks in-band bins below the threshold, then picks the first strongest survivor.
/// Returns `None` when that is the lowest band bin or the band is out of reach.
pub fn dominant_frequency(spectrum: &[f64], frame_len: usize, settings: &FingerprintSettings) -> Option<f64> {
    let band_end = settings.band_end.min(spectrum.len());
    if band_end <= settings.band_start + 1 {
        return None;
    }
    let band = &spectrum[settings.band_start..band_end];

    let peak = band.iter().cloned().fold(0.0_f64, f64::max);
    let threshold = settings.denoise_threshold * peak;

    // An all-zero band masks nothing
    let denoised: Vec<Option<f64>> = band
        .iter()
        .map(|&m| if peak > 0.0 && m < threshold { None } else { Some(m) })
        .collect();

    let mut best: Option<(usize, f64)> = None;
    for (i, m) in denoised.iter().enumerate() {
        if let Some(m) = *m {
            if best.map_or(true, |(_, b)| m > b) {
                best = Some((i, m));
            }
        }
    }

    match best {
        Some((0, _)) | None => None,
        Some((i, _)) => Some((settings.band_start + i) as f64 / frame_len as f64),
    }
}
