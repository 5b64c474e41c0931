pub mod error;
pub mod audio;
pub mod backend;
pub mod fingerprint;
pub mod analysis;
pub mod time_index;
pub mod player;
pub mod export;
pub mod config;

pub use analysis::LoopCandidate;
pub use error::{LoopError, Result};

/// Loop bounds in track frame indices, ready for playback or export.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopPoints {
    pub start_frame: usize,
    pub end_frame: usize,
    pub confidence: f64,
    pub candidate: LoopCandidate, // Same bounds in fingerprint-series indices
}

/// How an interleaved frame is reduced to a single time series.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ChannelFold {
    FirstChannel,
    Average,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FingerprintSettings {
    pub leading_boundary_frames: usize,
    pub trailing_boundary_frames: usize,
    pub min_interior_frames: usize,
    pub channel_fold: ChannelFold,
    pub band_start: usize, // First FFT bin of the fingerprint band (inclusive)
    pub band_end: usize,   // Last FFT bin of the fingerprint band (exclusive)
    pub denoise_threshold: f64, // Fraction of the frame's in-band peak below which bins are masked
}

impl Default for FingerprintSettings {
    fn default() -> Self {
        Self {
            leading_boundary_frames: 1,
            trailing_boundary_frames: 2,
            min_interior_frames: 4,
            channel_fold: ChannelFold::FirstChannel,
            band_start: 1,
            band_end: 25,
            denoise_threshold: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchSettings {
    pub start_offset: usize, // First candidate start, in series indices
    pub test_length: usize,  // Length of each compared window
    pub start_step_divisor: usize, // Start positions are stepped by series_len / divisor
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            start_offset: 200,
            test_length: 500,
            start_step_divisor: 10,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisSettings {
    pub fingerprint: FingerprintSettings,
    pub search: SearchSettings,
}
