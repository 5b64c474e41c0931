//! Error types for auto-looper

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by loading, analysis and loop playback.
#[derive(Error, Debug)]
pub enum LoopError {
    /// File extension or sample encoding the selected backend can't handle
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Too little audio (or fingerprint) to run the requested analysis
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// No window pair reached a positive correlation
    #[error("No loop point found")]
    NoLoopFound,

    #[error("Invalid loop bounds: start {start}, end {end} (track has {frames} frames)")]
    InvalidLoopBounds {
        start: usize,
        end: usize,
        frames: usize,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for auto-looper operations
pub type Result<T> = std::result::Result<T, LoopError>;

impl From<hound::Error> for LoopError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => LoopError::Io(io),
            hound::Error::FormatError(msg) => LoopError::UnsupportedFormat(msg.to_string()),
            hound::Error::Unsupported => {
                LoopError::UnsupportedFormat("unsupported WAV layout".to_string())
            }
            other => LoopError::Decode(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for LoopError {
    fn from(e: serde_json::Error) -> Self {
        LoopError::Config(e.to_string())
    }
}
