//! Decode/playback backends, selected at runtime by name.

use crossbeam_channel::Receiver;
use std::path::Path;

use crate::audio::{self, Track};
use crate::error::{LoopError, Result};
use crate::player;

pub const DEFAULT_BACKEND: &str = "mpg123";

/// The capability set every backend provides: read a file into frames, and
/// play a frame range on a loop.
pub trait AudioBackend {
    fn name(&self) -> &'static str;

    /// Lower-case file extensions this backend accepts.
    fn extensions(&self) -> &'static [&'static str];

    fn read(&self, path: &Path) -> Result<Track>;

    /// Plays from frame 0, jumping from `end` back to `start` until `cancel` fires.
    fn play(&self, track: &Track, start: usize, end: usize, cancel: &Receiver<()>) -> Result<()> {
        player::play_looping(track, start, end, cancel)
    }
}

/// MPEG audio through symphonia. One frame per decoded packet, like mpg123's frame iterator.
pub struct Mpg123Backend;

impl AudioBackend for Mpg123Backend {
    fn name(&self) -> &'static str {
        "mpg123"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["mp3"]
    }

    fn read(&self, path: &Path) -> Result<Track> {
        audio::decode_frames_file(path)
    }
}

/// PCM WAV through hound, cut into fixed-size frames.
pub struct WavBackend;

impl AudioBackend for WavBackend {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["wav"]
    }

    fn read(&self, path: &Path) -> Result<Track> {
        audio::read_wav_file(path)
    }
}

pub fn available_backends() -> &'static [&'static str] {
    &["mpg123", "wav"]
}

pub fn backend_for(name: &str) -> Result<Box<dyn AudioBackend>> {
    match name {
        "mpg123" => Ok(Box::new(Mpg123Backend)),
        "wav" => Ok(Box::new(WavBackend)),
        other => Err(LoopError::UnknownBackend(other.to_string())),
    }
}

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// File must exist and carry an extension some backend can read.
fn check_input(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(LoopError::FileNotFound(path.to_path_buf()));
    }

    let ext = lowercase_extension(path);
    let known = available_backends()
        .iter()
        .filter_map(|name| backend_for(name).ok())
        .any(|b| b.extensions().contains(&ext.as_str()));
    if !known {
        return Err(LoopError::UnsupportedFormat(format!(
            "no backend handles '.{}' files",
            ext
        )));
    }
    Ok(())
}

/// Validates `path` against `backend` before decoding it.
pub fn open_with(backend: &dyn AudioBackend, path: &Path) -> Result<Track> {
    check_input(path)?;

    let ext = lowercase_extension(path);
    if !backend.extensions().contains(&ext.as_str()) {
        return Err(LoopError::UnsupportedFormat(format!(
            "backend '{}' only handles {} files",
            backend.name(),
            backend.extensions().join(", ")
        )));
    }

    log::info!("Reading {:?} with the {} backend", path, backend.name());
    backend.read(path)
}

/// Checks the file before the backend name, so a missing file is reported first.
pub fn open_track(path: &Path, backend_name: &str) -> Result<Track> {
    check_input(path)?;
    let backend = backend_for(backend_name)?;
    open_with(backend.as_ref(), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_lookup() {
        for name in available_backends() {
            assert_eq!(backend_for(name).unwrap().name(), *name);
        }
        assert!(backend_for(DEFAULT_BACKEND).is_ok());
        assert!(matches!(
            backend_for("audioread"),
            Err(LoopError::UnknownBackend(name)) if name == "audioread"
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = open_track(Path::new("/definitely/not/here.mp3"), "mpg123").unwrap_err();
        assert!(matches!(err, LoopError::FileNotFound(_)));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_track(dir.path(), "wav").unwrap_err();
        assert!(matches!(err, LoopError::FileNotFound(_)));
    }

    #[test]
    fn test_extension_must_match_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.flac");
        std::fs::write(&path, b"not really flac").unwrap();

        let err = open_track(&path, "mpg123").unwrap_err();
        assert!(matches!(err, LoopError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_file_checked_before_backend_name() {
        let err = open_track(Path::new("/missing.mp3"), "nope").unwrap_err();
        assert!(matches!(err, LoopError::FileNotFound(_)));

        let dir = tempfile::tempdir().unwrap();
        let ogg = dir.path().join("song.ogg");
        std::fs::write(&ogg, b"not really ogg").unwrap();
        let err = open_track(&ogg, "nope").unwrap_err();
        assert!(matches!(err, LoopError::UnsupportedFormat(_)));

        let mp3 = dir.path().join("song.mp3");
        std::fs::write(&mp3, b"not really mp3").unwrap();
        let err = open_track(&mp3, "nope").unwrap_err();
        assert!(matches!(err, LoopError::UnknownBackend(_)));
    }
}
