use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{LoopError, Result};

/// Samples per channel in each frame cut from a WAV file; matches an MPEG-1 Layer III frame.
pub const WAV_FRAME_LEN: usize = 1152;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Encoding {
    SignedInt16, // Little-endian i16
    Float32,     // Little-endian f32
}

impl Encoding {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Encoding::SignedInt16 => 2,
            Encoding::Float32 => 4,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: Encoding,
}

/// Interleaved PCM bytes for one codec decode unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_i16(samples: &[i16]) -> Self {
        Self(samples.iter().flat_map(|s| s.to_le_bytes()).collect())
    }

    pub fn byte_len(&self) -> usize {
        self.0.len()
    }

    /// Reinterprets the frame as little-endian i16 samples. A trailing odd byte is ignored.
    pub fn samples_i16(&self) -> impl Iterator<Item = i16> + '_ {
        self.0
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }
}

/// A fully decoded track. Built once at load time and never mutated.
#[derive(Clone, Debug)]
pub struct Track {
    frames: Vec<Frame>,
    format: AudioFormat,
}

impl Track {
    pub fn new(frames: Vec<Frame>, format: AudioFormat) -> Self {
        Self { frames, format }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    /// Analysis, playback and export all assume 16-bit signed PCM.
    pub fn require_s16(&self) -> Result<()> {
        match self.format.encoding {
            Encoding::SignedInt16 => Ok(()),
            other => Err(LoopError::UnsupportedFormat(format!(
                "{:?} samples; only 16-bit signed PCM is supported",
                other
            ))),
        }
    }

    /// Checks that `[start, end)` is a non-empty frame range inside the track.
    pub fn check_bounds(&self, start: usize, end: usize) -> Result<()> {
        if start >= end || end > self.frames.len() {
            return Err(LoopError::InvalidLoopBounds {
                start,
                end,
                frames: self.frames.len(),
            });
        }
        Ok(())
    }
}

// Core decoding function that takes a generic MediaSource.
// Every decoded packet becomes one Frame, converted to interleaved i16.
pub fn decode_frames_from_source(source: Box<dyn MediaSource>, hint: &Hint) -> Result<Track> {
    let mss = MediaSourceStream::new(source, Default::default());

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| LoopError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoopError::UnsupportedFormat("no supported audio track".to_string()))?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| LoopError::UnsupportedFormat(e.to_string()))?;

    let track_id = track.id;
    let mut frames = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map_or(0, |c| c.count() as u16);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(Error::ResetRequired) => break,
            Err(e) => return Err(LoopError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if sample_rate == 0 || channels == 0 {
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;
                }
                if decoded.frames() == 0 {
                    continue;
                }

                let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                frames.push(Frame::from_i16(buf.samples()));
            }
            Err(Error::DecodeError(msg)) => {
                log::warn!("Skipping undecodable packet: {}", msg);
            }
            Err(e) => return Err(LoopError::Decode(e.to_string())),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(LoopError::Decode("stream carries no audio format".to_string()));
    }

    log::info!(
        "Decoded {} frames, {}Hz, {} channels",
        frames.len(),
        sample_rate,
        channels
    );

    Ok(Track::new(
        frames,
        AudioFormat {
            sample_rate,
            channels,
            encoding: Encoding::SignedInt16,
        },
    ))
}

pub fn decode_frames_file<P: AsRef<Path>>(path: P) -> Result<Track> {
    let src = File::open(&path)?;

    let mut hint = Hint::new();
    if let Some(ext) = path.as_ref().extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    decode_frames_from_source(Box::new(src), &hint)
}

/// Reads a WAV stream and cuts it into frames of `frame_len` samples per channel.
/// The last frame holds whatever remains and may be shorter.
pub fn read_wav_frames<R: Read>(reader: R, frame_len: usize) -> Result<Track> {
    let mut wav = hound::WavReader::new(reader)?;
    let spec = wav.spec();
    let chunk = frame_len.max(1) * spec.channels as usize;

    let (encoding, bytes): (Encoding, Vec<u8>) = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => {
            let mut bytes = Vec::with_capacity(wav.len() as usize * 2);
            for sample in wav.samples::<i16>() {
                bytes.extend_from_slice(&sample?.to_le_bytes());
            }
            (Encoding::SignedInt16, bytes)
        }
        (hound::SampleFormat::Float, 32) => {
            let mut bytes = Vec::with_capacity(wav.len() as usize * 4);
            for sample in wav.samples::<f32>() {
                bytes.extend_from_slice(&sample?.to_le_bytes());
            }
            (Encoding::Float32, bytes)
        }
        (fmt, bits) => {
            return Err(LoopError::UnsupportedFormat(format!(
                "{}-bit {:?} WAV",
                bits, fmt
            )))
        }
    };

    let frames: Vec<Frame> = bytes
        .chunks(chunk * encoding.bytes_per_sample())
        .map(|c| Frame::from_bytes(c.to_vec()))
        .collect();

    log::info!(
        "Read {} WAV frames, {}Hz, {} channels, {:?}",
        frames.len(),
        spec.sample_rate,
        spec.channels,
        encoding
    );

    Ok(Track::new(
        frames,
        AudioFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            encoding,
        },
    ))
}

pub fn read_wav_file<P: AsRef<Path>>(path: P) -> Result<Track> {
    let file = File::open(path)?;
    read_wav_frames(BufReader::new(file), WAV_FRAME_LEN)
}
