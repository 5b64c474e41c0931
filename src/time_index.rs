use crate::audio::Track;
use crate::error::{LoopError, Result};

/// Converts between frame indices and elapsed playback time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeIndex {
    frames_per_second: f64,
}

impl TimeIndex {
    /// `samples_per_frame` counts interleaved samples, all channels included.
    pub fn new(sample_rate: u32, channels: u16, samples_per_frame: usize) -> Result<Self> {
        if sample_rate == 0 || channels == 0 || samples_per_frame == 0 {
            return Err(LoopError::InsufficientData(format!(
                "cannot time frames of {} samples at {}Hz x {} channels",
                samples_per_frame, sample_rate, channels
            )));
        }
        let samples_per_second = sample_rate as f64 * channels as f64;
        Ok(Self {
            frames_per_second: samples_per_second / samples_per_frame as f64,
        })
    }

    /// Measures frame size on the first interior frame; boundary frames are often short.
    pub fn from_track(track: &Track, leading_boundary_frames: usize) -> Result<Self> {
        let frame = track.frames().get(leading_boundary_frames).ok_or_else(|| {
            LoopError::InsufficientData(format!(
                "track has {} frames, no interior frame to measure",
                track.frame_count()
            ))
        })?;
        // 16-bit samples
        Self::new(track.sample_rate(), track.channels(), frame.byte_len() / 2)
    }

    pub fn frames_per_second(&self) -> f64 {
        self.frames_per_second
    }

    pub fn seconds_of_frame(&self, frame: usize) -> f64 {
        frame as f64 / self.frames_per_second
    }

    /// `MM:SS.mmm`
    pub fn time_of_frame(&self, frame: usize) -> String {
        let secs = self.seconds_of_frame(frame);
        format!("{:02}:{:06.3}", (secs / 60.0).floor() as u64, secs % 60.0)
    }

    /// Rounds up, so the returned frame never starts before `seconds`.
    pub fn time_to_frame(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.frames_per_second).ceil() as usize
    }
}

/// Parses either plain seconds (`"83.5"`) or `MM:SS.mmm` (`"01:23.500"`).
pub fn parse_timestamp(text: &str) -> Result<f64> {
    let text = text.trim();
    let invalid = || LoopError::Config(format!("invalid time '{}'", text));

    let seconds = match text.split_once(':') {
        Some((mins, secs)) => {
            let mins: u64 = mins.parse().map_err(|_| invalid())?;
            let secs: f64 = secs.parse().map_err(|_| invalid())?;
            // 60.000 shows up when seconds round up at a minute boundary
            if !(0.0..=60.0).contains(&secs) {
                return Err(invalid());
            }
            mins as f64 * 60.0 + secs
        }
        None => text.parse::<f64>().map_err(|_| invalid())?,
    };

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFormat, Encoding, Frame};
    use approx::assert_relative_eq;

    fn granule_index() -> TimeIndex {
        TimeIndex::new(44100, 2, 1152).unwrap()
    }

    #[test]
    fn test_frame_zero() {
        assert_eq!(granule_index().time_of_frame(0), "00:00.000");
    }

    #[test]
    fn test_time_format() {
        let index = granule_index(); // 76.5625 frames per second
        assert_relative_eq!(index.frames_per_second(), 76.5625);
        assert_eq!(index.time_of_frame(7656), "01:39.997");
        assert_eq!(index.time_of_frame(4594), "01:00.003");
        assert_eq!(index.time_of_frame(766), "00:10.005");
    }

    #[test]
    fn test_time_to_frame_rounds_up() {
        let index = granule_index();
        assert_eq!(index.time_to_frame(0.0), 0);
        assert_eq!(index.time_to_frame(1.0), 77);
        assert_eq!(index.time_to_frame(2.0), 154); // exactly 153.125
        assert_eq!(index.time_to_frame(-3.0), 0);
    }

    #[test]
    fn test_round_trip_within_one_frame() {
        let index = granule_index();
        for frame in (0..20_000).step_by(37) {
            let secs = parse_timestamp(&index.time_of_frame(frame)).unwrap();
            let back = index.time_to_frame(secs);
            assert!(
                back.abs_diff(frame) <= 1,
                "frame {} came back as {}",
                frame,
                back
            );
        }
    }

    #[test]
    fn test_parse_timestamp() {
        assert_relative_eq!(parse_timestamp("83.5").unwrap(), 83.5);
        assert_relative_eq!(parse_timestamp("01:23.500").unwrap(), 83.5);
        assert_relative_eq!(parse_timestamp(" 0:05 ").unwrap(), 5.0);
        assert!(parse_timestamp("abc").is_err());
        assert!(parse_timestamp("1:75").is_err());
        assert!(parse_timestamp("-2").is_err());
    }

    #[test]
    fn test_from_track_measures_interior_frame() {
        let format = AudioFormat {
            sample_rate: 44100,
            channels: 2,
            encoding: Encoding::SignedInt16,
        };
        // Short first frame, full-size interior frames of 1152 stereo samples
        let mut frames = vec![Frame::from_i16(&[0; 100])];
        frames.extend(vec![Frame::from_i16(&[0; 2304]); 3]);
        let track = Track::new(frames, format);

        let index = TimeIndex::from_track(&track, 1).unwrap();
        assert_relative_eq!(index.frames_per_second(), 88200.0 / 2304.0);

        let empty = Track::new(Vec::new(), format);
        assert!(matches!(
            TimeIndex::from_track(&empty, 1),
            Err(LoopError::InsufficientData(_))
        ));
    }
}
