use crossbeam_channel::{Receiver, RecvTimeoutError};
use rodio::{OutputStream, Sink, Source};
use std::time::Duration;

use crate::audio::Track;
use crate::error::{LoopError, Result};

/// Plays a track's frames from the start, jumping from `end_frame` back to
/// `start_frame`. Unbounded unless `max_samples` is set.
pub struct LoopingSource {
    samples: Vec<Vec<i16>>, // Decoded frames
    channels: u16,
    sample_rate: u32,
    start_frame: usize,
    end_frame: usize,
    frame: usize,
    cursor: usize, // Position inside the current frame
    emitted: usize,
    max_samples: Option<usize>, // None means infinite
}

impl LoopingSource {
    pub fn new(track: &Track, start_frame: usize, end_frame: usize, max_samples: Option<usize>) -> Result<Self> {
        track.require_s16()?;
        track.check_bounds(start_frame, end_frame)?;

        Ok(Self {
            samples: track
                .frames()
                .iter()
                .map(|f| f.samples_i16().collect())
                .collect(),
            channels: track.channels(),
            sample_rate: track.sample_rate(),
            start_frame,
            end_frame,
            frame: 0,
            cursor: 0,
            emitted: 0,
            max_samples,
        })
    }
}

impl Iterator for LoopingSource {
    type Item = i16;

    fn next(&mut self) -> Option<Self::Item> {
        if self.max_samples.is_some_and(|max| self.emitted >= max) {
            return None;
        }

        // Skip past finished (or empty) frames, wrapping at the loop end
        let mut hops = 0;
        while self.cursor >= self.samples[self.frame].len() {
            self.cursor = 0;
            self.frame += 1;
            if self.frame == self.end_frame {
                self.frame = self.start_frame;
            }
            hops += 1;
            if hops > 2 * self.end_frame {
                // Every frame in the loop is empty
                return None;
            }
        }

        let sample = self.samples[self.frame][self.cursor];
        self.cursor += 1;
        self.emitted += 1;
        Some(sample)
    }
}

impl Source for LoopingSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Infinite or unknown
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Blocks until a message arrives on `cancel`. A disconnected `cancel` means
/// nobody can stop playback, so it runs until the process is interrupted.
pub fn play_looping(track: &Track, start_frame: usize, end_frame: usize, cancel: &Receiver<()>) -> Result<()> {
    let source = LoopingSource::new(track, start_frame, end_frame, None)?;

    let (_stream, stream_handle) =
        OutputStream::try_default().map_err(|e| LoopError::Playback(e.to_string()))?;
    let sink = Sink::try_new(&stream_handle).map_err(|e| LoopError::Playback(e.to_string()))?;
    sink.append(source);
    log::info!("Looping frames {}..{}", start_frame, end_frame);

    loop {
        match cancel.recv_timeout(Duration::from_millis(100)) {
            Ok(()) => {
                log::info!("Playback stopped");
                sink.stop();
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if sink.empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                sink.sleep_until_end();
                break;
            }
        }
    }

    Ok(())
}
