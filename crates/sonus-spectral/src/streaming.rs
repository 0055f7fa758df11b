//! Sliding-window STFT over an unbounded sample stream.
//!
//! Keeps one `window_size` input buffer. Every time it fills, one frame is
//! analyzed and the buffer shifts left by `hop_size`. History that has
//! already been consumed is never re-windowed.

use crate::stft::{StftFrame, StftOptions, StftProcessor};
use sonus_core::Result;

/// A frame emitted by [`StreamingStft`], stamped with its stream position.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingFrame {
    /// Zero-based frame index since construction or the last reset.
    pub index: u64,
    /// Start time of the frame in seconds.
    pub time: f64,
    pub frame: StftFrame,
}

pub struct StreamingStft {
    processor: StftProcessor,
    buffer: Vec<f32>,
    filled: usize,
    /// Samples to discard before refilling when `hop_size > window_size`.
    skip: usize,
    frames_emitted: u64,
}

impl StreamingStft {
    pub fn new(options: StftOptions) -> Result<Self> {
        let processor = StftProcessor::new(options)?;
        Ok(Self {
            buffer: vec![0.0; options.window_size],
            processor,
            filled: 0,
            skip: 0,
            frames_emitted: 0,
        })
    }

    pub fn options(&self) -> &StftOptions {
        self.processor.options()
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Append samples and return every frame that became complete.
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<StreamingFrame>> {
        let opts = *self.processor.options();
        let ws = opts.window_size;
        let hop = opts.hop_size;
        let mut frames = Vec::new();

        let mut input = samples;
        while !input.is_empty() {
            if self.skip > 0 {
                let n = self.skip.min(input.len());
                self.skip -= n;
                input = &input[n..];
                continue;
            }

            let n = (ws - self.filled).min(input.len());
            self.buffer[self.filled..self.filled + n].copy_from_slice(&input[..n]);
            self.filled += n;
            input = &input[n..];

            if self.filled == ws {
                let frame = self.processor.analyze_frame(&self.buffer)?;
                let index = self.frames_emitted;
                frames.push(StreamingFrame {
                    index,
                    time: (index as f64 * hop as f64) / opts.sample_rate,
                    frame,
                });
                self.frames_emitted += 1;

                if hop >= ws {
                    self.filled = 0;
                    self.skip = hop - ws;
                } else {
                    self.buffer.copy_within(hop.., 0);
                    self.filled = ws - hop;
                }
            }
        }

        Ok(frames)
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filled = 0;
        self.skip = 0;
        self.frames_emitted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| ((i % 97) as f32 / 97.0) - 0.5).collect()
    }

    #[test]
    fn test_matches_batch_stft() {
        let opts = StftOptions::new(256, 64, 8000.0);
        let signal = ramp(3000);

        let mut batch = StftProcessor::new(opts).unwrap();
        let expected = batch.forward(&signal).unwrap();

        let mut streaming = StreamingStft::new(opts).unwrap();
        let mut got = Vec::new();
        for chunk in signal.chunks(37) {
            got.extend(streaming.push(chunk).unwrap());
        }

        assert_eq!(got.len(), expected.frame_count());
        for (s, (b, &t)) in got.iter().zip(expected.frames.iter().zip(&expected.times)) {
            assert_abs_diff_eq!(s.time, t, epsilon = 1e-12);
            for (x, y) in s.frame.magnitude.iter().zip(&b.magnitude) {
                assert_abs_diff_eq!(x, y, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_hop_larger_than_window() {
        let opts = StftOptions::new(64, 100, 1000.0);
        let signal = ramp(1000);
        let mut batch = StftProcessor::new(opts).unwrap();
        let expected = batch.forward(&signal).unwrap();

        let mut streaming = StreamingStft::new(opts).unwrap();
        let got = streaming.push(&signal).unwrap();
        assert_eq!(got.len(), expected.frame_count());
        assert_eq!(streaming.frames_emitted() as usize, expected.frame_count());
    }

    #[test]
    fn test_reset() {
        let opts = StftOptions::new(64, 32, 1000.0);
        let mut streaming = StreamingStft::new(opts).unwrap();
        assert_eq!(streaming.push(&ramp(128)).unwrap().len(), 3);
        streaming.reset();
        assert_eq!(streaming.frames_emitted(), 0);
        assert!(streaming.push(&ramp(63)).unwrap().is_empty());
        assert_eq!(streaming.push(&ramp(1)).unwrap()[0].index, 0);
    }
}
