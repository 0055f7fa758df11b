//! Decoded, channel-deinterleaved audio handed to the analysis entry points.
//!
//! The kernel never decodes containers or resamples; it only reads samples
//! that an external decoder has already produced.

use crate::{Error, Result};

/// Anything that looks like a decoded audio file: a sample rate plus one
/// buffer per channel.
pub trait AudioSource {
    fn sample_rate(&self) -> f64;

    fn channel_data(&self) -> &[Vec<f32>];

    fn number_of_channels(&self) -> usize {
        self.channel_data().len()
    }

    /// Samples per channel. Channels of unequal length are truncated to the
    /// shortest one.
    fn length(&self) -> usize {
        self.channel_data()
            .iter()
            .map(|c| c.len())
            .min()
            .unwrap_or(0)
    }

    /// Duration in seconds.
    fn duration(&self) -> f64 {
        let sr = self.sample_rate();
        if sr > 0.0 {
            self.length() as f64 / sr
        } else {
            0.0
        }
    }
}

/// Owned multi-channel buffer of 32-bit float samples.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct AudioBuffer {
    sample_rate: f64,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Single-channel buffer.
    pub fn mono(samples: Vec<f32>, sample_rate: f64) -> Result<Self> {
        Self::from_channels(vec![samples], sample_rate)
    }

    /// Two-channel buffer.
    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: f64) -> Result<Self> {
        Self::from_channels(vec![left, right], sample_rate)
    }

    /// Buffer from planar channel data. All channels must share one length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(Error::invalid(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        if let Some(first) = channels.first() {
            let len = first.len();
            if let Some(bad) = channels.iter().position(|c| c.len() != len) {
                return Err(Error::invalid(format!(
                    "channel {bad} has {} samples, expected {len}",
                    channels[bad].len()
                )));
            }
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Borrow every channel as a slice, the shape the streaming processors take.
    pub fn planar(&self) -> Vec<&[f32]> {
        self.channels.iter().map(Vec::as_slice).collect()
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}

impl AudioSource for AudioBuffer {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn channel_data(&self) -> &[Vec<f32>] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_buffer() {
        let buf = AudioBuffer::mono(vec![0.0; 48000], 48000.0).unwrap();
        assert_eq!(buf.number_of_channels(), 1);
        assert_eq!(buf.length(), 48000);
        assert!((buf.duration() - 1.0).abs() < 1e-12);
        assert_eq!(buf.planar().len(), 1);
    }

    #[test]
    fn test_mismatched_channels_rejected() {
        let err = AudioBuffer::stereo(vec![0.0; 10], vec![0.0; 9], 44100.0).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_bad_sample_rate_rejected() {
        assert!(AudioBuffer::mono(vec![0.0; 10], 0.0).is_err());
        assert!(AudioBuffer::mono(vec![0.0; 10], f64::NAN).is_err());
    }

    #[test]
    fn test_empty_source() {
        let buf = AudioBuffer::from_channels(Vec::new(), 44100.0).unwrap();
        assert_eq!(buf.number_of_channels(), 0);
        assert_eq!(buf.length(), 0);
        assert_eq!(buf.duration(), 0.0);
    }
}
