//! Turns irregular callback blocks into fixed-length, fixed-hop frames.

use crate::config::SchedulerConfig;
use crate::ring::FrameRing;
use sonus_core::{CallbackContext, Result};

/// One analysis frame: `buffer_size` samples per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFrame {
    channels: Vec<Vec<f32>>,
    /// Absolute index of the first sample.
    pub sample_index: u64,
    /// Host time at which the last sample was captured, in seconds.
    pub timestamp: f64,
}

impl AnalysisFrame {
    pub fn new(channels: usize, len: usize) -> Self {
        Self {
            channels: vec![vec![0.0; len]; channels],
            sample_index: 0,
            timestamp: 0.0,
        }
    }

    /// Frame from planar data, e.g. for feeding features outside a session.
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Self {
        Self {
            channels,
            sample_index: 0,
            timestamp: 0.0,
        }
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Average of all channels, written into `out`.
    pub fn downmix_into(&self, out: &mut Vec<f32>) {
        out.clear();
        out.resize(self.len(), 0.0);
        let scale = 1.0 / self.channels.len().max(1) as f32;
        for channel in &self.channels {
            for (o, &x) in out.iter_mut().zip(channel) {
                *o += x * scale;
            }
        }
    }

    /// Overwrite with `other`, reusing this frame's allocations when they fit.
    pub fn copy_from(&mut self, other: &AnalysisFrame) {
        self.channels.resize_with(other.channels.len(), Vec::new);
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            dst.clear();
            dst.extend_from_slice(src);
        }
        self.sample_index = other.sample_index;
        self.timestamp = other.timestamp;
    }
}

/// Frame scheduler for the audio callback.
///
/// Per call the work is proportional to the block size. The ring grows only
/// when a block would overrun it, which after the first few callbacks does
/// not happen for a steady block size.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    config: SchedulerConfig,
    ring: FrameRing,
    next_frame_start: u64,
    scratch: AnalysisFrame,
}

impl FrameScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ring: FrameRing::new(config.channels, config.buffer_size * 2),
            next_frame_start: 0,
            scratch: AnalysisFrame::new(config.channels, config.buffer_size),
            config,
        })
    }

    /// Consume one callback block and call `emit` for every frame it
    /// completes, oldest first. Returns the number of frames emitted.
    ///
    /// The block length is taken from the first channel.
    pub fn process<F>(&mut self, block: &[&[f32]], ctx: &CallbackContext, mut emit: F) -> usize
    where
        F: FnMut(&AnalysisFrame),
    {
        let frames = block.first().map_or(0, |c| c.len());
        if frames == 0 {
            return 0;
        }

        self.ring.reserve(self.next_frame_start, frames);
        self.ring.write(block, frames);

        let buffer_size = self.config.buffer_size as u64;
        let write_index = self.ring.write_index();
        let mut emitted = 0;
        while write_index - self.next_frame_start >= buffer_size {
            let start = self.next_frame_start;
            for (ch, out) in self.scratch.channels.iter_mut().enumerate() {
                self.ring.read_into(ch, start, out);
            }
            let lag = write_index - (start + buffer_size);
            self.scratch.sample_index = start;
            self.scratch.timestamp = ctx.time_before_end(lag as usize);
            emit(&self.scratch);

            self.next_frame_start += self.config.hop_size as u64;
            emitted += 1;
        }
        emitted
    }

    /// Drop all buffered audio and rewind both indices to zero.
    pub fn reset(&mut self) {
        self.ring.reset();
        self.next_frame_start = 0;
        self.scratch.sample_index = 0;
        self.scratch.timestamp = 0.0;
    }

    pub fn write_index(&self) -> u64 {
        self.ring.write_index()
    }

    pub fn next_frame_start(&self) -> u64 {
        self.next_frame_start
    }

    /// Samples written but not yet released by a frame.
    pub fn unread(&self) -> u64 {
        self.ring.write_index() - self.next_frame_start
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}
