//! Session and scheduler configuration, plus inbound control messages.

use crate::policy::RealtimePolicy;
use sonus_core::{Error, Result};

/// Host-facing realtime session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct SessionConfig {
    /// Analysis frame length in samples.
    pub buffer_size: usize,
    /// Samples between consecutive frame starts.
    pub hop_size: usize,
    pub input_channel_count: usize,
    pub realtime_policy: RealtimePolicy,
    /// Under [`RealtimePolicy::Warn`], heavy features run on one frame in this many.
    pub heavy_feature_interval: u32,
    /// Frames that may wait for the drainer before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            hop_size: 512,
            input_channel_count: 1,
            realtime_policy: RealtimePolicy::Warn,
            heavy_feature_interval: 4,
            queue_capacity: 64,
        }
    }
}

impl SessionConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_hop_size(mut self, hop_size: usize) -> Self {
        self.hop_size = hop_size;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.input_channel_count = channels;
        self
    }

    pub fn with_policy(mut self, policy: RealtimePolicy) -> Self {
        self.realtime_policy = policy;
        self
    }

    pub fn with_heavy_feature_interval(mut self, interval: u32) -> Self {
        self.heavy_feature_interval = interval;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::invalid("buffer_size must be at least 1"));
        }
        if self.hop_size == 0 || self.hop_size > self.buffer_size {
            return Err(Error::invalid(format!(
                "hop_size {} out of range (1-{})",
                self.hop_size, self.buffer_size
            )));
        }
        if self.input_channel_count == 0 {
            return Err(Error::invalid("input_channel_count must be at least 1"));
        }
        if self.heavy_feature_interval == 0 {
            return Err(Error::invalid("heavy_feature_interval must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::invalid("queue_capacity must be at least 1"));
        }
        Ok(())
    }

    pub fn scheduler_config(&self, sample_rate: f64) -> SchedulerConfig {
        SchedulerConfig {
            buffer_size: self.buffer_size,
            hop_size: self.hop_size,
            channels: self.input_channel_count,
            sample_rate,
        }
    }
}

/// Frame geometry for a [`FrameScheduler`](crate::FrameScheduler).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub buffer_size: usize,
    pub hop_size: usize,
    pub channels: usize,
    pub sample_rate: f64,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::invalid("buffer_size must be at least 1"));
        }
        if self.hop_size == 0 || self.hop_size > self.buffer_size {
            return Err(Error::invalid(format!(
                "hop_size {} out of range (1-{})",
                self.hop_size, self.buffer_size
            )));
        }
        if self.channels == 0 {
            return Err(Error::invalid("scheduler needs at least one channel"));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::invalid(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

/// Messages a host sends to a running session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(
    feature = "serialization",
    serde(tag = "type", content = "payload", rename_all = "camelCase")
)]
pub enum ControlMessage {
    SetFeatures(Vec<String>),
    SetConfig(SessionConfig),
    Reset,
}
