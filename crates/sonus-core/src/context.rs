//! Per-callback timing context supplied by the host audio graph.

/// Timing information for one audio callback.
///
/// Passed explicitly into every realtime call instead of living in ambient
/// globals. `current_time` is the capture time of the last sample in the
/// block, in seconds on the host clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallbackContext {
    pub current_time: f64,
    pub sample_rate: f64,
    pub frames: usize,
}

impl CallbackContext {
    pub fn new(current_time: f64, sample_rate: f64, frames: usize) -> Self {
        Self {
            current_time,
            sample_rate,
            frames,
        }
    }

    /// Build a context from a host that reports block start times.
    pub fn from_block_start(start_time: f64, frames: usize, sample_rate: f64) -> Self {
        Self {
            current_time: start_time + frames as f64 / sample_rate,
            sample_rate,
            frames,
        }
    }

    /// Host time at which the sample `lag` samples before the end of this
    /// block was captured.
    #[inline]
    pub fn time_before_end(&self, lag: usize) -> f64 {
        self.current_time - lag as f64 / self.sample_rate
    }
}
