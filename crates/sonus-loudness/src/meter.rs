//! Streaming K-weighted loudness meter.
//!
//! Filtered energy is accumulated into 100 ms segments; every completed
//! segment closes a 400 ms block made of the last four. Blocks are kept in a
//! bounded, time-ordered history from which momentary, short-term and
//! integrated loudness are derived.

use crate::gating::{integrate_gated, integrate_ungated, GatedIntegration, LoudnessBlock};
use crate::kweighting::KWeighting;
use smallvec::SmallVec;
use sonus_core::db::{power_mean_lufs, power_to_lufs};
use sonus_core::{Error, Result};
use std::collections::VecDeque;

/// Channels beyond this count are ignored.
pub const MAX_LOUDNESS_CHANNELS: usize = 2;

/// Hops per 400 ms block.
const SEGMENTS_PER_BLOCK: usize = 4;
/// Hops per 3 s short-term window.
const SHORT_TERM_SEGMENTS: usize = 30;
const HOP_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct RealtimeLoudnessOptions {
    /// Length of block history kept for integration.
    pub max_duration_ms: u64,
    /// Apply BS.1770 gating to the integrated value.
    pub gated: bool,
}

impl Default for RealtimeLoudnessOptions {
    fn default() -> Self {
        Self {
            max_duration_ms: 600_000,
            gated: true,
        }
    }
}

impl RealtimeLoudnessOptions {
    pub fn with_max_duration_ms(mut self, ms: u64) -> Self {
        self.max_duration_ms = ms;
        self
    }

    pub fn with_gating(mut self, gated: bool) -> Self {
        self.gated = gated;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_duration_ms < 400 {
            return Err(Error::invalid(format!(
                "max_duration_ms must cover one 400 ms block, got {}",
                self.max_duration_ms
            )));
        }
        Ok(())
    }

    fn max_blocks(&self) -> usize {
        (self.max_duration_ms.div_ceil(100) as usize).max(1)
    }
}

/// Loudness values in LUFS. `-inf` until enough audio has been seen.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LoudnessReading {
    pub integrated: f64,
    pub momentary: f64,
    pub short_term: f64,
}

impl Default for LoudnessReading {
    fn default() -> Self {
        Self {
            integrated: f64::NEG_INFINITY,
            momentary: f64::NEG_INFINITY,
            short_term: f64::NEG_INFINITY,
        }
    }
}

/// Incremental BS.1770 meter for mono or stereo input.
///
/// All storage is sized at construction; `process` does not allocate.
#[derive(Debug, Clone)]
pub struct LoudnessMeter {
    sample_rate: f64,
    options: RealtimeLoudnessOptions,
    filters: SmallVec<[KWeighting; MAX_LOUDNESS_CHANNELS]>,
    hop: usize,

    segment_energy: f64,
    segment_fill: usize,
    segments: [f64; SEGMENTS_PER_BLOCK],
    segments_completed: u64,

    history: VecDeque<LoudnessBlock>,
    max_blocks: usize,
    gating: GatedIntegration,
    reading: LoudnessReading,
    max_momentary: f64,
    max_short_term: f64,
}

impl LoudnessMeter {
    pub fn new(sample_rate: f64, channels: usize, options: RealtimeLoudnessOptions) -> Result<Self> {
        options.validate()?;
        if channels == 0 {
            return Err(Error::invalid("loudness meter needs at least one channel"));
        }
        if channels > MAX_LOUDNESS_CHANNELS {
            tracing::warn!(
                channels,
                "loudness meter only weights the first {MAX_LOUDNESS_CHANNELS} channels"
            );
        }
        let hop = (sample_rate * HOP_SECONDS).round() as usize;
        if hop == 0 {
            return Err(Error::invalid(format!(
                "sample rate {sample_rate} Hz is too low to form a 400 ms block"
            )));
        }

        let filters = (0..channels.min(MAX_LOUDNESS_CHANNELS))
            .map(|_| KWeighting::new(sample_rate))
            .collect::<Result<SmallVec<_>>>()?;

        let max_blocks = options.max_blocks();
        tracing::debug!(sample_rate, channels, hop, max_blocks, "loudness meter created");

        Ok(Self {
            sample_rate,
            options,
            filters,
            hop,
            segment_energy: 0.0,
            segment_fill: 0,
            segments: [0.0; SEGMENTS_PER_BLOCK],
            segments_completed: 0,
            history: VecDeque::with_capacity(max_blocks),
            max_blocks,
            gating: GatedIntegration::default(),
            reading: LoudnessReading::default(),
            max_momentary: f64::NEG_INFINITY,
            max_short_term: f64::NEG_INFINITY,
        })
    }

    /// Feed one chunk of planar audio. Every processed channel must have the
    /// same length; channels beyond the first two are ignored.
    pub fn process(&mut self, channels: &[&[f32]]) -> Result<LoudnessReading> {
        let used = self.filters.len();
        if channels.len() < used {
            return Err(Error::invalid(format!(
                "expected {used} channel(s), got {}",
                channels.len()
            )));
        }
        let len = channels.first().map_or(0, |c| c.len());
        if channels[..used].iter().any(|c| c.len() != len) {
            return Err(Error::invalid("channel lengths differ within a chunk"));
        }

        Ok(self.accumulate(channels, len))
    }

    /// Like [`process`](Self::process), but missing or short channels read
    /// as silence. The chunk length is taken from the first channel.
    pub fn process_padded(&mut self, channels: &[&[f32]]) -> LoudnessReading {
        let len = channels.first().map_or(0, |c| c.len());
        self.accumulate(channels, len)
    }

    fn accumulate(&mut self, channels: &[&[f32]], len: usize) -> LoudnessReading {
        let mut pos = 0;
        let mut new_blocks = false;
        while pos < len {
            let take = (self.hop - self.segment_fill).min(len - pos);
            for (ch, filter) in self.filters.iter_mut().enumerate() {
                let src = channels.get(ch).copied().unwrap_or(&[]);
                let end = (pos + take).min(src.len());
                let present = &src[pos.min(end)..end];
                self.segment_energy += filter.process_energy(present);
                for _ in present.len()..take {
                    let y = filter.process(0.0);
                    self.segment_energy += y * y;
                }
            }
            self.segment_fill += take;
            pos += take;

            if self.segment_fill == self.hop {
                new_blocks |= self.complete_segment();
            }
        }

        if new_blocks {
            self.update_reading();
        }
        self.reading
    }

    pub fn process_mono(&mut self, samples: &[f32]) -> Result<LoudnessReading> {
        self.process(&[samples])
    }

    /// Close the current 100 ms segment. Returns true when it completed a block.
    fn complete_segment(&mut self) -> bool {
        let slot = (self.segments_completed % SEGMENTS_PER_BLOCK as u64) as usize;
        self.segments[slot] = self.segment_energy;
        self.segment_energy = 0.0;
        self.segment_fill = 0;
        self.segments_completed += 1;

        if self.segments_completed < SEGMENTS_PER_BLOCK as u64 {
            return false;
        }

        let mean_square = self.segments.iter().sum::<f64>() / self.buffer_size() as f64;
        let start_segment = self.segments_completed - SEGMENTS_PER_BLOCK as u64;
        let block = LoudnessBlock {
            loudness: power_to_lufs(mean_square),
            sample_index: start_segment * self.hop as u64,
        };
        if self.history.len() == self.max_blocks {
            self.history.pop_front();
        }
        self.history.push_back(block);
        true
    }

    fn update_reading(&mut self) {
        let Some(latest) = self.history.back() else {
            return;
        };
        let latest_end = latest.sample_index + self.buffer_size() as u64;
        let momentary = self.trailing_mean(latest_end, SEGMENTS_PER_BLOCK);
        let short_term = self.trailing_mean(latest_end, SHORT_TERM_SEGMENTS);

        let blocks = self.history.make_contiguous();
        let integrated = if self.options.gated {
            self.gating = integrate_gated(blocks);
            self.gating.loudness
        } else {
            integrate_ungated(blocks)
        };

        self.max_momentary = self.max_momentary.max(momentary);
        self.max_short_term = self.max_short_term.max(short_term);
        self.reading = LoudnessReading {
            integrated,
            momentary,
            short_term,
        };
    }

    /// Power mean of the blocks lying entirely within the last
    /// `segments` hops before `end`.
    fn trailing_mean(&self, end: u64, segments: usize) -> f64 {
        let window = (segments * self.hop) as u64;
        power_mean_lufs(
            self.history
                .iter()
                .rev()
                .take_while(|b| b.sample_index + window >= end)
                .map(|b| b.loudness),
        )
    }

    pub fn reading(&self) -> LoudnessReading {
        self.reading
    }

    /// Result of the last gated integration. Default when gating is off.
    pub fn gating(&self) -> GatedIntegration {
        self.gating
    }

    pub fn max_momentary(&self) -> f64 {
        self.max_momentary
    }

    pub fn max_short_term(&self) -> f64 {
        self.max_short_term
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
        self.segment_energy = 0.0;
        self.segment_fill = 0;
        self.segments = [0.0; SEGMENTS_PER_BLOCK];
        self.segments_completed = 0;
        self.history.clear();
        self.gating = GatedIntegration::default();
        self.reading = LoudnessReading::default();
        self.max_momentary = f64::NEG_INFINITY;
        self.max_short_term = f64::NEG_INFINITY;
    }

    /// Samples per channel in one 400 ms gating block.
    pub fn buffer_size(&self) -> usize {
        self.hop * SEGMENTS_PER_BLOCK
    }

    pub fn hop_size(&self) -> usize {
        self.hop
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.filters.len()
    }

    pub fn options(&self) -> &RealtimeLoudnessOptions {
        &self.options
    }

    /// Retained blocks, oldest first.
    pub fn blocks(&self) -> impl Iterator<Item = &LoudnessBlock> + '_ {
        self.history.iter()
    }

    pub fn block_count(&self) -> usize {
        self.history.len()
    }
}
