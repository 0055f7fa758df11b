//! One-shot loudness analysis of a whole source.
//!
//! Drives the streaming [`LoudnessMeter`] over consecutive 100 ms chunks and
//! reads its final state, so batch and streaming results agree.

use crate::gating::{integrate_gated, loudness_range, LoudnessBlock};
use crate::meter::{LoudnessMeter, RealtimeLoudnessOptions};
use crate::true_peak::{true_peak, TruePeakOptions};
use sonus_core::{AudioSource, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct LoudnessOptions {
    pub gated: bool,
    pub short_term: bool,
    pub momentary: bool,
    pub loudness_range: bool,
    pub true_peak: bool,
    pub statistics: bool,
    /// Polyphase factor for the true-peak report: 2 or 4.
    pub true_peak_oversampling: u32,
}

impl Default for LoudnessOptions {
    fn default() -> Self {
        Self {
            gated: true,
            short_term: true,
            momentary: true,
            loudness_range: false,
            true_peak: false,
            statistics: false,
            true_peak_oversampling: 4,
        }
    }
}

impl LoudnessOptions {
    /// Everything on.
    pub fn full() -> Self {
        Self {
            loudness_range: true,
            true_peak: true,
            statistics: true,
            ..Self::default()
        }
    }

    pub fn with_gating(mut self, gated: bool) -> Self {
        self.gated = gated;
        self
    }

    pub fn with_loudness_range(mut self, enabled: bool) -> Self {
        self.loudness_range = enabled;
        self
    }

    pub fn with_true_peak(mut self, enabled: bool) -> Self {
        self.true_peak = enabled;
        self
    }

    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.statistics = enabled;
        self
    }

    pub fn with_true_peak_oversampling(mut self, factor: u32) -> Self {
        self.true_peak_oversampling = factor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.true_peak && !matches!(self.true_peak_oversampling, 2 | 4) {
            return Err(Error::invalid(format!(
                "true_peak_oversampling must be 2 or 4, got {}",
                self.true_peak_oversampling
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TruePeakReport {
    /// Linear peak per channel, in source channel order.
    pub per_channel: Vec<f32>,
    pub max: f32,
}

impl TruePeakReport {
    /// Maximum in dBTP; `-inf` for silence.
    pub fn max_dbtp(&self) -> f64 {
        sonus_core::db::linear_to_db(self.max as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LoudnessStatistics {
    pub block_count: usize,
    /// Blocks above the absolute gate.
    pub absolute_gated_blocks: usize,
    /// Blocks above both gates.
    pub relative_gated_blocks: usize,
    pub relative_threshold: f64,
    pub max_momentary: f64,
    pub max_short_term: f64,
    /// Seconds of audio analyzed.
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LoudnessReport {
    pub integrated: f64,
    pub short_term: Option<f64>,
    pub momentary: Option<f64>,
    pub loudness_range: Option<f64>,
    pub true_peak: Option<TruePeakReport>,
    pub statistics: Option<LoudnessStatistics>,
}

pub fn analyze_loudness<S>(source: &S, options: &LoudnessOptions) -> Result<LoudnessReport>
where
    S: AudioSource + ?Sized,
{
    options.validate()?;
    let sample_rate = source.sample_rate();
    let channels = source.channel_data();
    let length = source.length();
    let duration = source.duration();

    // Keep every block of the source.
    let meter_options = RealtimeLoudnessOptions::default()
        .with_gating(options.gated)
        .with_max_duration_ms(((duration * 1000.0).ceil() as u64).max(400) + 100);
    let mut meter = LoudnessMeter::new(sample_rate, channels.len(), meter_options)?;

    let hop = meter.hop_size();
    let mut short_term_series = Vec::new();
    let mut reading = meter.reading();
    let mut seen_blocks = 0;
    let mut start = 0;
    while start < length {
        let end = (start + hop).min(length);
        let chunk: Vec<&[f32]> = channels
            .iter()
            .take(meter.channels())
            .map(|c| &c[start..end])
            .collect();
        reading = meter.process(&chunk)?;
        if meter.block_count() > seen_blocks {
            seen_blocks = meter.block_count();
            short_term_series.push(reading.short_term);
        }
        start = end;
    }

    tracing::debug!(
        sample_rate,
        length,
        blocks = meter.block_count(),
        integrated = reading.integrated,
        "loudness analysis finished"
    );

    let true_peak = if options.true_peak {
        let peak_options = TruePeakOptions::polyphase(options.true_peak_oversampling);
        let per_channel = channels
            .iter()
            .map(|c| true_peak(&c[..length], &peak_options))
            .collect::<Result<Vec<f32>>>()?;
        let max = per_channel.iter().copied().fold(0.0f32, f32::max);
        Some(TruePeakReport { per_channel, max })
    } else {
        None
    };

    let statistics = options.statistics.then(|| {
        let blocks: Vec<LoudnessBlock> = meter.blocks().copied().collect();
        let gating = integrate_gated(&blocks);
        LoudnessStatistics {
            block_count: blocks.len(),
            absolute_gated_blocks: gating.absolute_survivors,
            relative_gated_blocks: gating.relative_survivors,
            relative_threshold: gating.relative_threshold,
            max_momentary: meter.max_momentary(),
            max_short_term: meter.max_short_term(),
            duration,
        }
    });

    Ok(LoudnessReport {
        integrated: reading.integrated,
        short_term: options.short_term.then_some(reading.short_term),
        momentary: options.momentary.then_some(reading.momentary),
        loudness_range: options
            .loudness_range
            .then(|| loudness_range(&short_term_series)),
        true_peak,
        statistics,
    })
}
