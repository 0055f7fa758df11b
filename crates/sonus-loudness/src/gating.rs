//! Block gating and integration (BS.1770-5 §2.8, EBU Tech 3342).

use sonus_core::db::power_mean_lufs;

/// Blocks at or below this level never contribute to integrated loudness.
pub const ABSOLUTE_GATE_LUFS: f64 = -70.0;

/// Relative gate offset from the absolute-gated mean.
pub const RELATIVE_GATE_LU: f64 = -10.0;

/// Lower and upper percentiles used for loudness range.
pub const LRA_LOW_PERCENTILE: f64 = 0.10;
pub const LRA_HIGH_PERCENTILE: f64 = 0.95;

/// One 400 ms gating block.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LoudnessBlock {
    /// Block loudness in LUFS; `-inf` for a silent block.
    pub loudness: f64,
    /// Absolute index of the first sample in the block.
    pub sample_index: u64,
}

/// Result of two-stage gated integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatedIntegration {
    pub loudness: f64,
    /// `-inf` when no block survives the absolute gate.
    pub relative_threshold: f64,
    pub absolute_survivors: usize,
    pub relative_survivors: usize,
}

impl Default for GatedIntegration {
    fn default() -> Self {
        Self {
            loudness: f64::NEG_INFINITY,
            relative_threshold: f64::NEG_INFINITY,
            absolute_survivors: 0,
            relative_survivors: 0,
        }
    }
}

pub fn integrate_gated(blocks: &[LoudnessBlock]) -> GatedIntegration {
    let above_absolute = || {
        blocks
            .iter()
            .map(|b| b.loudness)
            .filter(|&l| l > ABSOLUTE_GATE_LUFS)
    };

    let absolute_survivors = above_absolute().count();
    if absolute_survivors == 0 {
        return GatedIntegration::default();
    }

    let relative_threshold = power_mean_lufs(above_absolute()) + RELATIVE_GATE_LU;
    let above_relative = || above_absolute().filter(move |&l| l > relative_threshold);

    GatedIntegration {
        loudness: power_mean_lufs(above_relative()),
        relative_threshold,
        absolute_survivors,
        relative_survivors: above_relative().count(),
    }
}

/// Power mean of every block. Silent blocks pull the mean down.
pub fn integrate_ungated(blocks: &[LoudnessBlock]) -> f64 {
    power_mean_lufs(blocks.iter().map(|b| b.loudness))
}

/// Loudness range in LU from a series of short-term values.
///
/// Only finite values above the absolute gate are considered. Returns 0.0
/// when nothing qualifies.
pub fn loudness_range(short_term: &[f64]) -> f64 {
    let mut values: Vec<f64> = short_term
        .iter()
        .copied()
        .filter(|l| l.is_finite() && *l > ABSOLUTE_GATE_LUFS)
        .collect();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    percentile(&values, LRA_HIGH_PERCENTILE) - percentile(&values, LRA_LOW_PERCENTILE)
}

/// Linear interpolation between closest ranks. `sorted` must be non-empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
