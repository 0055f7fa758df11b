//! ITU-R BS.1770-5 loudness and true-peak metering.
//!
//! - [`LoudnessMeter`]: streaming K-weighted meter (momentary, short-term,
//!   integrated)
//! - [`analyze_loudness`]: whole-source analysis built on the same meter
//! - [`TruePeakEstimator`] / [`true_peak`]: Annex 2 polyphase true peak
//! - [`Oversampler`]: general interpolating oversampler for display
//!
//! ```
//! use sonus_loudness::{LoudnessMeter, RealtimeLoudnessOptions};
//!
//! let mut meter = LoudnessMeter::new(48000.0, 1, RealtimeLoudnessOptions::default()).unwrap();
//! let reading = meter.process_mono(&vec![0.0; 48000]).unwrap();
//! assert_eq!(reading.integrated, f64::NEG_INFINITY);
//! ```

pub mod batch;
pub mod biquad;
pub mod gating;
pub mod kweighting;
pub mod meter;
pub mod oversample;
pub mod true_peak;

pub use batch::{
    analyze_loudness, LoudnessOptions, LoudnessReport, LoudnessStatistics, TruePeakReport,
};
pub use biquad::{Biquad, BiquadCoefficients, BiquadState};
pub use gating::{
    integrate_gated, integrate_ungated, loudness_range, GatedIntegration, LoudnessBlock,
    ABSOLUTE_GATE_LUFS, RELATIVE_GATE_LU,
};
pub use kweighting::{k_weighting_coefficients, KWeighting};
pub use meter::{LoudnessMeter, LoudnessReading, RealtimeLoudnessOptions};
pub use oversample::{Interpolation, Oversampler};
pub use true_peak::{true_peak, TruePeakEstimator, TruePeakMethod, TruePeakOptions};
