//! Tolerance constants for measurement tests.
//!
//! Different operations require different precision levels.

/// Floating point rounding errors (exact gains, window symmetry).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Transform round trips in single precision.
pub const DSP_EPSILON: f32 = 1e-4;

/// Silence threshold (~-80dB).
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// Loudness agreement against a reference value, in LU.
pub const LU_TOLERANCE: f64 = 0.1;

/// Batch versus streaming agreement, in LU.
pub const PARITY_LU_TOLERANCE: f64 = 1.0;

/// Filter calibration against published response values, in dB.
pub const RESPONSE_DB_TOLERANCE: f64 = 0.05;

/// Minimum STFT reconstruction SNR, in dB.
pub const MIN_RECONSTRUCTION_SNR_DB: f64 = 50.0;
