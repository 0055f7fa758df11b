//! Shared test helpers for sonus integration tests.
//!
//! Provides signal generators and measurement helpers so each test file
//! doesn't have to re-derive them.

#![allow(dead_code)]

pub mod tolerances;

pub use tolerances::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

/// Standard test sample rate.
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Generate a sine wave of `amplitude` at `freq` Hz.
pub fn generate_sine(freq: f32, amplitude: f32, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    let sr = sample_rate as f32;
    (0..num_samples)
        .map(|n| amplitude * (2.0 * PI * freq * n as f32 / sr).sin())
        .collect()
}

/// Sum of sines, one `(freq, amplitude)` pair per partial.
pub fn multi_tone(partials: &[(f32, f32)], sample_rate: f64, num_samples: usize) -> Vec<f32> {
    let mut out = vec![0.0; num_samples];
    for &(freq, amplitude) in partials {
        for (o, s) in out
            .iter_mut()
            .zip(generate_sine(freq, amplitude, sample_rate, num_samples))
        {
            *o += s;
        }
    }
    out
}

pub fn generate_silence(num_samples: usize) -> Vec<f32> {
    vec![0.0; num_samples]
}

/// Uniform white noise in [-1, 1), reproducible per seed.
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_samples).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

pub fn generate_impulse(num_samples: usize, position: usize) -> Vec<f32> {
    let mut samples = vec![0.0; num_samples];
    if position < num_samples {
        samples[position] = 1.0;
    }
    samples
}

/// Calculate peak amplitude of a signal.
pub fn sample_peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |a, s| a.max(s.abs()))
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Signal-to-noise ratio of `actual` against `reference` over `range`, in dB.
pub fn snr_db(reference: &[f32], actual: &[f32], range: std::ops::Range<usize>) -> f64 {
    let (mut signal, mut noise) = (0.0f64, 0.0f64);
    for i in range {
        let r = reference[i] as f64;
        let e = r - actual[i] as f64;
        signal += r * r;
        noise += e * e;
    }
    if noise == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (signal / noise).log10()
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = sample_peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}
