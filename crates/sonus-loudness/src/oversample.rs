//! General-purpose oversampling for peak display.
//!
//! Not BS.1770 compliant; the loudness path uses
//! [`TruePeakEstimator`](crate::TruePeakEstimator) instead.

use core::f64::consts::PI;
use sonus_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Interpolation {
    Linear,
    /// Catmull-Rom spline through the four nearest samples.
    Cubic,
    /// Hann-windowed sinc using `half_taps` samples on each side.
    #[default]
    Sinc,
}

/// Taps on each side of the windowed-sinc kernel.
const SINC_HALF_TAPS: isize = 8;

#[derive(Debug, Clone, Copy)]
pub struct Oversampler {
    factor: usize,
    interpolation: Interpolation,
}

impl Oversampler {
    pub fn new(factor: u32, interpolation: Interpolation) -> Result<Self> {
        if !matches!(factor, 2 | 4 | 8) {
            return Err(Error::invalid(format!(
                "oversampling factor must be 2, 4 or 8, got {factor}"
            )));
        }
        Ok(Self {
            factor: factor as usize,
            interpolation,
        })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// `samples.len() * factor` points; every `factor`-th point is an input sample.
    pub fn oversample(&self, samples: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(samples.len() * self.factor);
        for i in 0..samples.len() {
            for p in 0..self.factor {
                out.push(self.interpolate(samples, i, p as f64 / self.factor as f64));
            }
        }
        out
    }

    /// Peak of the oversampled signal without materializing it. Never below
    /// the sample peak.
    pub fn peak(&self, samples: &[f32]) -> f32 {
        let mut peak = 0.0f32;
        for i in 0..samples.len() {
            peak = peak.max(samples[i].abs());
            for p in 1..self.factor {
                let y = self.interpolate(samples, i, p as f64 / self.factor as f64);
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    /// Value at fractional position `i + frac`.
    fn interpolate(&self, x: &[f32], i: usize, frac: f64) -> f32 {
        if frac == 0.0 {
            return x[i];
        }
        let i = i as isize;
        match self.interpolation {
            Interpolation::Linear => {
                let a = clamped(x, i);
                let b = clamped(x, i + 1);
                (a + (b - a) * frac) as f32
            }
            Interpolation::Cubic => {
                let p0 = clamped(x, i - 1);
                let p1 = clamped(x, i);
                let p2 = clamped(x, i + 1);
                let p3 = clamped(x, i + 2);
                let t = frac;
                let t2 = t * t;
                let t3 = t2 * t;
                (0.5 * (2.0 * p1
                    + (-p0 + p2) * t
                    + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
                    + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)) as f32
            }
            Interpolation::Sinc => {
                let mut acc = 0.0;
                for k in (1 - SINC_HALF_TAPS)..=SINC_HALF_TAPS {
                    let n = i + k;
                    if n < 0 || n as usize >= x.len() {
                        continue;
                    }
                    let t = frac - k as f64;
                    acc += x[n as usize] as f64 * windowed_sinc(t);
                }
                acc as f32
            }
        }
    }
}

/// Sample `i`, holding the first/last sample beyond the edges.
fn clamped(x: &[f32], i: isize) -> f64 {
    let last = x.len() as isize - 1;
    x[i.clamp(0, last) as usize] as f64
}

fn windowed_sinc(t: f64) -> f64 {
    let half = SINC_HALF_TAPS as f64;
    if t.abs() >= half {
        return 0.0;
    }
    let sinc = if t == 0.0 {
        1.0
    } else {
        (PI * t).sin() / (PI * t)
    };
    let window = 0.5 * (1.0 + (PI * t / half).cos());
    sinc * window
}
