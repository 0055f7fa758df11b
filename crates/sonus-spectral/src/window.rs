//! Window functions.
//!
//! All windows are symmetric (`w[0] == w[N-1]`) and computed in f64 before
//! being stored as f32.

use core::f64::consts::PI;
use core::fmt;
use core::str::FromStr;
use sonus_core::{Error, Result};

/// Default Kaiser shape parameter when parsed from a bare name.
pub const DEFAULT_KAISER_BETA: f32 = 8.6;

/// Default Tukey taper fraction when parsed from a bare name.
pub const DEFAULT_TUKEY_ALPHA: f32 = 0.5;

/// Window type and its shape parameter, if any.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum WindowType {
    Rectangular,
    #[default]
    Hann,
    Hamming,
    Blackman,
    Bartlett,
    Kaiser {
        beta: f32,
    },
    Tukey {
        alpha: f32,
    },
}

impl WindowType {
    pub fn name(&self) -> &'static str {
        match self {
            WindowType::Rectangular => "rectangular",
            WindowType::Hann => "hann",
            WindowType::Hamming => "hamming",
            WindowType::Blackman => "blackman",
            WindowType::Bartlett => "bartlett",
            WindowType::Kaiser { .. } => "kaiser",
            WindowType::Tukey { .. } => "tukey",
        }
    }

    /// Shape parameter, 0 for windows without one.
    pub fn parameter(&self) -> f32 {
        match *self {
            WindowType::Kaiser { beta } => beta,
            WindowType::Tukey { alpha } => alpha,
            _ => 0.0,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            WindowType::Kaiser { beta } if !(beta.is_finite() && beta >= 0.0) => Err(
                Error::invalid(format!("kaiser beta must be finite and >= 0, got {beta}")),
            ),
            WindowType::Tukey { alpha } if !(0.0..=1.0).contains(&alpha) => Err(Error::invalid(
                format!("tukey alpha must be within [0, 1], got {alpha}"),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rectangular" | "rect" | "boxcar" => Ok(WindowType::Rectangular),
            "hann" | "hanning" => Ok(WindowType::Hann),
            "hamming" => Ok(WindowType::Hamming),
            "blackman" => Ok(WindowType::Blackman),
            "bartlett" | "triangular" => Ok(WindowType::Bartlett),
            "kaiser" => Ok(WindowType::Kaiser {
                beta: DEFAULT_KAISER_BETA,
            }),
            "tukey" => Ok(WindowType::Tukey {
                alpha: DEFAULT_TUKEY_ALPHA,
            }),
            other => Err(Error::invalid(format!("unknown window type '{other}'"))),
        }
    }
}

/// Generate `size` coefficients of `window`.
pub fn generate_window(window: WindowType, size: usize) -> Result<Vec<f32>> {
    if size == 0 {
        return Err(Error::invalid("window size must be at least 1"));
    }
    window.validate()?;
    if size == 1 {
        return Ok(vec![1.0]);
    }

    let m = (size - 1) as f64;
    let coefficient = |i: usize| -> f64 {
        let x = i as f64 / m;
        match window {
            WindowType::Rectangular => 1.0,
            WindowType::Hann => 0.5 - 0.5 * (2.0 * PI * x).cos(),
            WindowType::Hamming => 0.54 - 0.46 * (2.0 * PI * x).cos(),
            WindowType::Blackman => {
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            }
            WindowType::Bartlett => 1.0 - (2.0 * x - 1.0).abs(),
            WindowType::Kaiser { beta } => {
                let beta = beta as f64;
                let r = 2.0 * x - 1.0;
                bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / bessel_i0(beta)
            }
            WindowType::Tukey { alpha } => tukey(x, alpha as f64),
        }
    };

    Ok((0..size).map(|i| coefficient(i) as f32).collect())
}

fn tukey(x: f64, alpha: f64) -> f64 {
    if alpha <= 0.0 {
        return 1.0;
    }
    let edge = alpha / 2.0;
    if x < edge {
        0.5 * (1.0 + (2.0 * PI / alpha * (x - edge)).cos())
    } else if x > 1.0 - edge {
        0.5 * (1.0 + (2.0 * PI / alpha * (x - 1.0 + edge)).cos())
    } else {
        1.0
    }
}

/// Zeroth-order modified Bessel function of the first kind (power series).
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = 1.0;
    loop {
        term *= (half / k) * (half / k);
        sum += term;
        if term < sum * 1e-16 {
            break;
        }
        k += 1.0;
    }
    sum
}
