//! K-weighting pre-filter (ITU-R BS.1770-5, Annex 1).
//!
//! Two cascaded biquads: a high-frequency shelf (+4 dB) followed by a
//! high-pass (RLB weighting). At 48 kHz the published coefficients are used
//! verbatim. At other rates the analog prototype is re-derived through the
//! bilinear transform and the cascade is rescaled so 997 Hz reads 0 dB.

use crate::biquad::{Biquad, BiquadCoefficients};
use sonus_core::{Error, Result};

/// Rate at which the reference coefficients are defined.
pub const REFERENCE_SAMPLE_RATE: f64 = 48000.0;

/// Frequency pinned to 0 dB for non-reference rates.
pub const CALIBRATION_FREQUENCY: f64 = 997.0;

/// Stage 1 (shelf) at 48 kHz.
pub const SHELF_48K: BiquadCoefficients = BiquadCoefficients {
    b0: 1.535_124_859_586_97,
    b1: -2.691_696_189_406_38,
    b2: 1.198_392_810_852_85,
    a1: -1.690_659_293_182_41,
    a2: 0.732_480_774_215_85,
};

/// Stage 2 (high-pass) at 48 kHz.
pub const HIGHPASS_48K: BiquadCoefficients = BiquadCoefficients {
    b0: 1.0,
    b1: -2.0,
    b2: 1.0,
    a1: -1.990_047_454_833_98,
    a2: 0.990_072_250_366_21,
};

// Analog prototype of the shelf.
const SHELF_F0: f64 = 1_681.974_450_955_533;
const SHELF_GAIN_DB: f64 = 3.999_843_853_973_347;
const SHELF_Q: f64 = 0.707_175_236_955_419_6;
const SHELF_VB_EXPONENT: f64 = 0.499_666_774_154_541_6;

// Analog prototype of the high-pass.
const HIGHPASS_F0: f64 = 38.135_470_876_024_44;
const HIGHPASS_Q: f64 = 0.500_327_037_323_877_3;

/// Lowest rate for which the shelf prototype stays below Nyquist.
pub fn min_sample_rate() -> f64 {
    2.0 * SHELF_F0
}

fn is_reference_rate(sample_rate: f64) -> bool {
    (sample_rate - REFERENCE_SAMPLE_RATE).abs() < 1e-6
}

fn design_shelf(sample_rate: f64) -> BiquadCoefficients {
    let k = (core::f64::consts::PI * SHELF_F0 / sample_rate).tan();
    let vh = 10f64.powf(SHELF_GAIN_DB / 20.0);
    let vb = vh.powf(SHELF_VB_EXPONENT);
    let a0 = 1.0 + k / SHELF_Q + k * k;
    BiquadCoefficients {
        b0: (vh + vb * k / SHELF_Q + k * k) / a0,
        b1: 2.0 * (k * k - vh) / a0,
        b2: (vh - vb * k / SHELF_Q + k * k) / a0,
        a1: 2.0 * (k * k - 1.0) / a0,
        a2: (1.0 - k / SHELF_Q + k * k) / a0,
    }
}

fn design_highpass(sample_rate: f64) -> BiquadCoefficients {
    let k = (core::f64::consts::PI * HIGHPASS_F0 / sample_rate).tan();
    let a0 = 1.0 + k / HIGHPASS_Q + k * k;
    BiquadCoefficients {
        b0: 1.0,
        b1: -2.0,
        b2: 1.0,
        a1: 2.0 * (k * k - 1.0) / a0,
        a2: (1.0 - k / HIGHPASS_Q + k * k) / a0,
    }
}

/// `(shelf, highpass)` coefficients for `sample_rate`.
pub fn k_weighting_coefficients(
    sample_rate: f64,
) -> Result<(BiquadCoefficients, BiquadCoefficients)> {
    if !(sample_rate.is_finite() && sample_rate > min_sample_rate()) {
        return Err(Error::invalid(format!(
            "sample rate {sample_rate} Hz is too low for K-weighting (needs > {:.0} Hz)",
            min_sample_rate()
        )));
    }
    if is_reference_rate(sample_rate) {
        return Ok((SHELF_48K, HIGHPASS_48K));
    }

    let shelf = design_shelf(sample_rate);
    let highpass = design_highpass(sample_rate);
    let gain = shelf.magnitude(CALIBRATION_FREQUENCY, sample_rate)
        * highpass.magnitude(CALIBRATION_FREQUENCY, sample_rate);
    Ok((shelf.with_gain(1.0 / gain), highpass))
}

/// One channel's K-weighting cascade. State carries across calls.
#[derive(Debug, Clone)]
pub struct KWeighting {
    sample_rate: f64,
    shelf: Biquad,
    highpass: Biquad,
}

impl KWeighting {
    pub fn new(sample_rate: f64) -> Result<Self> {
        let (shelf, highpass) = k_weighting_coefficients(sample_rate)?;
        Ok(Self {
            sample_rate,
            shelf: Biquad::new(shelf),
            highpass: Biquad::new(highpass),
        })
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f64 {
        self.highpass.process(self.shelf.process(x as f64))
    }

    /// Filter `input` and return the sum of squared outputs.
    pub fn process_energy(&mut self, input: &[f32]) -> f64 {
        input
            .iter()
            .map(|&x| {
                let y = self.process(x);
                y * y
            })
            .sum()
    }

    pub fn reset(&mut self) {
        self.shelf.reset();
        self.highpass.reset();
    }

    /// Cascade magnitude response in dB.
    pub fn response_db(&self, freq: f64) -> f64 {
        self.shelf
            .coefficients()
            .response_db(freq, self.sample_rate)
            + self
                .highpass
                .coefficients()
                .response_db(freq, self.sample_rate)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
