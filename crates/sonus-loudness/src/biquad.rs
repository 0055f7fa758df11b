//! Second-order IIR section (direct form I) with carried state.

use core::f64::consts::PI;

/// Normalized coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Linear magnitude response at `freq` Hz.
    pub fn magnitude(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = self.b1 * s1 + self.b2 * s2;
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = self.a1 * s1 + self.a2 * s2;

        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }

    /// Magnitude response in dB.
    pub fn response_db(&self, freq: f64, sample_rate: f64) -> f64 {
        20.0 * self.magnitude(freq, sample_rate).log10()
    }

    /// Scale the feed-forward path by a linear gain.
    pub fn with_gain(self, gain: f64) -> Self {
        Self {
            b0: self.b0 * gain,
            b1: self.b1 * gain,
            b2: self.b2 * gain,
            ..self
        }
    }
}

/// `x[n-1], x[n-2], y[n-1], y[n-2]` of one section.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

#[derive(Debug, Clone)]
pub struct Biquad {
    coefficients: BiquadCoefficients,
    state: BiquadState,
}

impl Biquad {
    pub fn new(coefficients: BiquadCoefficients) -> Self {
        Self {
            coefficients,
            state: BiquadState::default(),
        }
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let c = &self.coefficients;
        let s = &mut self.state;
        let y = c.b0 * x + c.b1 * s.x1 + c.b2 * s.x2 - c.a1 * s.y1 - c.a2 * s.y2;
        s.x2 = s.x1;
        s.x1 = x;
        s.y2 = s.y1;
        s.y1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.state = BiquadState::default();
    }

    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coefficients
    }

    pub fn state(&self) -> &BiquadState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const PASSTHROUGH: BiquadCoefficients = BiquadCoefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    #[test]
    fn test_passthrough() {
        let mut bq = Biquad::new(PASSTHROUGH);
        for x in [0.5, -0.25, 1.0] {
            assert_eq!(bq.process(x), x);
        }
        assert_abs_diff_eq!(PASSTHROUGH.response_db(1000.0, 48000.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_state_carries_and_resets() {
        let coeffs = BiquadCoefficients {
            b0: 0.5,
            b1: 0.5,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        };
        let mut bq = Biquad::new(coeffs);
        assert_eq!(bq.process(1.0), 0.5);
        assert_eq!(bq.process(0.0), 0.5);
        assert_eq!(bq.state().x2, 1.0);
        bq.reset();
        assert_eq!(*bq.state(), BiquadState::default());
        assert_eq!(bq.process(0.0), 0.0);
    }

    #[test]
    fn test_with_gain() {
        let doubled = PASSTHROUGH.with_gain(2.0);
        assert_abs_diff_eq!(doubled.response_db(440.0, 48000.0), 6.0206, epsilon = 1e-3);
    }
}
