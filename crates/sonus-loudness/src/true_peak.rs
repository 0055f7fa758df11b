//! True-peak estimation (ITU-R BS.1770-5, Annex 2).
//!
//! A 48-tap interpolation filter split into four 12-tap phases runs over a
//! circular delay line. Only the running maximum of the oversampled signal
//! is kept. The unfiltered sample peak is tracked alongside so the estimate
//! never drops below `max(|x|)`.

use crate::oversample::{Interpolation, Oversampler};
use sonus_core::{Error, Result};

pub const TAPS_PER_PHASE: usize = 12;

/// Annex 2 reference interpolation filter, one row per phase.
pub const POLYPHASE_COEFFICIENTS: [[f32; TAPS_PER_PHASE]; 4] = [
    [
        0.001_708_984_375_0,
        0.010_986_328_125_0,
        -0.019_653_320_312_5,
        0.033_203_125_000_0,
        -0.059_448_242_187_5,
        0.137_329_101_562_5,
        0.972_167_968_750_0,
        -0.102_294_921_875_0,
        0.047_607_421_875_0,
        -0.026_611_328_125_0,
        0.014_892_578_125_0,
        -0.008_300_781_250_0,
    ],
    [
        -0.029_174_804_687_5,
        0.029_296_875_000_0,
        -0.051_757_812_500_0,
        0.089_111_328_125_0,
        -0.166_503_906_250_0,
        0.465_087_890_625_0,
        0.779_785_156_250_0,
        -0.200_317_382_812_5,
        0.101_562_500_000_0,
        -0.058_227_539_062_5,
        0.033_081_054_687_5,
        -0.018_920_898_437_5,
    ],
    [
        -0.018_920_898_437_5,
        0.033_081_054_687_5,
        -0.058_227_539_062_5,
        0.101_562_500_000_0,
        -0.200_317_382_812_5,
        0.779_785_156_250_0,
        0.465_087_890_625_0,
        -0.166_503_906_250_0,
        0.089_111_328_125_0,
        -0.051_757_812_500_0,
        0.029_296_875_000_0,
        -0.029_174_804_687_5,
    ],
    [
        -0.008_300_781_250_0,
        0.014_892_578_125_0,
        -0.026_611_328_125_0,
        0.047_607_421_875_0,
        -0.102_294_921_875_0,
        0.972_167_968_750_0,
        0.137_329_101_562_5,
        -0.059_448_242_187_5,
        0.033_203_125_000_0,
        -0.019_653_320_312_5,
        0.010_986_328_125_0,
        0.001_708_984_375_0,
    ],
];

const PHASES_4X: &[usize] = &[0, 1, 2, 3];
const PHASES_2X: &[usize] = &[0, 2];

/// How the oversampled signal is reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum TruePeakMethod {
    /// BS.1770 polyphase FIR. Factors 2 and 4.
    #[default]
    Polyphase,
    /// General interpolating oversampler. Factors 2, 4 and 8. Intended for
    /// visualization, not loudness compliance.
    Interpolated(Interpolation),
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TruePeakOptions {
    pub oversampling: u32,
    pub method: TruePeakMethod,
}

impl Default for TruePeakOptions {
    fn default() -> Self {
        Self {
            oversampling: 4,
            method: TruePeakMethod::Polyphase,
        }
    }
}

impl TruePeakOptions {
    pub fn polyphase(oversampling: u32) -> Self {
        Self {
            oversampling,
            method: TruePeakMethod::Polyphase,
        }
    }

    pub fn interpolated(oversampling: u32, interpolation: Interpolation) -> Self {
        Self {
            oversampling,
            method: TruePeakMethod::Interpolated(interpolation),
        }
    }
}

/// Streaming BS.1770 true-peak meter for one channel.
#[derive(Debug, Clone)]
pub struct TruePeakEstimator {
    phases: &'static [usize],
    /// Each sample is written twice, `TAPS_PER_PHASE` apart, so the newest
    /// 12 samples are always one contiguous slice starting at `head`.
    delay: [f32; 2 * TAPS_PER_PHASE],
    head: usize,
    filtered_peak: f32,
    sample_peak: f32,
}

impl TruePeakEstimator {
    pub fn new(oversampling: u32) -> Result<Self> {
        let phases = match oversampling {
            2 => PHASES_2X,
            4 => PHASES_4X,
            other => {
                return Err(Error::invalid(format!(
                    "BS.1770 true-peak oversampling must be 2 or 4, got {other}"
                )))
            }
        };
        Ok(Self {
            phases,
            delay: [0.0; 2 * TAPS_PER_PHASE],
            head: 0,
            filtered_peak: 0.0,
            sample_peak: 0.0,
        })
    }

    pub fn oversampling(&self) -> u32 {
        if self.phases.len() == 4 {
            4
        } else {
            2
        }
    }

    #[inline]
    fn push(&mut self, x: f32) {
        self.head = (self.head + TAPS_PER_PHASE - 1) % TAPS_PER_PHASE;
        self.delay[self.head] = x;
        self.delay[self.head + TAPS_PER_PHASE] = x;

        // taps[k] is x[n - k].
        let taps = &self.delay[self.head..self.head + TAPS_PER_PHASE];
        for &phase in self.phases {
            let y: f32 = POLYPHASE_COEFFICIENTS[phase]
                .iter()
                .zip(taps)
                .map(|(c, v)| c * v)
                .sum();
            self.filtered_peak = self.filtered_peak.max(y.abs());
        }
    }

    /// Feed a chunk and return the running peak.
    pub fn process(&mut self, chunk: &[f32]) -> f32 {
        for &x in chunk {
            self.sample_peak = self.sample_peak.max(x.abs());
            self.push(x);
        }
        self.peak()
    }

    /// Run zeros through the delay line so the last real samples reach
    /// every tap.
    pub fn flush(&mut self) -> f32 {
        for _ in 0..TAPS_PER_PHASE - 1 {
            self.push(0.0);
        }
        self.peak()
    }

    /// Linear peak: the larger of the interpolated and the sample peak.
    pub fn peak(&self) -> f32 {
        self.filtered_peak.max(self.sample_peak)
    }

    pub fn reset(&mut self) {
        self.delay = [0.0; 2 * TAPS_PER_PHASE];
        self.head = 0;
        self.filtered_peak = 0.0;
        self.sample_peak = 0.0;
    }
}

/// Linear true peak of a whole buffer. An empty buffer is `0.0`.
pub fn true_peak(samples: &[f32], options: &TruePeakOptions) -> Result<f32> {
    match options.method {
        TruePeakMethod::Polyphase => {
            let mut estimator = TruePeakEstimator::new(options.oversampling)?;
            estimator.process(samples);
            Ok(estimator.flush())
        }
        TruePeakMethod::Interpolated(interpolation) => {
            let oversampler = Oversampler::new(options.oversampling, interpolation)?;
            Ok(oversampler.peak(samples))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    /// Quarter-rate sine sampled 45 degrees off its crests: every sample is
    /// +-0.707 but the waveform reaches 1.0 between them.
    fn offset_quarter_rate_sine(len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                (2.0 * core::f64::consts::PI * 0.25 * n as f64 + core::f64::consts::FRAC_PI_4)
                    .sin() as f32
            })
            .collect()
    }

    #[test]
    fn test_finds_inter_sample_peak() {
        let signal = offset_quarter_rate_sine(480);
        let sample_peak = signal.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        assert_abs_diff_eq!(sample_peak, core::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-4);

        let peak = true_peak(&signal, &TruePeakOptions::polyphase(4)).unwrap();
        assert!(peak > 0.95, "true peak {peak} should approach 1.0");
    }

    #[test]
    fn test_rejects_unsupported_factor() {
        assert!(TruePeakEstimator::new(8).is_err());
        assert!(TruePeakEstimator::new(3).is_err());
        assert!(true_peak(&[0.0], &TruePeakOptions::polyphase(8)).is_err());
    }

    #[test]
    fn test_silence_and_empty() {
        assert_eq!(true_peak(&[], &TruePeakOptions::default()).unwrap(), 0.0);
        assert_eq!(
            true_peak(&[0.0; 1000], &TruePeakOptions::default()).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_streaming_matches_batch() {
        let signal = offset_quarter_rate_sine(1000);
        let batch = true_peak(&signal, &TruePeakOptions::polyphase(2)).unwrap();

        let mut est = TruePeakEstimator::new(2).unwrap();
        for chunk in signal.chunks(77) {
            est.process(chunk);
        }
        assert_eq!(est.flush(), batch);
        assert_eq!(est.oversampling(), 2);

        est.reset();
        assert_eq!(est.peak(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_never_below_sample_peak(
            samples in prop::collection::vec(-1.0f32..1.0, 1..400),
            factor in prop::sample::select(vec![2u32, 4]),
        ) {
            let sample_peak = samples.iter().fold(0.0f32, |m, x| m.max(x.abs()));
            let peak = true_peak(&samples, &TruePeakOptions::polyphase(factor)).unwrap();
            prop_assert!(peak >= sample_peak);
        }
    }
}
