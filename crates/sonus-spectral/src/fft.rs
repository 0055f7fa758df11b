//! Fixed-size radix-2 FFT.
//!
//! Iterative decimation-in-time Cooley-Tukey. The bit-reversal permutation,
//! the twiddle tables and the scratch buffers are built once in
//! [`FftEngine::new`]; [`FftEngine::process`] and [`FftEngine::transform`]
//! never allocate for the transform itself.

use sonus_core::{Error, Result};

/// Reject sizes the radix-2 engine cannot handle.
pub fn validate_fft_size(size: usize) -> Result<()> {
    if size == 0 || !size.is_power_of_two() {
        return Err(Error::invalid(format!(
            "FFT size must be a power of two, got {size}"
        )));
    }
    Ok(())
}

/// Spectrum of one real-valued frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct FftResult {
    /// Full spectrum as interleaved `[re0, im0, re1, im1, ...]`, length `2 * N`.
    pub complex: Vec<f32>,
    /// `sqrt(re^2 + im^2)` for bins `0..=N/2`.
    pub magnitude: Vec<f32>,
    /// `atan2(im, re)` for bins `0..=N/2`.
    pub phase: Vec<f32>,
    /// Bin centre frequencies in Hz, `i * sample_rate / N`.
    pub frequencies: Vec<f32>,
}

impl FftResult {
    pub fn size(&self) -> usize {
        self.complex.len() / 2
    }

    pub fn bin_count(&self) -> usize {
        self.magnitude.len()
    }
}

/// Radix-2 FFT of one fixed power-of-two size.
#[derive(Debug, Clone)]
pub struct FftEngine {
    size: usize,
    /// `bit_reverse[i]` is the destination of input sample `i`.
    bit_reverse: Vec<usize>,
    /// `cos(2*pi*k/N)` for `k < N/2`.
    cos_table: Vec<f32>,
    /// `sin(2*pi*k/N)` for `k < N/2`.
    sin_table: Vec<f32>,
    scratch_re: Vec<f32>,
    scratch_im: Vec<f32>,
}

impl FftEngine {
    pub fn new(size: usize) -> Result<Self> {
        validate_fft_size(size)?;

        let bits = size.trailing_zeros();
        let bit_reverse = (0..size)
            .map(|i| {
                if bits == 0 {
                    0
                } else {
                    i.reverse_bits() >> (usize::BITS - bits)
                }
            })
            .collect();

        let half = size / 2;
        let mut cos_table = Vec::with_capacity(half);
        let mut sin_table = Vec::with_capacity(half);
        for k in 0..half {
            let angle = 2.0 * core::f64::consts::PI * k as f64 / size as f64;
            cos_table.push(angle.cos() as f32);
            sin_table.push(angle.sin() as f32);
        }

        Ok(Self {
            size,
            bit_reverse,
            cos_table,
            sin_table,
            scratch_re: vec![0.0; size],
            scratch_im: vec![0.0; size],
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// In-place forward transform of a complex signal held as split arrays.
    pub fn process(&mut self, re: &mut [f32], im: &mut [f32]) -> Result<()> {
        self.check_len(re.len())?;
        self.check_len(im.len())?;

        for i in 0..self.size {
            let j = self.bit_reverse[i];
            if j > i {
                re.swap(i, j);
                im.swap(i, j);
            }
        }
        butterflies(&self.cos_table, &self.sin_table, re, im);
        Ok(())
    }

    /// In-place unscaled inverse transform, realized by conjugating around
    /// the forward transform. The caller divides by `N`.
    pub fn inverse(&mut self, re: &mut [f32], im: &mut [f32]) -> Result<()> {
        im.iter_mut().for_each(|v| *v = -*v);
        self.process(re, im)?;
        im.iter_mut().for_each(|v| *v = -*v);
        Ok(())
    }

    /// Transform a real-valued frame of exactly `size()` samples.
    pub fn transform(&mut self, input: &[f32], sample_rate: f64) -> Result<FftResult> {
        self.check_len(input.len())?;

        let Self {
            bit_reverse,
            cos_table,
            sin_table,
            scratch_re,
            scratch_im,
            size,
        } = self;

        for (i, &sample) in input.iter().enumerate() {
            scratch_re[bit_reverse[i]] = sample;
        }
        scratch_im.fill(0.0);
        butterflies(cos_table, sin_table, scratch_re, scratch_im);

        let n = *size;
        let bins = n / 2 + 1;
        let mut complex = Vec::with_capacity(2 * n);
        for (&r, &i) in scratch_re.iter().zip(scratch_im.iter()) {
            complex.push(r);
            complex.push(i);
        }
        let (magnitude, phase) = polar(&scratch_re[..bins], &scratch_im[..bins], 1.0);
        let frequencies = bin_frequencies(n, sample_rate);

        Ok(FftResult {
            complex,
            magnitude,
            phase,
            frequencies,
        })
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.size {
            return Err(Error::invalid(format!(
                "expected {} samples for this FFT, got {len}",
                self.size
            )));
        }
        Ok(())
    }
}

/// `log2(N)` butterfly stages over bit-reversed input.
fn butterflies(cos_table: &[f32], sin_table: &[f32], re: &mut [f32], im: &mut [f32]) {
    let n = re.len();
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let stride = n / len;
        for start in (0..n).step_by(len) {
            for k in 0..half {
                let wr = cos_table[k * stride];
                let wi = -sin_table[k * stride];
                let a = start + k;
                let b = a + half;
                let tr = re[b] * wr - im[b] * wi;
                let ti = re[b] * wi + im[b] * wr;
                re[b] = re[a] - tr;
                im[b] = im[a] - ti;
                re[a] += tr;
                im[a] += ti;
            }
        }
        len <<= 1;
    }
}

/// Magnitude and phase of a half spectrum, with an optional scale.
pub(crate) fn polar(re: &[f32], im: &[f32], scale: f32) -> (Vec<f32>, Vec<f32>) {
    let magnitude = re
        .iter()
        .zip(im)
        .map(|(&r, &i)| (r * scale).hypot(i * scale))
        .collect();
    let phase = re.iter().zip(im).map(|(&r, &i)| i.atan2(r)).collect();
    (magnitude, phase)
}

/// Centre frequencies of bins `0..=N/2`.
pub fn bin_frequencies(fft_size: usize, sample_rate: f64) -> Vec<f32> {
    (0..=fft_size / 2)
        .map(|k| (k as f64 * sample_rate / fft_size as f64) as f32)
        .collect()
}
