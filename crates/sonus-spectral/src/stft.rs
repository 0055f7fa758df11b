//! Short-time Fourier transform with overlap-add inverse.
//!
//! Frame `i` covers samples `[i * hop, i * hop + window_size)`. Each frame is
//! windowed, zero-padded to `fft_size` and transformed; only bins
//! `0..=fft_size/2` are kept. The inverse rebuilds the conjugate-symmetric
//! spectrum, runs the same forward backend on the conjugate, windows again
//! and normalizes the overlap-add by the accumulated squared window.

use crate::backend::{create_backend_or_native, BackendKind, FftBackend};
use crate::cache::shared_window;
use crate::fft::{bin_frequencies, polar, validate_fft_size};
use crate::window::WindowType;
use sonus_core::{Error, Result};
use std::sync::Arc;

/// Accumulated window energy below this is treated as zero coverage.
const MIN_WINDOW_ENERGY: f32 = 1e-8;

/// Scaling convention for the forward transform.
///
/// The inverse always applies `1 / (N * forward_scale)`, so a forward/inverse
/// pair reconstructs the input under every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Normalization {
    /// Forward scaled by `1/N`.
    Forward,
    /// Forward unscaled, inverse scaled by `1/N`.
    #[default]
    Backward,
    /// Both directions scaled by `1/sqrt(N)`.
    Ortho,
    /// Forward unscaled.
    None,
}

impl Normalization {
    pub fn forward_scale(self, fft_size: usize) -> f32 {
        let n = fft_size as f32;
        match self {
            Normalization::Forward => 1.0 / n,
            Normalization::Backward | Normalization::None => 1.0,
            Normalization::Ortho => 1.0 / n.sqrt(),
        }
    }

    pub fn inverse_scale(self, fft_size: usize) -> f32 {
        1.0 / (fft_size as f32 * self.forward_scale(fft_size))
    }
}

/// STFT configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StftOptions {
    pub fft_size: usize,
    pub window_size: usize,
    pub hop_size: usize,
    pub window: WindowType,
    pub normalization: Normalization,
    pub sample_rate: f64,
    pub backend: BackendKind,
}

impl Default for StftOptions {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            window_size: 2048,
            hop_size: 512,
            window: WindowType::Hann,
            normalization: Normalization::Backward,
            sample_rate: 44100.0,
            backend: BackendKind::Native,
        }
    }
}

impl StftOptions {
    /// Square frames: `fft_size == window_size`.
    pub fn new(fft_size: usize, hop_size: usize, sample_rate: f64) -> Self {
        Self {
            fft_size,
            window_size: fft_size,
            hop_size,
            sample_rate,
            ..Self::default()
        }
    }

    pub fn with_window(mut self, window: WindowType) -> Self {
        self.window = window;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_fft_size(self.fft_size)?;
        if self.window_size == 0 || self.window_size > self.fft_size {
            return Err(Error::invalid(format!(
                "window size {} must be within 1..={}",
                self.window_size, self.fft_size
            )));
        }
        if self.hop_size == 0 {
            return Err(Error::invalid("hop size must be at least 1"));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::invalid(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Equal in everything but the FFT backend.
    pub fn same_framing(&self, other: &StftOptions) -> bool {
        StftOptions {
            backend: self.backend,
            ..*other
        } == *self
    }

    /// `floor((len - window) / hop) + 1`, or 0 for signals shorter than one window.
    pub fn frame_count(&self, signal_len: usize) -> usize {
        if signal_len < self.window_size {
            0
        } else {
            (signal_len - self.window_size) / self.hop_size + 1
        }
    }
}

/// Half spectrum of one analysis frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StftFrame {
    /// Interleaved `[re, im]` pairs for bins `0..=fft_size/2`.
    pub complex: Vec<f32>,
    pub magnitude: Vec<f32>,
    pub phase: Vec<f32>,
}

impl StftFrame {
    fn from_half_spectrum(re: &[f32], im: &[f32], scale: f32) -> Self {
        let mut complex = Vec::with_capacity(re.len() * 2);
        for (&r, &i) in re.iter().zip(im) {
            complex.push(r * scale);
            complex.push(i * scale);
        }
        let (magnitude, phase) = polar(re, im, scale);
        Self {
            complex,
            magnitude,
            phase,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.magnitude.len()
    }
}

/// Output of [`StftProcessor::forward`].
///
/// Carries its own options so it can be inverted without extra arguments.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StftResult {
    pub frames: Vec<StftFrame>,
    /// Start time of each frame in seconds.
    pub times: Vec<f64>,
    /// Bin centre frequencies in Hz, shared by all frames.
    pub frequencies: Vec<f32>,
    pub options: StftOptions,
}

impl StftResult {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Reusable STFT/iSTFT processor for one configuration.
pub struct StftProcessor {
    options: StftOptions,
    window: Arc<[f32]>,
    backend: Box<dyn FftBackend>,
    re: Vec<f32>,
    im: Vec<f32>,
}

impl StftProcessor {
    /// Build a processor. Invalid sizes fail here, not at first use.
    pub fn new(options: StftOptions) -> Result<Self> {
        options.validate()?;
        let backend = create_backend_or_native(options.backend, options.fft_size)?;
        Self::build(options, backend)
    }

    /// Build a processor around a caller-supplied backend.
    pub fn with_backend(options: StftOptions, backend: Box<dyn FftBackend>) -> Result<Self> {
        options.validate()?;
        if backend.size() != options.fft_size {
            return Err(Error::invalid(format!(
                "backend size {} does not match fft size {}",
                backend.size(),
                options.fft_size
            )));
        }
        Self::build(options, backend)
    }

    fn build(options: StftOptions, backend: Box<dyn FftBackend>) -> Result<Self> {
        let window = shared_window(options.window, options.window_size)?;
        Ok(Self {
            options,
            window,
            backend,
            re: vec![0.0; options.fft_size],
            im: vec![0.0; options.fft_size],
        })
    }

    pub fn options(&self) -> &StftOptions {
        &self.options
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Window, zero-pad and transform one frame of at most `window_size` samples.
    pub fn analyze_frame(&mut self, frame: &[f32]) -> Result<StftFrame> {
        let ws = self.options.window_size;
        if frame.len() > ws {
            return Err(Error::invalid(format!(
                "frame of {} samples exceeds window size {ws}",
                frame.len()
            )));
        }

        self.re.fill(0.0);
        self.im.fill(0.0);
        for ((dst, &x), &w) in self.re.iter_mut().zip(frame).zip(self.window.iter()) {
            *dst = x * w;
        }
        self.backend.forward(&mut self.re, &mut self.im)?;

        let bins = self.options.bin_count();
        let scale = self.options.normalization.forward_scale(self.options.fft_size);
        Ok(StftFrame::from_half_spectrum(
            &self.re[..bins],
            &self.im[..bins],
            scale,
        ))
    }

    /// Forward STFT of a whole signal. Signals shorter than one window yield
    /// zero frames.
    pub fn forward(&mut self, signal: &[f32]) -> Result<StftResult> {
        let opts = self.options;
        let frame_count = opts.frame_count(signal.len());

        let mut frames = Vec::with_capacity(frame_count);
        let mut times = Vec::with_capacity(frame_count);
        for i in 0..frame_count {
            let start = i * opts.hop_size;
            frames.push(self.analyze_frame(&signal[start..start + opts.window_size])?);
            times.push(start as f64 / opts.sample_rate);
        }

        Ok(StftResult {
            frames,
            times,
            frequencies: bin_frequencies(opts.fft_size, opts.sample_rate),
            options: opts,
        })
    }

    /// Overlap-add inverse. The output has `(frames - 1) * hop + window_size`
    /// samples unless `target_length` asks for more or fewer.
    pub fn inverse(&mut self, result: &StftResult, target_length: Option<usize>) -> Result<Vec<f32>> {
        let opts = self.options;
        if !opts.same_framing(&result.options) {
            return Err(Error::invalid(format!(
                "result was produced with {:?}, this processor uses {:?}",
                result.options, opts
            )));
        }
        let n = opts.fft_size;
        let bins = opts.bin_count();
        let ws = opts.window_size;

        if result.frames.is_empty() {
            return Ok(vec![0.0; target_length.unwrap_or(0)]);
        }

        let natural_len = (result.frames.len() - 1) * opts.hop_size + ws;
        let mut output = vec![0.0f32; natural_len];
        let mut energy = vec![0.0f32; natural_len];
        let scale = opts.normalization.inverse_scale(n);

        for (index, frame) in result.frames.iter().enumerate() {
            if frame.complex.len() != 2 * bins {
                return Err(Error::invalid(format!(
                    "frame {index} has {} complex values, expected {}",
                    frame.complex.len(),
                    2 * bins
                )));
            }

            for k in 0..bins {
                self.re[k] = frame.complex[2 * k];
                self.im[k] = frame.complex[2 * k + 1];
            }
            self.im[0] = 0.0;
            if n > 1 {
                self.im[n / 2] = 0.0;
            }
            for k in bins..n {
                self.re[k] = self.re[n - k];
                self.im[k] = -self.im[n - k];
            }

            // Conjugate in, real part out: the imaginary output is discarded.
            self.im.iter_mut().for_each(|v| *v = -*v);
            self.backend.forward(&mut self.re, &mut self.im)?;

            let start = index * opts.hop_size;
            for i in 0..ws {
                let w = self.window[i];
                output[start + i] += self.re[i] * scale * w;
                energy[start + i] += w * w;
            }
        }

        for (sample, &e) in output.iter_mut().zip(&energy) {
            if e > MIN_WINDOW_ENERGY {
                *sample /= e;
            }
        }

        if let Some(len) = target_length {
            output.resize(len, 0.0);
        }
        Ok(output)
    }
}
