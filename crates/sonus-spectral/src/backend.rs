//! Pluggable FFT backends.
//!
//! The STFT processor talks to a `Box<dyn FftBackend>`. The native radix-2
//! [`FftEngine`] is always available; the accelerated backend wraps
//! `rustfft` and only exists when the `accelerated` feature is compiled in.
//! [`create_backend_or_native`] tries the requested kind and falls back to
//! the native engine when the backend reports `UnsupportedFormat`.

use crate::fft::{validate_fft_size, FftEngine};
use sonus_core::{Error, Result};

/// Which implementation sits behind an [`FftBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum BackendKind {
    #[default]
    Native,
    Accelerated,
    Custom,
}

/// Complex in-place forward FFT of a fixed power-of-two size.
pub trait FftBackend: Send {
    fn kind(&self) -> BackendKind;

    fn size(&self) -> usize;

    /// Forward transform of split real/imaginary arrays, unscaled.
    fn forward(&mut self, re: &mut [f32], im: &mut [f32]) -> Result<()>;

    /// Unscaled inverse transform via conjugation around [`forward`](Self::forward).
    fn inverse(&mut self, re: &mut [f32], im: &mut [f32]) -> Result<()> {
        im.iter_mut().for_each(|v| *v = -*v);
        self.forward(re, im)?;
        im.iter_mut().for_each(|v| *v = -*v);
        Ok(())
    }
}

impl FftBackend for FftEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn size(&self) -> usize {
        FftEngine::size(self)
    }

    fn forward(&mut self, re: &mut [f32], im: &mut [f32]) -> Result<()> {
        self.process(re, im)
    }
}

#[cfg(feature = "accelerated")]
mod accelerated {
    use super::*;
    use rustfft::{num_complex::Complex, Fft, FftPlanner};
    use std::sync::Arc;

    /// `rustfft`-backed FFT. Same contract as the native engine.
    pub struct AcceleratedFft {
        fft: Arc<dyn Fft<f32>>,
        buffer: Vec<Complex<f32>>,
        scratch: Vec<Complex<f32>>,
    }

    impl AcceleratedFft {
        pub fn new(size: usize) -> Result<Self> {
            validate_fft_size(size)?;
            let mut planner = FftPlanner::<f32>::new();
            let fft = planner.plan_fft_forward(size);
            let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
            Ok(Self {
                fft,
                buffer: vec![Complex::new(0.0, 0.0); size],
                scratch,
            })
        }
    }

    impl FftBackend for AcceleratedFft {
        fn kind(&self) -> BackendKind {
            BackendKind::Accelerated
        }

        fn size(&self) -> usize {
            self.buffer.len()
        }

        fn forward(&mut self, re: &mut [f32], im: &mut [f32]) -> Result<()> {
            let n = self.buffer.len();
            if re.len() != n || im.len() != n {
                return Err(Error::invalid(format!(
                    "expected {n} samples for this FFT, got {}/{}",
                    re.len(),
                    im.len()
                )));
            }
            for ((c, &r), &i) in self.buffer.iter_mut().zip(re.iter()).zip(im.iter()) {
                *c = Complex::new(r, i);
            }
            self.fft
                .process_with_scratch(&mut self.buffer, &mut self.scratch);
            for ((c, r), i) in self.buffer.iter().zip(re.iter_mut()).zip(im.iter_mut()) {
                *r = c.re;
                *i = c.im;
            }
            Ok(())
        }
    }
}

#[cfg(feature = "accelerated")]
pub use accelerated::AcceleratedFft;

/// Build the accelerated backend, or report why it is unavailable.
#[cfg(feature = "accelerated")]
pub fn accelerated_backend(size: usize) -> Result<Box<dyn FftBackend>> {
    Ok(Box::new(AcceleratedFft::new(size)?))
}

/// Build the accelerated backend, or report why it is unavailable.
#[cfg(not(feature = "accelerated"))]
pub fn accelerated_backend(size: usize) -> Result<Box<dyn FftBackend>> {
    validate_fft_size(size)?;
    Err(Error::unsupported(
        "accelerated FFT backend not compiled in (enable the `accelerated` feature)",
    ))
}

/// Construct a backend of the requested kind.
///
/// `Custom` backends are user types; hand them to the processor directly
/// instead of going through this factory.
pub fn create_backend(kind: BackendKind, size: usize) -> Result<Box<dyn FftBackend>> {
    match kind {
        BackendKind::Native => Ok(Box::new(FftEngine::new(size)?)),
        BackendKind::Accelerated => accelerated_backend(size),
        BackendKind::Custom => Err(Error::invalid(
            "custom FFT backends must be supplied as a Box<dyn FftBackend>",
        )),
    }
}

/// Like [`create_backend`], but falls back to the native engine when the
/// requested backend fails to initialize. Invalid sizes still fail.
pub fn create_backend_or_native(kind: BackendKind, size: usize) -> Result<Box<dyn FftBackend>> {
    create_backend(kind, size).or_else(|err| match err {
        Error::UnsupportedFormat(reason) => {
            tracing::warn!(?kind, %reason, "FFT backend unavailable, using native engine");
            Ok(Box::new(FftEngine::new(size)?) as Box<dyn FftBackend>)
        }
        other => Err(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_native_backend() {
        let backend = create_backend(BackendKind::Native, 64).unwrap();
        assert_eq!(backend.kind(), BackendKind::Native);
        assert_eq!(backend.size(), 64);
    }

    #[test]
    fn test_custom_requires_instance() {
        assert!(create_backend(BackendKind::Custom, 64).is_err());
    }

    #[test]
    fn test_invalid_size_not_masked_by_fallback() {
        let err = create_backend_or_native(BackendKind::Accelerated, 100).err().unwrap();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_fallback_always_yields_backend() {
        let backend = create_backend_or_native(BackendKind::Accelerated, 128).unwrap();
        assert_eq!(backend.size(), 128);
        #[cfg(feature = "accelerated")]
        assert_eq!(backend.kind(), BackendKind::Accelerated);
        #[cfg(not(feature = "accelerated"))]
        assert_eq!(backend.kind(), BackendKind::Native);
    }

    #[cfg(feature = "accelerated")]
    #[test]
    fn test_accelerated_matches_native() {
        let n = 512;
        let input: Vec<f32> = (0..n).map(|i| ((i * 13) % 29) as f32 / 29.0 - 0.5).collect();

        let mut native = create_backend(BackendKind::Native, n).unwrap();
        let mut accel = create_backend(BackendKind::Accelerated, n).unwrap();

        let (mut re_a, mut im_a) = (input.clone(), vec![0.0; n]);
        let (mut re_b, mut im_b) = (input, vec![0.0; n]);
        native.forward(&mut re_a, &mut im_a).unwrap();
        accel.forward(&mut re_b, &mut im_b).unwrap();

        for k in 0..n {
            assert_abs_diff_eq!(re_a[k], re_b[k], epsilon = 1e-3);
            assert_abs_diff_eq!(im_a[k], im_b[k], epsilon = 1e-3);
        }
    }
}
