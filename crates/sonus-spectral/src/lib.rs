//! # Sonus Spectral
//!
//! Spectral transforms for the sonus DSP kernel:
//! - **FFT**: fixed-size radix-2 engine with precomputed tables ([`FftEngine`])
//! - **Backends**: [`FftBackend`] trait with native, accelerated and custom variants
//! - **Windows**: Hann, Hamming, Blackman, Bartlett, Kaiser, Tukey, rectangular,
//!   cached per (type, size, parameter)
//! - **STFT**: windowed analysis with overlap-add inverse ([`StftProcessor`])
//!   and a sliding streaming variant ([`StreamingStft`])
//!
//! ## Example
//!
//! ```rust
//! use sonus_spectral::{StftOptions, StftProcessor};
//!
//! let signal = vec![0.0f32; 48000];
//! let mut stft = StftProcessor::new(StftOptions::new(2048, 512, 48000.0))?;
//! let spectrum = stft.forward(&signal)?;
//! let rebuilt = stft.inverse(&spectrum, Some(signal.len()))?;
//! assert_eq!(rebuilt.len(), signal.len());
//! # Ok::<(), sonus_core::Error>(())
//! ```

pub mod backend;
pub mod cache;
pub mod fft;
pub mod stft;
pub mod streaming;
pub mod window;

#[cfg(feature = "accelerated")]
pub use backend::AcceleratedFft;
pub use backend::{create_backend, create_backend_or_native, BackendKind, FftBackend};
pub use cache::{shared_window, WindowCache};
pub use fft::{bin_frequencies, FftEngine, FftResult};
pub use stft::{Normalization, StftFrame, StftOptions, StftProcessor, StftResult};
pub use streaming::{StreamingFrame, StreamingStft};
pub use window::{generate_window, WindowType};
