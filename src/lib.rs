//! # Sonus - Real-time Audio Measurement Kernel
//!
//! Numerically exact signal processing for audio analysis, usable both as
//! one-shot calls and from a low-latency audio callback.
//!
//! ## Architecture
//!
//! Sonus is an umbrella crate that coordinates:
//! - **sonus-core** - Error taxonomy, audio buffers, dB math, lock-free atomics
//! - **sonus-spectral** - Radix-2 FFT, window tables, STFT/iSTFT
//! - **sonus-loudness** - BS.1770 K-weighted loudness and true peak
//! - **sonus-realtime** - Frame scheduler and realtime analysis sessions
//!
//! ## Quick Start
//!
//! ```
//! use sonus::prelude::*;
//!
//! let tone: Vec<f32> = (0..48000 * 5)
//!     .map(|n| 0.1 * (2.0 * std::f32::consts::PI * 1000.0 * n as f32 / 48000.0).sin())
//!     .collect();
//!
//! let source = AudioBuffer::mono(tone.clone(), 48000.0)?;
//! let report = sonus::get_lufs(&source, &LoudnessOptions::default())?;
//! assert!((report.integrated + 23.0).abs() < 0.1);
//!
//! let peak = sonus::get_true_peak(&tone, &TruePeakOptions::default())?;
//! assert!(peak >= 0.1);
//! # Ok::<(), sonus::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - `accelerated` + `realtime`
//! - `accelerated` - rustfft-backed FFT backend
//! - `realtime` - Frame scheduler and realtime sessions
//! - `serialization` - serde support for options, reports and control messages

mod error;

pub use error::{Error, Result};

/// Re-export of sonus-core for direct access
pub use sonus_core as core;
pub use sonus_loudness as loudness;
#[cfg(feature = "realtime")]
pub use sonus_realtime as realtime;
pub use sonus_spectral as spectral;

pub use sonus_core::{db, AudioBuffer, AudioSource, CallbackContext};
pub use sonus_loudness::{
    Interpolation, LoudnessMeter, LoudnessOptions, LoudnessReading, LoudnessReport,
    RealtimeLoudnessOptions, TruePeakOptions,
};
#[cfg(feature = "realtime")]
pub use sonus_realtime::{
    ControlMessage, Diagnostic, FeatureSet, RealtimePolicy, RealtimeSession, SessionConfig,
    SessionEvent, SessionHandle,
};
pub use sonus_spectral::{
    generate_window, FftResult, Normalization, StftOptions, StftResult, WindowType,
};

use sonus_loudness::{analyze_loudness, true_peak};
use sonus_spectral::{FftEngine, StftProcessor};

/// Spectrum of one power-of-two length buffer.
pub fn fft(buffer: &[f32], sample_rate: f64) -> Result<FftResult> {
    let mut engine = FftEngine::new(buffer.len())?;
    Ok(engine.transform(buffer, sample_rate)?)
}

pub fn stft(buffer: &[f32], options: &StftOptions) -> Result<StftResult> {
    let mut processor = StftProcessor::new(*options)?;
    Ok(processor.forward(buffer)?)
}

/// Overlap-add reconstruction using the options stored in `result`.
pub fn istft(result: &StftResult, target_length: Option<usize>) -> Result<Vec<f32>> {
    let mut processor = StftProcessor::new(result.options)?;
    Ok(processor.inverse(result, target_length)?)
}

/// Integrated loudness plus the optional outputs selected in `options`.
pub fn get_lufs<S>(source: &S, options: &LoudnessOptions) -> Result<LoudnessReport>
where
    S: AudioSource + ?Sized,
{
    Ok(analyze_loudness(source, options)?)
}

/// Streaming meter; feed it with [`LoudnessMeter::process`].
pub fn get_lufs_realtime(
    sample_rate: f64,
    channels: usize,
    options: RealtimeLoudnessOptions,
) -> Result<LoudnessMeter> {
    Ok(LoudnessMeter::new(sample_rate, channels, options)?)
}

/// Linear true peak; `0.0` for silence or an empty buffer.
pub fn get_true_peak(buffer: &[f32], options: &TruePeakOptions) -> Result<f32> {
    Ok(true_peak(buffer, options)?)
}

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        fft, generate_window, get_lufs, get_lufs_realtime, get_true_peak, istft, stft,
    };
    pub use crate::{Error, Result};

    pub use sonus_core::{AudioBuffer, AudioSource, CallbackContext};
    pub use sonus_loudness::{
        Interpolation, LoudnessMeter, LoudnessOptions, LoudnessReading, LoudnessReport,
        RealtimeLoudnessOptions, TruePeakOptions,
    };
    pub use sonus_spectral::{Normalization, StftOptions, StftResult, WindowType};

    #[cfg(feature = "realtime")]
    pub use sonus_realtime::{
        ControlMessage, FeatureSet, RealtimePolicy, RealtimeSession, SessionConfig, SessionEvent,
    };
}
