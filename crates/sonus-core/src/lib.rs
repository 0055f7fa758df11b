//! Core types for the sonus DSP kernel.
//!
//! - [`Error`] / [`Result`]: the shared error taxonomy
//! - [`AudioBuffer`] / [`AudioSource`]: decoded, planar input audio
//! - [`db`]: LUFS and dB conversions
//! - [`CallbackContext`]: explicit host timing for realtime calls
//! - [`AtomicDouble`], [`AtomicFlag`]: lock-free publishing

pub mod buffer;
pub mod context;
pub mod db;
pub mod error;
pub(crate) mod lockfree;

pub use buffer::{AudioBuffer, AudioSource};
pub use context::CallbackContext;
pub use error::{Error, Result};
pub use lockfree::{AtomicDouble, AtomicFlag};
