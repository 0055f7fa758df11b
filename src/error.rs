//! Centralized error type for the sonus umbrella crate.
//!
//! Wraps the subsystem error so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] sonus_core::Error),
}

impl Error {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::Core(e) if e.is_invalid_input())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
