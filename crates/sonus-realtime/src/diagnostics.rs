//! Asynchronous diagnostics. Realtime code never returns errors across the
//! callback boundary; it reports them here instead.

use crate::policy::RealtimePolicy;
use core::fmt;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Diagnostic {
    /// A heavy feature is being throttled or skipped. Not a failure.
    PolicyWarning {
        feature: String,
        policy: RealtimePolicy,
    },
    /// A feature failed on a frame; that frame's message was dropped.
    ProcessingError {
        feature: String,
        message: String,
        sample_index: u64,
    },
    /// The drainer fell behind and `dropped` frames were discarded, the
    /// latest starting at `sample_index`.
    QueueOverflow { sample_index: u64, dropped: u64 },
    /// A control message was rejected; the previous settings stay active.
    InvalidControl { message: String },
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        !matches!(self, Diagnostic::PolicyWarning { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PolicyWarning { feature, policy } => match policy {
                RealtimePolicy::Strict => {
                    write!(f, "heavy feature '{feature}' disabled by strict policy")
                }
                _ => write!(f, "heavy feature '{feature}' throttled by {policy} policy"),
            },
            Diagnostic::ProcessingError {
                feature,
                message,
                sample_index,
            } => write!(
                f,
                "feature '{feature}' failed at sample {sample_index}: {message}"
            ),
            Diagnostic::QueueOverflow {
                sample_index,
                dropped,
            } => write!(
                f,
                "frame queue full, dropped {dropped} frame(s) (latest at sample {sample_index})"
            ),
            Diagnostic::InvalidControl { message } => {
                write!(f, "control message rejected: {message}")
            }
        }
    }
}
