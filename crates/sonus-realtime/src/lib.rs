//! # Sonus Realtime
//!
//! Realtime side of the sonus kernel:
//! - [`FrameScheduler`] / [`FrameRing`]: callback blocks in, hopped frames out
//! - [`RealtimeSession`] / [`SessionHandle`]: audio-thread session with a
//!   drainer thread computing [`FrameFeature`]s off the callback
//! - [`RealtimePolicy`]: how heavy features are throttled under load
//!
//! ```
//! use sonus_core::CallbackContext;
//! use sonus_realtime::{FeatureSet, RealtimeSession, SessionConfig, SessionEvent};
//!
//! let features = FeatureSet::from_names(&["rms"], 1024)?;
//! let (mut session, mut handle) = RealtimeSession::start(SessionConfig::default(), 48000.0, features)?;
//!
//! let block = vec![0.25f32; 1024];
//! session.process(&[block.as_slice()], &CallbackContext::new(0.0, 48000.0, block.len()));
//! handle.shutdown()?;
//!
//! assert!(matches!(handle.drain_events().first(), Some(SessionEvent::Frame(_))));
//! # Ok::<(), sonus_core::Error>(())
//! ```

pub mod config;
pub mod diagnostics;
pub mod features;
pub mod policy;
pub mod ring;
pub mod scheduler;
pub mod session;

pub use config::{ControlMessage, SchedulerConfig, SessionConfig};
pub use diagnostics::Diagnostic;
pub use features::{
    FeatureSet, FeatureValue, FrameFeature, PeakFeature, RmsFeature, SpectrumFeature,
    BUILTIN_FEATURES,
};
pub use policy::{GateDecision, HeavyFeatureGate, RealtimePolicy};
pub use ring::FrameRing;
pub use scheduler::{AnalysisFrame, FrameScheduler};
pub use session::{FrameMessage, RealtimeSession, SessionEvent, SessionHandle};
