//! Backpressure policy for heavy frame features.

use core::fmt;
use core::str::FromStr;
use sonus_core::Error;

/// What the drainer does with features marked heavy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "serialization", serde(rename_all = "lowercase"))]
pub enum RealtimePolicy {
    /// Run on every frame.
    Allow,
    /// Run on one frame in `heavy_feature_interval` and report it once.
    #[default]
    Warn,
    /// Never run; report it once.
    Strict,
}

impl RealtimePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimePolicy::Allow => "allow",
            RealtimePolicy::Warn => "warn",
            RealtimePolicy::Strict => "strict",
        }
    }
}

impl fmt::Display for RealtimePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RealtimePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(RealtimePolicy::Allow),
            "warn" => Ok(RealtimePolicy::Warn),
            "strict" => Ok(RealtimePolicy::Strict),
            other => Err(Error::invalid(format!("unknown realtime policy '{other}'"))),
        }
    }
}

/// Outcome of [`HeavyFeatureGate::decide`] for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub run: bool,
    /// Emit a policy warning for this feature now.
    pub warn: bool,
}

/// Per-feature throttle state. Warnings fire once per gate lifetime.
#[derive(Debug, Clone)]
pub struct HeavyFeatureGate {
    policy: RealtimePolicy,
    interval: u32,
    frames_seen: u64,
    warned: bool,
}

impl HeavyFeatureGate {
    /// `interval` of 0 is treated as 1.
    pub fn new(policy: RealtimePolicy, interval: u32) -> Self {
        Self {
            policy,
            interval: interval.max(1),
            frames_seen: 0,
            warned: false,
        }
    }

    pub fn policy(&self) -> RealtimePolicy {
        self.policy
    }

    pub fn decide(&mut self) -> GateDecision {
        let frame = self.frames_seen;
        self.frames_seen += 1;
        let (run, throttled) = match self.policy {
            RealtimePolicy::Allow => (true, false),
            RealtimePolicy::Warn => (frame % self.interval as u64 == 0, true),
            RealtimePolicy::Strict => (false, true),
        };
        let warn = throttled && !self.warned;
        self.warned |= warn;
        GateDecision { run, warn }
    }

    pub fn reset(&mut self) {
        self.frames_seen = 0;
        self.warned = false;
    }
}
