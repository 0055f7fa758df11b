//! Per-frame features computed on the drainer thread.
//!
//! Only a minimal built-in set lives here; richer feature layers plug in
//! through [`FrameFeature`].

use crate::scheduler::AnalysisFrame;
use sonus_core::{Error, Result};
use sonus_spectral::{shared_window, FftEngine, WindowType};
use std::sync::Arc;

/// A feature's output for one frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "serialization", serde(untagged))]
pub enum FeatureValue {
    Scalar(f32),
    Vector(Vec<f32>),
}

impl FeatureValue {
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            FeatureValue::Scalar(v) => Some(*v),
            FeatureValue::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            FeatureValue::Scalar(_) => None,
            FeatureValue::Vector(v) => Some(v),
        }
    }
}

/// Something computed from every analysis frame.
pub trait FrameFeature: Send {
    fn name(&self) -> &str;

    /// Heavy features are subject to the session's realtime policy.
    fn is_heavy(&self) -> bool {
        false
    }

    fn compute(&mut self, frame: &AnalysisFrame) -> Result<FeatureValue>;

    /// Clear any state carried between frames.
    fn reset(&mut self) {}
}

/// Root mean square over all channels.
#[derive(Debug, Default)]
pub struct RmsFeature;

impl FrameFeature for RmsFeature {
    fn name(&self) -> &str {
        "rms"
    }

    fn compute(&mut self, frame: &AnalysisFrame) -> Result<FeatureValue> {
        let count = frame.len() * frame.channel_count();
        if count == 0 {
            return Ok(FeatureValue::Scalar(0.0));
        }
        let sum: f64 = frame
            .channels()
            .iter()
            .flatten()
            .map(|&x| (x as f64) * (x as f64))
            .sum();
        Ok(FeatureValue::Scalar((sum / count as f64).sqrt() as f32))
    }
}

/// Largest absolute sample over all channels.
#[derive(Debug, Default)]
pub struct PeakFeature;

impl FrameFeature for PeakFeature {
    fn name(&self) -> &str {
        "peak"
    }

    fn compute(&mut self, frame: &AnalysisFrame) -> Result<FeatureValue> {
        let peak = frame
            .channels()
            .iter()
            .flatten()
            .fold(0.0f32, |m, x| m.max(x.abs()));
        Ok(FeatureValue::Scalar(peak))
    }
}

/// Hann-windowed magnitude spectrum of the channel downmix, `N/2 + 1` bins.
#[derive(Debug)]
pub struct SpectrumFeature {
    engine: FftEngine,
    window: Arc<[f32]>,
    mono: Vec<f32>,
    re: Vec<f32>,
    im: Vec<f32>,
}

impl SpectrumFeature {
    /// `frame_len` must be a power of two.
    pub fn new(frame_len: usize) -> Result<Self> {
        let engine = FftEngine::new(frame_len)?;
        let window = shared_window(WindowType::Hann, frame_len)?;
        Ok(Self {
            engine,
            window,
            mono: Vec::with_capacity(frame_len),
            re: vec![0.0; frame_len],
            im: vec![0.0; frame_len],
        })
    }
}

impl FrameFeature for SpectrumFeature {
    fn name(&self) -> &str {
        "spectrum"
    }

    fn is_heavy(&self) -> bool {
        true
    }

    fn compute(&mut self, frame: &AnalysisFrame) -> Result<FeatureValue> {
        let size = self.engine.size();
        if frame.len() != size {
            return Err(Error::processing(format!(
                "frame has {} samples, spectrum expects {size}",
                frame.len()
            )));
        }
        frame.downmix_into(&mut self.mono);
        for ((re, &x), &w) in self.re.iter_mut().zip(&self.mono).zip(self.window.iter()) {
            *re = x * w;
        }
        self.im.fill(0.0);
        self.engine.process(&mut self.re, &mut self.im)?;

        let magnitudes = self.re[..=size / 2]
            .iter()
            .zip(&self.im)
            .map(|(r, i)| (r * r + i * i).sqrt())
            .collect();
        Ok(FeatureValue::Vector(magnitudes))
    }
}

/// Names accepted by [`FeatureSet::from_names`].
pub const BUILTIN_FEATURES: &[&str] = &["rms", "peak", "spectrum"];

fn builtin(name: &str, frame_len: usize) -> Result<Box<dyn FrameFeature>> {
    match name {
        "rms" => Ok(Box::new(RmsFeature)),
        "peak" => Ok(Box::new(PeakFeature)),
        "spectrum" => Ok(Box::new(SpectrumFeature::new(frame_len)?)),
        other => Err(Error::invalid(format!(
            "unknown feature '{other}' (expected one of {BUILTIN_FEATURES:?})"
        ))),
    }
}

/// Ordered collection of features run on each frame.
#[derive(Default)]
pub struct FeatureSet {
    features: Vec<Box<dyn FrameFeature>>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the named built-ins for frames of `frame_len` samples.
    pub fn from_names<S: AsRef<str>>(names: &[S], frame_len: usize) -> Result<Self> {
        let features = names
            .iter()
            .map(|n| builtin(n.as_ref(), frame_len))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { features })
    }

    pub fn with(mut self, feature: Box<dyn FrameFeature>) -> Self {
        self.features.push(feature);
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn FrameFeature>> + '_ {
        self.features.iter_mut()
    }

    pub fn reset(&mut self) {
        for feature in &mut self.features {
            feature.reset();
        }
    }
}

impl core::fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeatureSet")
            .field("features", &self.names())
            .finish()
    }
}
