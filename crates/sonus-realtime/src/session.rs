//! Realtime analysis session.
//!
//! Audio thread → [`RealtimeSession::process`] → bounded work queue →
//! drainer thread → [`SessionEvent`]s read from [`SessionHandle`].
//!
//! The audio side never blocks or returns errors. Frame buffers come from a
//! preallocated pool and are returned by the drainer once processed. When
//! the drainer falls behind, new frames are dropped and reported as
//! [`Diagnostic::QueueOverflow`]; audio capture itself is unaffected.

use crate::config::{ControlMessage, SessionConfig};
use crate::diagnostics::Diagnostic;
use crate::features::{FeatureSet, FeatureValue};
use crate::policy::HeavyFeatureGate;
use crate::scheduler::{AnalysisFrame, FrameScheduler};
use arc_swap::ArcSwap;
use core::sync::atomic::{AtomicU64, Ordering};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use sonus_core::{AtomicDouble, AtomicFlag, CallbackContext, Error, Result};
use sonus_loudness::{LoudnessMeter, LoudnessReading, RealtimeLoudnessOptions};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pending control messages per session.
const CONTROL_QUEUE_SIZE: usize = 32;

/// Queue slots kept free of frames for control and diagnostics.
const RESERVED_SLOTS: usize = CONTROL_QUEUE_SIZE + 4;

/// How long the drainer waits for work before checking for shutdown.
const DRAIN_POLL: Duration = Duration::from_millis(5);

/// Feature results for one frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "serialization", serde(rename_all = "camelCase"))]
pub struct FrameMessage {
    pub timestamp: f64,
    pub sample_index: u64,
    pub results: BTreeMap<String, FeatureValue>,
}

impl FrameMessage {
    pub fn get(&self, feature: &str) -> Option<&FeatureValue> {
        self.results.get(feature)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Frame(FrameMessage),
    Diagnostic(Diagnostic),
}

/// Items on the work queue, in arrival order.
enum Work {
    Frame(AnalysisFrame),
    Features(FeatureSet),
    /// New config, plus the features rebuilt for it when the frame size changed.
    Config(SessionConfig, Option<FeatureSet>),
    Reset,
    Diagnostic(Diagnostic),
}

/// State visible to both threads and the handle.
struct Shared {
    running: AtomicFlag,
    momentary: AtomicDouble,
    short_term: AtomicDouble,
    integrated: AtomicDouble,
    config: ArcSwap<SessionConfig>,
    features: ArcSwap<Vec<String>>,
    dropped_frames: AtomicU64,
    unreported_drops: AtomicU64,
    last_dropped_index: AtomicU64,
}

impl Shared {
    fn publish_loudness(&self, reading: LoudnessReading) {
        self.momentary.set(reading.momentary);
        self.short_term.set(reading.short_term);
        self.integrated.set(reading.integrated);
    }

    fn record_drop(&self, sample_index: u64) {
        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
        self.last_dropped_index.store(sample_index, Ordering::Relaxed);
        self.unreported_drops.fetch_add(1, Ordering::AcqRel);
    }
}

/// Audio-thread half of a session.
pub struct RealtimeSession {
    sample_rate: f64,
    config: SessionConfig,
    scheduler: FrameScheduler,
    meter: LoudnessMeter,
    /// Names of the last accepted feature list.
    feature_names: Vec<String>,
    control_rx: Receiver<ControlMessage>,
    work_tx: Sender<Work>,
    pool_tx: Sender<AnalysisFrame>,
    pool_rx: Receiver<AnalysisFrame>,
    shared: Arc<Shared>,
}

impl RealtimeSession {
    /// Validate `config`, spawn the drainer thread and return both halves.
    pub fn start(
        config: SessionConfig,
        sample_rate: f64,
        features: FeatureSet,
    ) -> Result<(RealtimeSession, SessionHandle)> {
        config.validate()?;
        let scheduler = FrameScheduler::new(config.scheduler_config(sample_rate))?;
        let meter = LoudnessMeter::new(
            sample_rate,
            config.input_channel_count,
            RealtimeLoudnessOptions::default(),
        )?;

        let (control_tx, control_rx) = crossbeam_channel::bounded(CONTROL_QUEUE_SIZE);
        let (work_tx, work_rx) = crossbeam_channel::bounded(config.queue_capacity + RESERVED_SLOTS);
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        let pool_size = config.queue_capacity + 1;
        let (pool_tx, pool_rx) = crossbeam_channel::bounded(pool_size);
        for _ in 0..pool_size {
            let frame = AnalysisFrame::new(config.input_channel_count, config.buffer_size);
            pool_tx
                .try_send(frame)
                .map_err(|_| Error::processing("frame pool rejected a buffer"))?;
        }

        let shared = Arc::new(Shared {
            running: AtomicFlag::new(true),
            momentary: AtomicDouble::default(),
            short_term: AtomicDouble::default(),
            integrated: AtomicDouble::default(),
            config: ArcSwap::from_pointee(config.clone()),
            features: ArcSwap::from_pointee(features.names()),
            dropped_frames: AtomicU64::new(0),
            unreported_drops: AtomicU64::new(0),
            last_dropped_index: AtomicU64::new(0),
        });

        let feature_names = features.names();
        let drainer = Drainer {
            gates: gates_for(&features, &config),
            features,
            config: config.clone(),
            work_rx,
            pool_tx: pool_tx.clone(),
            events_tx,
            shared: Arc::clone(&shared),
        };
        let thread = thread::Builder::new()
            .name("sonus-drainer".to_string())
            .spawn(move || drainer.run())
            .map_err(|e| Error::processing(format!("failed to spawn drainer thread: {e}")))?;

        tracing::debug!(
            sample_rate,
            buffer_size = config.buffer_size,
            hop_size = config.hop_size,
            channels = config.input_channel_count,
            policy = %config.realtime_policy,
            "realtime session started"
        );

        let session = RealtimeSession {
            sample_rate,
            config,
            scheduler,
            meter,
            feature_names,
            control_rx,
            work_tx,
            pool_tx,
            pool_rx,
            shared: Arc::clone(&shared),
        };
        let handle = SessionHandle {
            control_tx,
            events_rx,
            shared,
            thread: Some(thread),
        };
        Ok((session, handle))
    }

    /// Audio callback entry point. Applies pending control messages, feeds
    /// the loudness meter and queues every completed frame. Missing input
    /// channels read as silence for both. Returns the number of frames the
    /// scheduler produced, including any that were dropped.
    pub fn process(&mut self, inputs: &[&[f32]], ctx: &CallbackContext) -> usize {
        self.apply_controls();
        if !self.shared.running.get() {
            return 0;
        }

        let reading = self.meter.process_padded(inputs);
        self.shared.publish_loudness(reading);

        let Self {
            scheduler,
            work_tx,
            pool_tx,
            pool_rx,
            shared,
            config,
            ..
        } = self;
        let frame_capacity = config.queue_capacity;
        scheduler.process(inputs, ctx, |frame| {
            if work_tx.len() >= frame_capacity {
                shared.record_drop(frame.sample_index);
                return;
            }
            let Ok(mut slot) = pool_rx.try_recv() else {
                shared.record_drop(frame.sample_index);
                return;
            };
            slot.copy_from(frame);
            match work_tx.try_send(Work::Frame(slot)) {
                Ok(()) => {}
                Err(TrySendError::Full(Work::Frame(slot))) => {
                    let _ = pool_tx.try_send(slot);
                    shared.record_drop(frame.sample_index);
                }
                Err(_) => {}
            }
        })
    }

    fn apply_controls(&mut self) {
        while let Ok(message) = self.control_rx.try_recv() {
            match message {
                ControlMessage::SetFeatures(names) => {
                    if let Err(e) = self.set_features(names) {
                        self.reject(e);
                    }
                }
                ControlMessage::SetConfig(config) => {
                    if let Err(e) = self.reconfigure(config) {
                        self.reject(e);
                    }
                }
                ControlMessage::Reset => self.reset(),
            }
        }
    }

    fn reject(&self, error: Error) {
        tracing::warn!(%error, "control message rejected");
        self.post(Work::Diagnostic(Diagnostic::InvalidControl {
            message: error.to_string(),
        }));
    }

    fn set_features(&mut self, names: Vec<String>) -> Result<()> {
        let features = FeatureSet::from_names(&names[..], self.config.buffer_size)?;
        self.feature_names = names;
        self.post(Work::Features(features));
        Ok(())
    }

    /// Swap in a new configuration. Frame indexing restarts at zero.
    /// `queue_capacity` only takes effect for new sessions. Nothing changes
    /// unless the scheduler, the meter and the features all accept it.
    fn reconfigure(&mut self, config: SessionConfig) -> Result<()> {
        config.validate()?;
        let scheduler = FrameScheduler::new(config.scheduler_config(self.sample_rate))?;
        let features = if config.buffer_size != self.config.buffer_size {
            Some(FeatureSet::from_names(
                &self.feature_names[..],
                config.buffer_size,
            )?)
        } else {
            None
        };
        let meter = if config.input_channel_count != self.config.input_channel_count {
            Some(LoudnessMeter::new(
                self.sample_rate,
                config.input_channel_count,
                RealtimeLoudnessOptions::default(),
            )?)
        } else {
            None
        };

        let config = SessionConfig {
            queue_capacity: self.config.queue_capacity,
            ..config
        };
        self.scheduler = scheduler;
        if let Some(meter) = meter {
            self.meter = meter;
            self.shared.publish_loudness(LoudnessReading::default());
        }
        self.shared.config.store(Arc::new(config.clone()));
        self.config = config.clone();
        self.post(Work::Config(config, features));
        Ok(())
    }

    /// Zero the ring, filter and block history, and tell the drainer to
    /// reset its features.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.meter.reset();
        self.shared.publish_loudness(LoudnessReading::default());
        self.post(Work::Reset);
    }

    /// Queue a non-frame item into the slots frames leave free.
    fn post(&self, work: Work) {
        let _ = self.work_tx.try_send(work);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Latest loudness, as also published to the handle.
    pub fn loudness(&self) -> LoudnessReading {
        self.meter.reading()
    }
}

/// Host-side half of a session.
pub struct SessionHandle {
    control_tx: Sender<ControlMessage>,
    events_rx: Receiver<SessionEvent>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Queue a control message. It is applied at the start of the next
    /// [`RealtimeSession::process`] call.
    pub fn send(&self, message: ControlMessage) -> Result<()> {
        self.control_tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::processing("control queue full"),
            TrySendError::Disconnected(_) => Error::processing("session closed"),
        })
    }

    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.events_rx
    }

    /// All events available right now.
    pub fn drain_events(&self) -> Vec<SessionEvent> {
        self.events_rx.try_iter().collect()
    }

    /// Live loudness, read lock-free.
    pub fn loudness(&self) -> LoudnessReading {
        LoudnessReading {
            integrated: self.shared.integrated.get(),
            momentary: self.shared.momentary.get(),
            short_term: self.shared.short_term.get(),
        }
    }

    pub fn config(&self) -> SessionConfig {
        self.shared.config.load().as_ref().clone()
    }

    pub fn active_features(&self) -> Vec<String> {
        self.shared.features.load().as_ref().clone()
    }

    /// Frames dropped because the drainer fell behind.
    pub fn dropped_frames(&self) -> u64 {
        self.shared.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some() && self.shared.running.get()
    }

    /// Stop accepting audio, let the drainer finish the queue, and join it.
    /// Events stay readable afterwards.
    pub fn shutdown(&mut self) -> Result<()> {
        self.shared.running.set(false);
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| Error::processing("drainer thread panicked"))?;
            tracing::debug!("realtime session stopped");
        }
        Ok(())
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn gates_for(features: &FeatureSet, config: &SessionConfig) -> Vec<HeavyFeatureGate> {
    (0..features.len())
        .map(|_| HeavyFeatureGate::new(config.realtime_policy, config.heavy_feature_interval))
        .collect()
}

fn send_event(events_tx: &Sender<SessionEvent>, event: SessionEvent) {
    // The handle may already be gone; nothing left to report to.
    let _ = events_tx.send(event);
}

/// Non-realtime consumer of the work queue.
struct Drainer {
    features: FeatureSet,
    gates: Vec<HeavyFeatureGate>,
    config: SessionConfig,
    work_rx: Receiver<Work>,
    pool_tx: Sender<AnalysisFrame>,
    events_tx: Sender<SessionEvent>,
    shared: Arc<Shared>,
}

impl Drainer {
    fn run(mut self) {
        tracing::debug!(features = ?self.features.names(), "drainer started");
        loop {
            match self.work_rx.recv_timeout(DRAIN_POLL) {
                Ok(work) => self.handle(work),
                Err(RecvTimeoutError::Timeout) => {
                    if !self.shared.running.get() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.report_overflow();
        }
        self.report_overflow();
        tracing::debug!("drainer stopped");
    }

    fn handle(&mut self, work: Work) {
        match work {
            Work::Frame(frame) => {
                self.analyze(&frame);
                let _ = self.pool_tx.try_send(frame);
            }
            Work::Features(features) => self.set_features(features),
            Work::Config(config, features) => self.set_config(config, features),
            Work::Reset => {
                self.features.reset();
                self.gates.iter_mut().for_each(HeavyFeatureGate::reset);
                tracing::debug!("session reset");
            }
            Work::Diagnostic(diagnostic) => {
                send_event(&self.events_tx, SessionEvent::Diagnostic(diagnostic))
            }
        }
    }

    fn analyze(&mut self, frame: &AnalysisFrame) {
        let mut results = BTreeMap::new();
        for (feature, gate) in self.features.iter_mut().zip(&mut self.gates) {
            if feature.is_heavy() {
                let decision = gate.decide();
                if decision.warn {
                    tracing::warn!(
                        feature = feature.name(),
                        policy = %gate.policy(),
                        "heavy feature restricted by realtime policy"
                    );
                    send_event(
                        &self.events_tx,
                        SessionEvent::Diagnostic(Diagnostic::PolicyWarning {
                            feature: feature.name().to_string(),
                            policy: gate.policy(),
                        }),
                    );
                }
                if !decision.run {
                    continue;
                }
            }

            match feature.compute(frame) {
                Ok(value) => {
                    results.insert(feature.name().to_string(), value);
                }
                Err(e) => {
                    send_event(
                        &self.events_tx,
                        SessionEvent::Diagnostic(Diagnostic::ProcessingError {
                            feature: feature.name().to_string(),
                            message: e.to_string(),
                            sample_index: frame.sample_index,
                        }),
                    );
                    return;
                }
            }
        }

        send_event(
            &self.events_tx,
            SessionEvent::Frame(FrameMessage {
                timestamp: frame.timestamp,
                sample_index: frame.sample_index,
                results,
            }),
        );
    }

    fn set_features(&mut self, features: FeatureSet) {
        let names = features.names();
        tracing::debug!(features = ?names, "features changed");
        self.gates = gates_for(&features, &self.config);
        self.features = features;
        self.shared.features.store(Arc::new(names));
    }

    fn set_config(&mut self, config: SessionConfig, features: Option<FeatureSet>) {
        tracing::debug!(?config, "session reconfigured");
        if let Some(features) = features {
            self.features = features;
        }
        self.gates = gates_for(&self.features, &config);
        self.config = config;
    }

    fn report_overflow(&self) {
        let dropped = self.shared.unreported_drops.swap(0, Ordering::AcqRel);
        if dropped == 0 {
            return;
        }
        let sample_index = self.shared.last_dropped_index.load(Ordering::Relaxed);
        tracing::warn!(dropped, sample_index, "frame queue overflow");
        send_event(
            &self.events_tx,
            SessionEvent::Diagnostic(Diagnostic::QueueOverflow {
                sample_index,
                dropped,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FrameFeature;
    use crate::policy::RealtimePolicy;
    use approx::assert_abs_diff_eq;

    const SR: f64 = 48000.0;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| 0.1 * (2.0 * core::f64::consts::PI * 1000.0 * n as f64 / SR).sin() as f32)
            .collect()
    }

    /// Push `signal` through the session in `block`-sized callbacks.
    fn feed(session: &mut RealtimeSession, signal: &[f32], block: usize, offset: usize) {
        for (i, chunk) in signal.chunks(block).enumerate() {
            let start = (offset + i * block) as f64 / SR;
            let ctx = CallbackContext::from_block_start(start, chunk.len(), SR);
            session.process(&[chunk], &ctx);
        }
    }

    fn frames(events: &[SessionEvent]) -> Vec<&FrameMessage> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Frame(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    fn diagnostics(events: &[SessionEvent]) -> Vec<&Diagnostic> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Diagnostic(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn config(policy: RealtimePolicy) -> SessionConfig {
        SessionConfig::default()
            .with_policy(policy)
            .with_queue_capacity(256)
    }

    #[test]
    fn test_frames_arrive_in_order() {
        init_tracing();
        let features = FeatureSet::from_names(&["rms", "peak"], 1024).unwrap();
        let (mut session, mut handle) =
            RealtimeSession::start(config(RealtimePolicy::Allow), SR, features).unwrap();

        feed(&mut session, &tone(48000), 128, 0);
        handle.shutdown().unwrap();
        let events = handle.drain_events();

        let frames = frames(&events);
        assert_eq!(frames.len(), (48000 - 1024) / 512 + 1);
        assert!(diagnostics(&events).is_empty());
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.sample_index, i as u64 * 512);
            let expected_time = (frame.sample_index + 1024) as f64 / SR;
            assert_abs_diff_eq!(frame.timestamp, expected_time, epsilon = 1e-9);
            let rms = frame.get("rms").and_then(FeatureValue::as_scalar).unwrap();
            assert_abs_diff_eq!(rms, 0.1 / 2f32.sqrt(), epsilon = 2e-3);
        }
        assert_eq!(handle.dropped_frames(), 0);
    }

    #[test]
    fn test_live_loudness_is_published() {
        let (mut session, mut handle) =
            RealtimeSession::start(SessionConfig::default(), SR, FeatureSet::new()).unwrap();
        assert_eq!(handle.loudness().integrated, f64::NEG_INFINITY);

        feed(&mut session, &tone(48000 * 3), 480, 0);
        let live = handle.loudness();
        assert_abs_diff_eq!(live.integrated, -23.0, epsilon = 0.1);
        assert_abs_diff_eq!(live.momentary, -23.0, epsilon = 0.1);
        assert_eq!(live, session.loudness());

        session.reset();
        assert_eq!(handle.loudness().integrated, f64::NEG_INFINITY);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_warn_policy_throttles_heavy_features() {
        let cfg = config(RealtimePolicy::Warn).with_heavy_feature_interval(4);
        let features = FeatureSet::from_names(&["rms", "spectrum"], 1024).unwrap();
        let (mut session, mut handle) = RealtimeSession::start(cfg, SR, features).unwrap();

        feed(&mut session, &tone(48000), 256, 0);
        handle.shutdown().unwrap();
        let events = handle.drain_events();

        let frames = frames(&events);
        assert_eq!(frames.len(), 92);
        let with_spectrum = frames.iter().filter(|f| f.get("spectrum").is_some()).count();
        assert_eq!(with_spectrum, 23);
        assert!(frames.iter().all(|f| f.get("rms").is_some()));

        let diags = diagnostics(&events);
        assert_eq!(
            diags,
            vec![&Diagnostic::PolicyWarning {
                feature: "spectrum".into(),
                policy: RealtimePolicy::Warn,
            }]
        );
    }

    #[test]
    fn test_strict_policy_disables_heavy_features() {
        let features = FeatureSet::from_names(&["spectrum", "peak"], 1024).unwrap();
        let (mut session, mut handle) =
            RealtimeSession::start(config(RealtimePolicy::Strict), SR, features).unwrap();

        feed(&mut session, &tone(24000), 512, 0);
        handle.shutdown().unwrap();
        let events = handle.drain_events();

        assert!(frames(&events)
            .iter()
            .all(|f| f.get("spectrum").is_none() && f.get("peak").is_some()));
        assert_eq!(diagnostics(&events).len(), 1);
    }

    struct FailEveryOther {
        calls: usize,
    }

    impl FrameFeature for FailEveryOther {
        fn name(&self) -> &str {
            "flaky"
        }

        fn compute(&mut self, _frame: &AnalysisFrame) -> Result<FeatureValue> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                Err(Error::processing("odd failure"))
            } else {
                Ok(FeatureValue::Scalar(1.0))
            }
        }
    }

    #[test]
    fn test_feature_failure_drops_frame() {
        let features = FeatureSet::new().with(Box::new(FailEveryOther { calls: 0 }));
        let cfg = config(RealtimePolicy::Allow)
            .with_buffer_size(512)
            .with_hop_size(512);
        let (mut session, mut handle) = RealtimeSession::start(cfg, SR, features).unwrap();

        feed(&mut session, &tone(512 * 10), 512, 0);
        handle.shutdown().unwrap();
        let events = handle.drain_events();

        let kept: Vec<u64> = frames(&events).iter().map(|f| f.sample_index).collect();
        assert_eq!(kept, vec![0, 1024, 2048, 3072, 4096]);
        let errors: Vec<u64> = diagnostics(&events)
            .iter()
            .filter_map(|d| match d {
                Diagnostic::ProcessingError { sample_index, .. } => Some(*sample_index),
                _ => None,
            })
            .collect();
        assert_eq!(errors, vec![512, 1536, 2560, 3584, 4608]);
    }

    struct Slow;

    impl FrameFeature for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn compute(&mut self, _frame: &AnalysisFrame) -> Result<FeatureValue> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(FeatureValue::Scalar(0.0))
        }
    }

    #[test]
    fn test_overflow_drops_frames_not_audio() {
        let cfg = SessionConfig::default()
            .with_buffer_size(256)
            .with_hop_size(256)
            .with_queue_capacity(2);
        let features = FeatureSet::new().with(Box::new(Slow));
        let (mut session, mut handle) = RealtimeSession::start(cfg, SR, features).unwrap();

        feed(&mut session, &tone(256 * 20), 256, 0);
        assert_eq!(session.scheduler().write_index(), 256 * 20);
        handle.shutdown().unwrap();
        let events = handle.drain_events();

        let dropped = handle.dropped_frames();
        assert!(dropped > 0);
        assert_eq!(frames(&events).len() as u64 + dropped, 20);
        let reported: u64 = diagnostics(&events)
            .iter()
            .filter_map(|d| match d {
                Diagnostic::QueueOverflow { dropped, .. } => Some(*dropped),
                _ => None,
            })
            .sum();
        assert_eq!(reported, dropped);
    }

    #[test]
    fn test_control_messages() {
        let features = FeatureSet::from_names(&["rms"], 1024).unwrap();
        let (mut session, mut handle) =
            RealtimeSession::start(config(RealtimePolicy::Allow), SR, features).unwrap();

        handle
            .send(ControlMessage::SetConfig(SessionConfig::default().with_hop_size(0)))
            .unwrap();
        handle
            .send(ControlMessage::SetFeatures(vec!["bogus".into()]))
            .unwrap();
        handle
            .send(ControlMessage::SetFeatures(vec!["peak".into()]))
            .unwrap();
        feed(&mut session, &tone(4096), 512, 0);

        handle
            .send(ControlMessage::SetConfig(
                config(RealtimePolicy::Allow).with_buffer_size(2048).with_hop_size(2048),
            ))
            .unwrap();
        feed(&mut session, &tone(4096), 512, 4096);
        handle.shutdown().unwrap();
        let events = handle.drain_events();

        let invalid = diagnostics(&events)
            .iter()
            .filter(|d| matches!(d, Diagnostic::InvalidControl { .. }))
            .count();
        assert_eq!(invalid, 2);
        assert_eq!(handle.active_features(), vec!["peak".to_string()]);
        assert_eq!(handle.config().buffer_size, 2048);
        assert_eq!(session.config().queue_capacity, 256);

        let frames = frames(&events);
        assert!(frames.iter().all(|f| f.get("peak").is_some()));
        // Reconfiguring restarts frame indexing.
        let tail: Vec<u64> = frames.iter().rev().take(2).map(|f| f.sample_index).collect();
        assert_eq!(tail, vec![2048, 0]);
    }

    #[test]
    fn test_rejected_reconfigure_keeps_previous_config() {
        let features = FeatureSet::from_names(&["rms", "spectrum"], 1024).unwrap();
        let (mut session, mut handle) =
            RealtimeSession::start(config(RealtimePolicy::Allow), SR, features).unwrap();

        // The spectrum cannot be built for a 1000-sample frame.
        handle
            .send(ControlMessage::SetConfig(
                config(RealtimePolicy::Allow).with_buffer_size(1000).with_hop_size(500),
            ))
            .unwrap();
        feed(&mut session, &tone(48000), 480, 0);
        handle.shutdown().unwrap();
        let events = handle.drain_events();

        assert_eq!(session.config().buffer_size, 1024);
        assert_eq!(handle.config().buffer_size, 1024);
        let diagnostics = diagnostics(&events);
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(diagnostics[0], Diagnostic::InvalidControl { .. }));

        let frames = frames(&events);
        assert_eq!(frames.len(), (48000 - 1024) / 512 + 1);
        assert!(frames
            .iter()
            .all(|f| f.get("rms").is_some() && f.get("spectrum").is_some()));
    }

    #[test]
    fn test_missing_channels_read_as_silence() {
        let cfg = config(RealtimePolicy::Allow).with_channels(2);
        let features = FeatureSet::from_names(&["rms"], 1024).unwrap();
        let (mut session, mut handle) = RealtimeSession::start(cfg, SR, features).unwrap();

        feed(&mut session, &tone(48000 * 2), 480, 0);
        assert_abs_diff_eq!(handle.loudness().integrated, -23.0, epsilon = 0.1);
        handle.shutdown().unwrap();
        let events = handle.drain_events();

        assert!(diagnostics(&events).is_empty());
        assert_eq!(frames(&events).len(), (48000 * 2 - 1024) / 512 + 1);
    }

    #[test]
    fn test_reset_restarts_indexing() {
        let features = FeatureSet::from_names(&["rms"], 1024).unwrap();
        let (mut session, mut handle) =
            RealtimeSession::start(config(RealtimePolicy::Allow), SR, features).unwrap();

        feed(&mut session, &tone(2048), 256, 0);
        handle.send(ControlMessage::Reset).unwrap();
        feed(&mut session, &tone(1024), 256, 2048);
        assert_eq!(session.scheduler().write_index(), 1024);
        handle.shutdown().unwrap();

        let starts: Vec<u64> = frames(&handle.drain_events())
            .iter()
            .map(|f| f.sample_index)
            .collect();
        assert_eq!(starts, vec![0, 512, 1024, 0]);
    }

    #[test]
    fn test_shutdown_stops_processing() {
        let (mut session, mut handle) =
            RealtimeSession::start(SessionConfig::default(), SR, FeatureSet::new()).unwrap();
        assert!(handle.is_running());
        handle.shutdown().unwrap();
        assert!(!handle.is_running());
        assert_eq!(session.process(&[&[0.0f32; 2048][..]], &CallbackContext::new(0.0, SR, 2048)), 0);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_invalid_start() {
        let bad = SessionConfig::default().with_hop_size(4096);
        assert!(RealtimeSession::start(bad, SR, FeatureSet::new()).is_err());
        assert!(RealtimeSession::start(SessionConfig::default(), 1000.0, FeatureSet::new()).is_err());
    }
}
