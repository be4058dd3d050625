//! Per-stream frame loop.
//!
//! A stream owns its source, detector, engine and injector, and runs on a
//! dedicated thread.  Exactly one frame is in flight per stream.  The
//! processing gate and the shutdown flag are checked between frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use super::{ConfidenceFilter, FrameSource, LandmarkDetector, LandmarkSnapshot, ProcessingGate, StreamStatus};
use crate::config::{ControllerConfig, PipelineConfig};
use crate::control::PointerInjector;
use crate::engine::GestureEngine;
use crate::mapping::ActionMappingStore;

/// Everything one stream needs, moved onto its thread.
pub struct Stream {
    pub name: String,
    source: Box<dyn FrameSource + Send>,
    detector: Box<dyn LandmarkDetector + Send>,
    store: Box<dyn ActionMappingStore + Send>,
    injector: Box<dyn PointerInjector + Send>,
    engine: GestureEngine,
    filter: ConfidenceFilter,
    gate: ProcessingGate,
    shutdown: Arc<AtomicBool>,
    snapshot: LandmarkSnapshot,
    status: StreamStatus,
    suspended: bool,
}

/// Handles on a running stream.
pub struct StreamHandle {
    pub name: String,
    pub snapshot: LandmarkSnapshot,
    pub status: StreamStatus,
    pub thread: JoinHandle<anyhow::Result<()>>,
}

impl Stream {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn FrameSource + Send>,
        detector: Box<dyn LandmarkDetector + Send>,
        store: Box<dyn ActionMappingStore + Send>,
        injector: Box<dyn PointerInjector + Send>,
        controller: &ControllerConfig,
        pipeline: &PipelineConfig,
        gate: ProcessingGate,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            detector,
            store,
            injector,
            engine: GestureEngine::new(controller),
            filter: ConfidenceFilter::new(
                pipeline.min_detection_confidence,
                pipeline.min_tracking_confidence,
                pipeline.max_hands,
            ),
            gate,
            shutdown,
            snapshot: LandmarkSnapshot::default(),
            status: StreamStatus::default(),
            suspended: false,
        }
    }

    pub fn snapshot(&self) -> LandmarkSnapshot {
        self.snapshot.clone()
    }

    pub fn status(&self) -> StreamStatus {
        self.status.clone()
    }

    pub fn engine(&self) -> &GestureEngine {
        &self.engine
    }

    /// Start the loop on its own thread.
    pub fn spawn(mut self) -> anyhow::Result<StreamHandle> {
        let name = self.name.clone();
        let snapshot = self.snapshot();
        let status = self.status();
        let thread = std::thread::Builder::new()
            .name(format!("stream-{name}"))
            .spawn(move || self.run())
            .with_context(|| format!("spawning stream {name}"))?;
        Ok(StreamHandle {
            name,
            snapshot,
            status,
            thread,
        })
    }

    /// Process frames until the source ends, fails, or shutdown is
    /// requested.  Only an acquisition failure returns an error.
    pub fn run(&mut self) -> anyhow::Result<()> {
        info!(stream = %self.name, "stream started");
        let result = self.run_inner();
        if let Err(ref e) = result {
            error!(stream = %self.name, "frame acquisition failed: {e:#}");
            let msg = format!("{e:#}");
            self.status.update(|s| s.error = Some(msg));
        }
        // Never leave a button held when the stream goes away.
        self.engine.suspend(self.injector.as_mut());
        self.status.update(|s| s.finished = true);
        info!(
            stream = %self.name,
            frames = self.engine.frames(),
            skipped = self.engine.skipped(),
            "stream finished"
        );
        result
    }

    fn run_inner(&mut self) -> anyhow::Result<()> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                debug!(stream = %self.name, "shutdown requested");
                return Ok(());
            }
            let Some(frame) = self.source.read_frame()? else {
                info!(stream = %self.name, "end of stream");
                return Ok(());
            };
            self.step(&frame);
        }
    }

    /// Detection, gate check, and dispatch for one frame.
    fn step(&mut self, frame: &super::Frame) {
        self.status.update(|s| s.frames += 1);
        let hands = match self.detector.detect(frame) {
            Ok(hands) => self.filter.apply(hands),
            Err(e) => {
                warn!(stream = %self.name, frame = frame.index, "detection failed: {e:#}");
                return;
            }
        };
        self.snapshot.publish(frame.index, &hands);

        if !self.gate.is_enabled() {
            if !self.suspended {
                info!(stream = %self.name, "gesture processing disabled");
                self.engine.suspend(self.injector.as_mut());
                self.suspended = true;
                self.publish_engine_state();
            }
            return;
        }
        if self.suspended {
            info!(stream = %self.name, "gesture processing enabled");
            self.suspended = false;
        }

        let outcome = self
            .engine
            .process(&hands, self.store.as_ref(), self.injector.as_mut());
        if let Some(action) = outcome.action {
            debug!(
                stream = %self.name,
                frame = frame.index,
                gesture = outcome.acting.as_str(),
                action = action.as_str(),
                "frame dispatched"
            );
        }
        self.status.update(|s| s.processed += 1);
        self.publish_engine_state();
    }

    fn publish_engine_state(&self) {
        let ctl = self.engine.controller();
        let major = self.engine.classifier(crate::hand::HandRole::Major).stable();
        let minor = self.engine.classifier(crate::hand::HandRole::Minor).stable();
        self.status.update(|s| {
            s.major = major.as_str().to_string();
            s.minor = minor.as_str().to_string();
            s.drag = ctl.drag_active();
            s.pinch_major = ctl.pinch_major_active();
            s.pinch_minor = ctl.pinch_minor_active();
        });
    }
}
