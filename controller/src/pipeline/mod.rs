//! Frame acquisition, detection, and the per-stream processing loop.
//!
//! - `replay`: recorded detector output as a frame source
//! - `stream`: one thread per stream running detection + engine
//!
//! Camera capture and landmark inference are external collaborators that
//! plug in through `FrameSource` and `LandmarkDetector`.

pub mod replay;
pub mod stream;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::hand::{hands_sexp, HandLandmarks};
use crate::sexp::bool_sexp;

pub use replay::{RecordedDetector, ReplaySource};
pub use stream::{Stream, StreamHandle};

// ── Frames ─────────────────────────────────────────────────

/// Contents of one acquired frame.
#[derive(Debug, Clone)]
pub enum FramePayload {
    /// Packed RGB8 image for a live detector.
    Image { width: u32, height: u32, rgb: Vec<u8> },
    /// Detector output captured earlier.
    Recorded(Vec<HandLandmarks>),
}

/// One acquired frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the stream, starting at 0.
    pub index: u64,
    /// Offset from the start of the stream.
    pub timestamp: Duration,
    pub payload: FramePayload,
}

/// Blocking frame acquisition.  `Ok(None)` is a clean end of stream; an
/// error ends the stream.
pub trait FrameSource {
    fn read_frame(&mut self) -> anyhow::Result<Option<Frame>>;
}

/// Hand landmark inference.  A failure skips the frame.
pub trait LandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<HandLandmarks>>;
}

// ── Confidence filter ──────────────────────────────────────

/// Applies the detection/tracking confidence thresholds and the hand
/// limit to raw detector output.
#[derive(Debug, Clone)]
pub struct ConfidenceFilter {
    pub min_detection: f32,
    pub min_tracking: f32,
    pub max_hands: usize,
    tracking: bool,
}

impl ConfidenceFilter {
    pub fn new(min_detection: f32, min_tracking: f32, max_hands: usize) -> Self {
        Self {
            min_detection,
            min_tracking,
            max_hands,
            tracking: false,
        }
    }

    /// Whether the previous frame kept any hands.
    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Keep the first `max_hands` hands scoring at or above the active
    /// threshold: tracking while the previous frame had hands, detection
    /// otherwise.
    pub fn apply(&mut self, hands: Vec<HandLandmarks>) -> Vec<HandLandmarks> {
        let threshold = if self.tracking {
            self.min_tracking
        } else {
            self.min_detection
        };
        let kept: Vec<HandLandmarks> = hands
            .into_iter()
            .filter(|h| h.score() >= threshold)
            .take(self.max_hands)
            .collect();
        self.tracking = !kept.is_empty();
        kept
    }
}

// ── Processing gate ────────────────────────────────────────

/// Shared enable flag for gesture processing.  Checked once per frame;
/// a frame already in flight always completes.
#[derive(Debug, Clone)]
pub struct ProcessingGate(Arc<AtomicBool>);

impl ProcessingGate {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn enable(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Published state ────────────────────────────────────────

/// Latest raw detections of one stream, for the presentation path.
#[derive(Debug, Clone, Default)]
pub struct Landmarks {
    pub frame: u64,
    pub hands: Vec<HandLandmarks>,
}

/// Cloneable handle on a stream's latest detections.
#[derive(Debug, Clone, Default)]
pub struct LandmarkSnapshot(Arc<Mutex<Landmarks>>);

impl LandmarkSnapshot {
    pub fn publish(&self, frame: u64, hands: &[HandLandmarks]) {
        let mut latest = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        latest.frame = frame;
        latest.hands = hands.to_vec();
    }

    pub fn latest(&self) -> Landmarks {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn to_sexp(&self) -> String {
        let latest = self.latest();
        format!("(:frame {} :hands {})", latest.frame, hands_sexp(&latest.hands))
    }
}

/// Progress and controller state of one stream.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    pub frames: u64,
    pub processed: u64,
    pub major: String,
    pub minor: String,
    pub drag: bool,
    pub pinch_major: bool,
    pub pinch_minor: bool,
    pub finished: bool,
    pub error: Option<String>,
}

/// Cloneable handle on a stream's status.
#[derive(Debug, Clone, Default)]
pub struct StreamStatus(Arc<Mutex<StreamState>>);

impl StreamStatus {
    pub fn update(&self, f: impl FnOnce(&mut StreamState)) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    pub fn get(&self) -> StreamState {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Generate IPC s-expression for this stream.
    pub fn to_sexp(&self, name: &str) -> String {
        let s = self.get();
        let error = s
            .error
            .as_deref()
            .map(|e| format!(" :error \"{}\"", crate::sexp::escape_string(e)))
            .unwrap_or_default();
        format!(
            "(:name \"{}\" :frames {} :processed {} :major {} :minor {} :drag {} :pinch-major {} :pinch-minor {} :finished {}{})",
            crate::sexp::escape_string(name),
            s.frames,
            s.processed,
            if s.major.is_empty() { "palm" } else { &s.major },
            if s.minor.is_empty() { "palm" } else { &s.minor },
            bool_sexp(s.drag),
            bool_sexp(s.pinch_major),
            bool_sexp(s.pinch_minor),
            bool_sexp(s.finished),
            error,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::landmarks::open_hand;
    use crate::hand::Handedness;

    fn scored(handedness: Handedness, score: f32) -> HandLandmarks {
        open_hand(handedness).with_score(score)
    }

    #[test]
    fn test_filter_drops_low_confidence() {
        let mut filter = ConfidenceFilter::new(0.5, 0.5, 2);
        let kept = filter.apply(vec![
            scored(Handedness::Right, 0.9),
            scored(Handedness::Left, 0.3),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].handedness(), Handedness::Right);
        assert!(filter.is_tracking());
    }

    #[test]
    fn test_filter_caps_hands() {
        let mut filter = ConfidenceFilter::new(0.5, 0.5, 2);
        let kept = filter.apply(vec![
            scored(Handedness::Right, 0.9),
            scored(Handedness::Left, 0.9),
            scored(Handedness::Right, 0.9),
        ]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_filter_tracking_threshold() {
        let mut filter = ConfidenceFilter::new(0.8, 0.4, 2);
        // Not tracking: detection threshold applies.
        assert!(filter.apply(vec![scored(Handedness::Right, 0.6)]).is_empty());
        assert!(!filter.is_tracking());
        assert_eq!(filter.apply(vec![scored(Handedness::Right, 0.9)]).len(), 1);
        // Tracking: the lower threshold applies.
        assert_eq!(filter.apply(vec![scored(Handedness::Right, 0.6)]).len(), 1);
    }

    #[test]
    fn test_gate_shared() {
        let gate = ProcessingGate::new(true);
        let other = gate.clone();
        other.disable();
        assert!(!gate.is_enabled());
        gate.enable();
        assert!(other.is_enabled());
    }

    #[test]
    fn test_snapshot_publish() {
        let snap = LandmarkSnapshot::default();
        assert_eq!(snap.to_sexp(), "(:frame 0 :hands nil)");
        snap.clone().publish(7, &[open_hand(Handedness::Left)]);
        let latest = snap.latest();
        assert_eq!(latest.frame, 7);
        assert_eq!(latest.hands.len(), 1);
        assert!(snap.to_sexp().starts_with("(:frame 7 :hands ((:label left"));
    }

    #[test]
    fn test_status_sexp() {
        let status = StreamStatus::default();
        status.update(|s| {
            s.frames = 3;
            s.drag = true;
            s.error = Some("camera \"0\" gone".to_string());
        });
        let sexp = status.to_sexp("cam");
        assert!(sexp.contains(":frames 3"));
        assert!(sexp.contains(":drag t"));
        assert!(sexp.contains(":major palm"));
        assert!(sexp.contains(":error \"camera \\\"0\\\" gone\""));
    }
}
