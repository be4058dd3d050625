//! Pinch continuous controller.
//!
//! While a pinch is held the index tip's displacement from where the pinch
//! started becomes a level on one axis.  A level only commits after it has
//! held steady for `hold_frames` consecutive frames, so tremor never turns
//! into volume or scroll changes.

use crate::hand::{HandLandmarks, Landmark};

/// Axis a pinch displacement is locked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinchAxis {
    Vertical,
    Horizontal,
}

impl PinchAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vertical => "vertical",
            Self::Horizontal => "horizontal",
        }
    }
}

/// Pinch controller tuning.
#[derive(Debug, Clone, Copy)]
pub struct PinchConfig {
    /// Minimum |level| for an axis to be selected, and the tolerance
    /// within which a level counts as held.
    pub threshold: f32,
    /// Normalized displacement to level multiplier.
    pub level_scale: f32,
    /// Consecutive held frames before a level commits.
    pub hold_frames: u32,
}

impl Default for PinchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            level_scale: 10.0,
            hold_frames: 5,
        }
    }
}

/// A committed level, ready to apply to the control bound to its axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchCommit {
    pub axis: PinchAxis,
    pub level: f32,
}

/// Tracker for one ongoing pinch interaction.  Reset, not recreated, each
/// time the pinch re-engages.
#[derive(Debug, Clone, Default)]
pub struct PinchSession {
    pub config: PinchConfig,
    origin: (f32, f32),
    committed_level: f32,
    pending_level: f32,
    hold_frames: u32,
    locked_axis: Option<PinchAxis>,
}

impl PinchSession {
    pub fn new(config: PinchConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn origin(&self) -> (f32, f32) {
        self.origin
    }

    pub fn committed_level(&self) -> f32 {
        self.committed_level
    }

    pub fn pending_level(&self) -> f32 {
        self.pending_level
    }

    pub fn hold_count(&self) -> u32 {
        self.hold_frames
    }

    pub fn locked_axis(&self) -> Option<PinchAxis> {
        self.locked_axis
    }

    /// Start a new interaction at the current index tip.
    pub fn begin(&mut self, hand: &HandLandmarks) {
        let tip = hand.point(Landmark::IndexTip);
        self.origin = (tip.x, tip.y);
        self.committed_level = 0.0;
        self.pending_level = 0.0;
        self.hold_frames = 0;
        self.locked_axis = None;
        tracing::debug!(x = tip.x, y = tip.y, "pinch session started");
    }

    /// Advance one frame.  Returns a commit on the frame the hold count
    /// reaches the configured number of frames.
    pub fn update(&mut self, hand: &HandLandmarks) -> Option<PinchCommit> {
        let tip = hand.point(Landmark::IndexTip);
        let lvx = round_tenth((tip.x - self.origin.0) * self.config.level_scale);
        // Screen y grows downward; raising the hand is positive.
        let lvy = round_tenth((self.origin.1 - tip.y) * self.config.level_scale);

        let threshold = self.config.threshold;
        let (axis, candidate) = if lvy.abs() > lvx.abs() && lvy.abs() > threshold {
            (PinchAxis::Vertical, lvy)
        } else if lvx.abs() > threshold {
            (PinchAxis::Horizontal, lvx)
        } else {
            return None;
        };
        self.locked_axis = Some(axis);

        if (self.pending_level - candidate).abs() < threshold {
            self.hold_frames += 1;
        } else {
            self.pending_level = candidate;
            self.hold_frames = 0;
        }

        if self.hold_frames >= self.config.hold_frames {
            self.hold_frames = 0;
            self.committed_level = self.pending_level;
            tracing::debug!(
                axis = axis.as_str(),
                level = self.committed_level,
                "pinch level committed"
            );
            return Some(PinchCommit {
                axis,
                level: self.committed_level,
            });
        }
        None
    }
}

fn round_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}
