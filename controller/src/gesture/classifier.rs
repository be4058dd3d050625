//! Per-hand gesture classification with frame-count debouncing.
//!
//! Each role owns one `GestureClassifier`.  Every frame the raw gesture is
//! derived from the finger mask plus a few auxiliary distances, then
//! debounced: the reported (stable) gesture only changes once the same raw
//! gesture has repeated for more than `stable_streak` consecutive frames.

use tracing::debug;

use super::code::GestureCode;
use super::finger::{FingerConfig, FingerMask, FingerStateEncoder};
use crate::hand::{HandLandmarks, HandRole, Landmark};

/// Reference distances below this are degenerate.
const DEGENERATE_EPSILON: f32 = 1e-6;

// ── Config ─────────────────────────────────────────────────

/// Thresholds for gesture classification.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    /// Maximum planar index-tip to thumb-tip distance for a pinch.
    pub pinch_distance: f32,
    /// Minimum tip-spread / knuckle-spread ratio for a V gesture.
    pub v_ratio: f32,
    /// Maximum index/middle tip depth difference for two-finger-closed.
    pub closed_depth: f32,
    /// The stable gesture changes once the match streak exceeds this.
    pub stable_streak: u32,
    /// Finger state thresholds.
    pub finger: FingerConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            pinch_distance: 0.05,
            v_ratio: 1.7,
            closed_depth: 0.1,
            stable_streak: 4,
            finger: FingerConfig::default(),
        }
    }
}

// ── State ──────────────────────────────────────────────────

/// Debounce state for one role, persisted across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureState {
    /// Raw gesture of the previous frame.
    pub last_raw: GestureCode,
    /// Gesture reported to the controller.
    pub stable: GestureCode,
    /// Consecutive frames the raw gesture has repeated.
    pub streak: u32,
}

impl Default for GestureState {
    fn default() -> Self {
        Self {
            last_raw: GestureCode::Palm,
            stable: GestureCode::Palm,
            streak: 0,
        }
    }
}

/// Gesture classifier bound to one hand role.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    role: HandRole,
    pub config: ClassifierConfig,
    encoder: FingerStateEncoder,
    state: GestureState,
    last_mask: Option<FingerMask>,
}

impl GestureClassifier {
    pub fn new(role: HandRole, config: ClassifierConfig) -> Self {
        Self {
            role,
            config,
            encoder: FingerStateEncoder::new(config.finger),
            state: GestureState::default(),
            last_mask: None,
        }
    }

    pub fn role(&self) -> HandRole {
        self.role
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    /// Stable gesture as of the last update.
    pub fn stable(&self) -> GestureCode {
        self.state.stable
    }

    /// Finger mask of the last frame that had a hand.
    pub fn last_mask(&self) -> Option<FingerMask> {
        self.last_mask
    }

    /// Classify one frame and return the debounced gesture.  A missing
    /// hand classifies as `Palm` and still goes through the debounce.
    pub fn update(&mut self, hand: Option<&HandLandmarks>) -> GestureCode {
        let raw = match hand {
            Some(hand) => {
                let mask = self.encoder.encode(hand);
                self.last_mask = Some(mask);
                self.classify_raw(mask, hand)
            }
            None => GestureCode::Palm,
        };
        self.debounce(raw)
    }

    /// Raw (undebounced) gesture for a mask and its landmarks.
    pub fn classify_raw(&self, mask: FingerMask, hand: &HandLandmarks) -> GestureCode {
        if (mask == FingerMask::LAST3 || mask == FingerMask::LAST4)
            && hand.distance(Landmark::IndexTip, Landmark::ThumbTip) < self.config.pinch_distance
        {
            return match self.role {
                HandRole::Major => GestureCode::PinchMajor,
                HandRole::Minor => GestureCode::PinchMinor,
            };
        }

        if mask == FingerMask::FIRST2 {
            let tips = hand.distance(Landmark::IndexTip, Landmark::MiddleTip);
            let mut knuckles = hand.distance(Landmark::IndexMcp, Landmark::MiddleMcp);
            if knuckles < DEGENERATE_EPSILON {
                debug!(role = self.role.as_str(), "degenerate knuckle spread, using fallback");
                knuckles = self.config.finger.fallback_denominator;
            }
            if tips / knuckles > self.config.v_ratio {
                return GestureCode::VGest;
            }
            if hand.depth_difference(Landmark::IndexTip, Landmark::MiddleTip) < self.config.closed_depth {
                return GestureCode::TwoFingerClosed;
            }
            return GestureCode::Mid;
        }

        GestureCode::from_mask(mask).unwrap_or(GestureCode::Palm)
    }

    /// Feed one raw gesture through the streak counter.
    pub fn debounce(&mut self, raw: GestureCode) -> GestureCode {
        let st = &mut self.state;
        if raw == st.last_raw {
            st.streak = st.streak.saturating_add(1);
        } else {
            st.streak = 0;
        }
        st.last_raw = raw;

        if st.streak > self.config.stable_streak && st.stable != raw {
            debug!(
                role = self.role.as_str(),
                from = st.stable.as_str(),
                to = raw.as_str(),
                "stable gesture changed"
            );
            st.stable = raw;
        }
        st.stable
    }

    /// Forget all debounce history.
    pub fn reset(&mut self) {
        self.state = GestureState::default();
        self.last_mask = None;
    }
}

// ── Tests ──────────────────────────────────────────────────
