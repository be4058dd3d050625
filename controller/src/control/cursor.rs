//! Hand-to-cursor mapping with an accelerating transfer curve.
//!
//! The cursor moves by the per-frame hand delta scaled by a ratio that
//! depends on the delta's size: small deltas (tremor) are dropped, medium
//! deltas scale with their length, large deltas get a constant gain.  The
//! new position is relative to the current pointer, not the raw target.

use crate::hand::{HandLandmarks, Landmark};

/// Transfer curve from hand delta (pixels) to cursor delta.
#[derive(Debug, Clone, Copy)]
pub struct AccelerationCurve {
    /// Squared deltas up to this are ignored.
    pub dead_zone_sq: f64,
    /// Squared deltas above this use `flick_gain`.
    pub flick_sq: f64,
    /// Ratio per pixel of delta length between the two bounds.
    pub coefficient: f64,
    /// Constant ratio for fast flicks.
    pub flick_gain: f64,
}

impl Default for AccelerationCurve {
    fn default() -> Self {
        Self {
            dead_zone_sq: 25.0,
            flick_sq: 900.0,
            coefficient: 0.07,
            flick_gain: 2.1,
        }
    }
}

impl AccelerationCurve {
    /// Gain for a squared delta length.
    pub fn ratio(&self, dist_sq: f64) -> f64 {
        if dist_sq <= self.dead_zone_sq {
            0.0
        } else if dist_sq <= self.flick_sq {
            self.coefficient * dist_sq.sqrt()
        } else {
            self.flick_gain
        }
    }
}

/// Last raw hand-derived screen coordinate.  `None` until the hand is seen
/// and again after it is lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorState {
    last_hand_px: Option<(i32, i32)>,
}

impl CursorState {
    pub fn last_hand_px(&self) -> Option<(i32, i32)> {
        self.last_hand_px
    }

    /// Forget the reference so the next sighting starts with a zero delta.
    pub fn reset(&mut self) {
        self.last_hand_px = None;
    }

    /// Raw screen target of the palm center.
    pub fn hand_pixel(hand: &HandLandmarks, screen: (u32, u32)) -> (i32, i32) {
        let p = hand.point(Landmark::palm_center());
        (
            (p.x as f64 * screen.0 as f64) as i32,
            (p.y as f64 * screen.1 as f64) as i32,
        )
    }

    /// Next cursor position from the current pointer position.  Always
    /// records the raw target as the new reference.
    pub fn next_position(
        &mut self,
        hand: &HandLandmarks,
        screen: (u32, u32),
        pointer: (f64, f64),
        curve: &AccelerationCurve,
    ) -> (f64, f64) {
        let (x, y) = Self::hand_pixel(hand, screen);
        let (prev_x, prev_y) = self.last_hand_px.unwrap_or((x, y));
        self.last_hand_px = Some((x, y));

        let dx = (x - prev_x) as f64;
        let dy = (y - prev_y) as f64;
        let ratio = curve.ratio(dx * dx + dy * dy);
        (pointer.0 + dx * ratio, pointer.1 + dy * ratio)
    }
}
