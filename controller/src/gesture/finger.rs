//! Open/closed finger state encoding.
//!
//! Each of the four tracked fingers contributes one bit, MSB first in the
//! order index, middle, ring, pinky.  The thumb is not inspected and never
//! sets a bit; the 4-finger mask is kept as-is (see DESIGN.md).

use tracing::debug;

use crate::hand::{HandLandmarks, Landmark};

/// Denominator magnitude below which the reference distance is treated
/// as degenerate.
const DEGENERATE_EPSILON: f32 = 1e-6;

/// The four tracked fingers, in mask bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// All tracked fingers, MSB first.
    pub const ALL: [Finger; 4] = [Self::Index, Self::Middle, Self::Ring, Self::Pinky];

    /// (tip, knuckle, wrist) landmarks used to judge the finger.
    pub fn triple(&self) -> (Landmark, Landmark, Landmark) {
        match self {
            Self::Index => (Landmark::IndexTip, Landmark::IndexMcp, Landmark::Wrist),
            Self::Middle => (Landmark::MiddleTip, Landmark::MiddleMcp, Landmark::Wrist),
            Self::Ring => (Landmark::RingTip, Landmark::RingMcp, Landmark::Wrist),
            Self::Pinky => (Landmark::PinkyTip, Landmark::PinkyMcp, Landmark::Wrist),
        }
    }

    /// Bit for this finger within a `FingerMask`.
    pub fn bit(&self) -> u8 {
        match self {
            Self::Index => 0b1000,
            Self::Middle => 0b0100,
            Self::Ring => 0b0010,
            Self::Pinky => 0b0001,
        }
    }
}

/// 4-bit open-finger mask.  Always in [0, 15].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FingerMask(u8);

impl FingerMask {
    pub const FIST: FingerMask = FingerMask(0b0000);
    pub const LAST3: FingerMask = FingerMask(0b0111);
    pub const FIRST2: FingerMask = FingerMask(0b1100);
    pub const LAST4: FingerMask = FingerMask(0b1111);

    /// Build from raw bits.  Returns None above 15.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits <= 0b1111 {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_open(&self, finger: Finger) -> bool {
        self.0 & finger.bit() != 0
    }

    fn with_open(self, finger: Finger) -> Self {
        Self(self.0 | finger.bit())
    }
}

/// Thresholds for the finger state encoder.
#[derive(Debug, Clone, Copy)]
pub struct FingerConfig {
    /// A finger is open when its extension ratio exceeds this.
    pub open_ratio: f32,
    /// Denominator substituted for a degenerate reference distance.
    pub fallback_denominator: f32,
}

impl Default for FingerConfig {
    fn default() -> Self {
        Self {
            open_ratio: 0.5,
            fallback_denominator: 0.01,
        }
    }
}

/// Converts one hand's landmarks into a `FingerMask`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerStateEncoder {
    pub config: FingerConfig,
}

impl FingerStateEncoder {
    pub fn new(config: FingerConfig) -> Self {
        Self { config }
    }

    /// Extension ratio of one finger: signed tip-to-knuckle distance over
    /// the knuckle-to-wrist distance, rounded to one decimal.
    pub fn finger_ratio(&self, hand: &HandLandmarks, finger: Finger) -> f32 {
        let (tip, knuckle, wrist) = finger.triple();
        let extension = hand.signed_distance(tip, knuckle);
        let mut reference = hand.distance(knuckle, wrist);
        if reference < DEGENERATE_EPSILON {
            debug!(?finger, "degenerate reference distance, using fallback");
            reference = self.config.fallback_denominator;
        }
        round_tenth(extension / reference)
    }

    /// Encode all four fingers.
    pub fn encode(&self, hand: &HandLandmarks) -> FingerMask {
        Finger::ALL
            .iter()
            .fold(FingerMask::default(), |mask, &finger| {
                if self.finger_ratio(hand, finger) > self.config.open_ratio {
                    mask.with_open(finger)
                } else {
                    mask
                }
            })
    }
}

/// Round to one decimal place.
fn round_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}
