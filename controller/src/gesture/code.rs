//! Discrete gesture codes and their names.

use super::finger::FingerMask;

/// Recognized gestures.  `Palm` is the default and fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureCode {
    /// All four fingers closed.
    Fist,
    /// Only the pinky open.
    Pinky,
    /// Only the ring finger open.
    Ring,
    /// Only the middle finger open, or index+middle together with
    /// separated depths.
    Mid,
    /// Middle, ring and pinky open.
    Last3,
    /// Only the index open.
    Index,
    /// Index and middle open (refined into VGest / TwoFingerClosed / Mid).
    First2,
    /// All four fingers open.
    Last4,
    /// Thumb only.  Not produced by the 4-finger mask.
    Thumb,
    /// Open palm; the resting default.
    Palm,
    /// Index and middle spread apart.
    VGest,
    /// Index and middle held together.
    TwoFingerClosed,
    /// Thumb-index pinch on the Major hand.
    PinchMajor,
    /// Thumb-index pinch on the Minor hand.
    PinchMinor,
}

impl GestureCode {
    pub const ALL: [GestureCode; 14] = [
        Self::Fist,
        Self::Pinky,
        Self::Ring,
        Self::Mid,
        Self::Last3,
        Self::Index,
        Self::First2,
        Self::Last4,
        Self::Thumb,
        Self::Palm,
        Self::VGest,
        Self::TwoFingerClosed,
        Self::PinchMajor,
        Self::PinchMinor,
    ];

    /// Name used in the mapping store and over IPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fist => "fist",
            Self::Pinky => "pinky",
            Self::Ring => "ring",
            Self::Mid => "mid",
            Self::Last3 => "last3",
            Self::Index => "index",
            Self::First2 => "first2",
            Self::Last4 => "last4",
            Self::Thumb => "thumb",
            Self::Palm => "palm",
            Self::VGest => "v-gest",
            Self::TwoFingerClosed => "two-finger-closed",
            Self::PinchMajor => "pinch-major",
            Self::PinchMinor => "pinch-minor",
        }
    }

    /// Parse a gesture name.  Accepts the kebab-case names and the
    /// upper-case underscore spelling (`V_GEST`) of older mapping files.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = normalize_name(name);
        Self::ALL.iter().copied().find(|g| g.as_str() == normalized)
    }

    /// Conversion table from finger masks to gestures.  Masks without a
    /// named gesture return None.  An open hand (1111) that is not pinching
    /// is `Palm`; `Last4` only names that mask in mapping files.
    pub fn from_mask(mask: FingerMask) -> Option<Self> {
        match mask.bits() {
            0b0000 => Some(Self::Fist),
            0b0001 => Some(Self::Pinky),
            0b0010 => Some(Self::Ring),
            0b0100 => Some(Self::Mid),
            0b0111 => Some(Self::Last3),
            0b1000 => Some(Self::Index),
            0b1100 => Some(Self::First2),
            0b1111 => Some(Self::Palm),
            _ => None,
        }
    }
}

/// Lower-case a gesture name and turn underscores into dashes.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mask_named_values() {
        let table = [
            (0b0000, GestureCode::Fist),
            (0b0001, GestureCode::Pinky),
            (0b0010, GestureCode::Ring),
            (0b0100, GestureCode::Mid),
            (0b0111, GestureCode::Last3),
            (0b1000, GestureCode::Index),
            (0b1100, GestureCode::First2),
            (0b1111, GestureCode::Palm),
        ];
        for (bits, gesture) in table {
            let mask = FingerMask::from_bits(bits).unwrap();
            assert_eq!(GestureCode::from_mask(mask), Some(gesture));
        }
    }

    #[test]
    fn test_from_mask_unnamed_values() {
        for bits in [0b0011, 0b0101, 0b1010, 0b1110] {
            let mask = FingerMask::from_bits(bits).unwrap();
            assert_eq!(GestureCode::from_mask(mask), None);
        }
    }

    #[test]
    fn test_from_name_accepts_legacy_spelling() {
        assert_eq!(GestureCode::from_name("V_GEST"), Some(GestureCode::VGest));
        assert_eq!(GestureCode::from_name("TWO_FINGER_CLOSED"), Some(GestureCode::TwoFingerClosed));
        assert_eq!(GestureCode::from_name("pinch-minor"), Some(GestureCode::PinchMinor));
        assert_eq!(GestureCode::from_name("wave"), None);
    }

    #[test]
    fn test_names_unique() {
        for (i, a) in GestureCode::ALL.iter().enumerate() {
            for b in &GestureCode::ALL[i + 1..] {
                assert_ne!(a.as_str(), b.as_str());
            }
        }
    }
}
