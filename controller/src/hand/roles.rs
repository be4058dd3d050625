//! Major/Minor role assignment for the hands detected in one frame.

use super::landmarks::{HandLandmarks, Handedness};

/// Control role of a hand.  The Major hand is the user's dominant hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandRole {
    Major,
    Minor,
}

impl HandRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

/// Per-frame role assignment.  A role with no matching hand is `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAssignment<'a> {
    pub major: Option<&'a HandLandmarks>,
    pub minor: Option<&'a HandLandmarks>,
}

impl<'a> RoleAssignment<'a> {
    pub fn hand(&self, role: HandRole) -> Option<&'a HandLandmarks> {
        match role {
            HandRole::Major => self.major,
            HandRole::Minor => self.minor,
        }
    }
}

/// Assigns detected hands to roles from their handedness labels and the
/// configured dominant-hand preference.  Stateless; recomputed per frame.
#[derive(Debug, Clone, Copy)]
pub struct HandRoleClassifier {
    /// True when the right hand is the dominant (Major) hand.
    pub dominant_right: bool,
}

impl Default for HandRoleClassifier {
    fn default() -> Self {
        Self {
            dominant_right: true,
        }
    }
}

impl HandRoleClassifier {
    pub fn new(dominant_right: bool) -> Self {
        Self { dominant_right }
    }

    /// Split up to two detected hands into roles.  Hands beyond the first
    /// two are ignored; when both carry the same label the later one wins.
    pub fn classify<'a>(&self, hands: &'a [HandLandmarks]) -> RoleAssignment<'a> {
        let mut left = None;
        let mut right = None;
        for hand in hands.iter().take(2) {
            match hand.handedness() {
                Handedness::Right => right = Some(hand),
                Handedness::Left => left = Some(hand),
            }
        }

        if self.dominant_right {
            RoleAssignment {
                major: right,
                minor: left,
            }
        } else {
            RoleAssignment {
                major: left,
                minor: right,
            }
        }
    }
}
