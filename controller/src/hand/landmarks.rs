//! Hand landmark data as produced by the external landmark detector.
//!
//! Models the 21 keypoints the detector reports per hand (normalized image
//! coordinates plus relative depth) together with the handedness label.
//! A `HandLandmarks` value is immutable once built.

use tracing::debug;

use crate::sexp;

// ── Landmark definitions ───────────────────────────────────

/// The 21 hand keypoints, in detector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Landmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

impl Landmark {
    /// Convert landmark enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The landmark used as the palm center for cursor mapping.
    pub fn palm_center() -> Self {
        Self::MiddleMcp
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }
}

// ── Handedness ─────────────────────────────────────────────

/// Handedness label reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Parse a detector label ("Left", "right", ...).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

// ── Points ─────────────────────────────────────────────────

/// One normalized keypoint.  `x` and `y` are in [0,1] relative to the
/// frame; `z` is depth relative to the wrist.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Distance in the image plane (x, y only).
    pub fn planar_distance(&self, other: &LandmarkPoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ── Hand ───────────────────────────────────────────────────

/// The 21 landmarks of one detected hand plus its handedness label.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    handedness: Handedness,
    score: f32,
    points: [LandmarkPoint; LANDMARK_COUNT],
}

impl HandLandmarks {
    pub fn new(handedness: Handedness, points: [LandmarkPoint; LANDMARK_COUNT]) -> Self {
        Self {
            handedness,
            score: 1.0,
            points,
        }
    }

    /// Build from a detector point list.  Returns None unless exactly 21
    /// points are supplied.
    pub fn from_points(handedness: Handedness, points: &[LandmarkPoint]) -> Option<Self> {
        let points: [LandmarkPoint; LANDMARK_COUNT] = match points.try_into() {
            Ok(p) => p,
            Err(_) => {
                debug!(
                    "Hand landmarks: expected {} points, got {} for {:?}",
                    LANDMARK_COUNT,
                    points.len(),
                    handedness,
                );
                return None;
            }
        };
        Some(Self::new(handedness, points))
    }

    /// Attach the detector's handedness confidence.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn points(&self) -> &[LandmarkPoint; LANDMARK_COUNT] {
        &self.points
    }

    pub fn point(&self, landmark: Landmark) -> LandmarkPoint {
        self.points[landmark.index()]
    }

    /// Planar distance between two landmarks.
    pub fn distance(&self, a: Landmark, b: Landmark) -> f32 {
        self.point(a).planar_distance(&self.point(b))
    }

    /// Planar distance from `a` to `b`, positive when `a` sits above `b`
    /// in the image (smaller y), negative otherwise.
    pub fn signed_distance(&self, a: Landmark, b: Landmark) -> f32 {
        let sign = if self.point(a).y < self.point(b).y {
            1.0
        } else {
            -1.0
        };
        self.distance(a, b) * sign
    }

    /// Absolute depth difference between two landmarks.
    pub fn depth_difference(&self, a: Landmark, b: Landmark) -> f32 {
        (self.point(a).z - self.point(b).z).abs()
    }

    /// S-expression form, also the replay line format for one hand.
    pub fn to_sexp(&self) -> String {
        let points: Vec<String> = self
            .points
            .iter()
            .map(|p| format!("({:.4} {:.4} {:.4})", p.x, p.y, p.z))
            .collect();
        format!(
            "(:label {} :score {:.2} :points ({}))",
            self.handedness.as_str(),
            self.score,
            points.join(" "),
        )
    }

    /// Parse one hand from its s-expression form.
    pub fn from_sexp(value: &lexpr::Value) -> Option<Self> {
        let label = sexp::get_keyword(value, "label")?;
        let handedness = Handedness::from_label(&label)?;
        let score = sexp::get_float(value, "score").unwrap_or(1.0) as f32;
        let raw_points = sexp::list_items(sexp::plist_get(value, "points")?)?;

        let mut points = Vec::with_capacity(LANDMARK_COUNT);
        for raw in raw_points {
            let coords = sexp::list_items(raw)?;
            if coords.len() != 3 {
                return None;
            }
            points.push(LandmarkPoint::new(
                sexp::as_f64(coords[0])? as f32,
                sexp::as_f64(coords[1])? as f32,
                sexp::as_f64(coords[2])? as f32,
            ));
        }
        Self::from_points(handedness, &points).map(|h| h.with_score(score))
    }
}

/// Render a full detection (0-2 hands) as an s-expression list.
pub fn hands_sexp(hands: &[HandLandmarks]) -> String {
    if hands.is_empty() {
        return "nil".to_string();
    }
    let parts: Vec<String> = hands.iter().map(|h| h.to_sexp()).collect();
    format!("({})", parts.join(" "))
}

// ── Test helpers ───────────────────────────────────────────

/// A relaxed open hand, fingers pointing up, centered in the frame.
#[cfg(test)]
pub(crate) fn open_hand(handedness: Handedness) -> HandLandmarks {
    let mut points = [LandmarkPoint::default(); LANDMARK_COUNT];
    points[Landmark::Wrist.index()] = LandmarkPoint::new(0.50, 0.90, 0.0);
    // Thumb out to the side, well away from the index tip.
    points[Landmark::ThumbCmc.index()] = LandmarkPoint::new(0.42, 0.85, 0.0);
    points[Landmark::ThumbMcp.index()] = LandmarkPoint::new(0.36, 0.80, 0.0);
    points[Landmark::ThumbIp.index()] = LandmarkPoint::new(0.32, 0.76, 0.0);
    points[Landmark::ThumbTip.index()] = LandmarkPoint::new(0.28, 0.72, 0.0);
    let columns = [
        (Landmark::IndexMcp, 0.44),
        (Landmark::MiddleMcp, 0.50),
        (Landmark::RingMcp, 0.56),
        (Landmark::PinkyMcp, 0.62),
    ];
    for (mcp, x) in columns {
        let base = mcp.index();
        points[base] = LandmarkPoint::new(x, 0.70, 0.0);
        points[base + 1] = LandmarkPoint::new(x, 0.60, 0.0);
        points[base + 2] = LandmarkPoint::new(x, 0.52, 0.0);
        points[base + 3] = LandmarkPoint::new(x, 0.45, 0.0);
    }
    HandLandmarks::new(handedness, points)
}

/// Copy of `hand` with one landmark moved.
#[cfg(test)]
pub(crate) fn with_point(hand: &HandLandmarks, landmark: Landmark, x: f32, y: f32, z: f32) -> HandLandmarks {
    let mut points = *hand.points();
    points[landmark.index()] = LandmarkPoint::new(x, y, z);
    HandLandmarks::new(hand.handedness(), points).with_score(hand.score())
}

/// Copy of `hand` translated by (dx, dy).
#[cfg(test)]
pub(crate) fn translated(hand: &HandLandmarks, dx: f32, dy: f32) -> HandLandmarks {
    let mut points = *hand.points();
    for p in points.iter_mut() {
        p.x += dx;
        p.y += dy;
    }
    HandLandmarks::new(hand.handedness(), points).with_score(hand.score())
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_indices() {
        assert_eq!(Landmark::Wrist.index(), 0);
        assert_eq!(Landmark::ThumbTip.index(), 4);
        assert_eq!(Landmark::IndexTip.index(), 8);
        assert_eq!(Landmark::MiddleMcp.index(), 9);
        assert_eq!(Landmark::PinkyTip.index(), 20);
        assert_eq!(Landmark::palm_center().index(), 9);
    }

    #[test]
    fn test_handedness_from_label() {
        assert_eq!(Handedness::from_label("Right"), Some(Handedness::Right));
        assert_eq!(Handedness::from_label("left"), Some(Handedness::Left));
        assert_eq!(Handedness::from_label("both"), None);
    }

    #[test]
    fn test_from_points_wrong_count() {
        let points = vec![LandmarkPoint::default(); 10];
        assert!(HandLandmarks::from_points(Handedness::Left, &points).is_none());
        let points = vec![LandmarkPoint::default(); LANDMARK_COUNT];
        assert!(HandLandmarks::from_points(Handedness::Left, &points).is_some());
    }

    #[test]
    fn test_distance_is_planar() {
        let hand = open_hand(Handedness::Right);
        let hand = with_point(&hand, Landmark::ThumbTip, 0.0, 0.0, 5.0);
        let hand = with_point(&hand, Landmark::IndexTip, 0.3, 0.4, -5.0);
        let dist = hand.distance(Landmark::ThumbTip, Landmark::IndexTip);
        assert!((dist - 0.5).abs() < 1e-5, "Expected 0.5, got {}", dist);
    }

    #[test]
    fn test_signed_distance_sign() {
        let hand = open_hand(Handedness::Right);
        // Index tip is above its MCP in an open hand.
        assert!(hand.signed_distance(Landmark::IndexTip, Landmark::IndexMcp) > 0.0);
        assert!(hand.signed_distance(Landmark::IndexMcp, Landmark::IndexTip) < 0.0);
    }

    #[test]
    fn test_depth_difference() {
        let hand = open_hand(Handedness::Left);
        let hand = with_point(&hand, Landmark::IndexTip, 0.4, 0.4, -0.05);
        let hand = with_point(&hand, Landmark::MiddleTip, 0.5, 0.4, 0.07);
        let dz = hand.depth_difference(Landmark::IndexTip, Landmark::MiddleTip);
        assert!((dz - 0.12).abs() < 1e-5);
    }

    #[test]
    fn test_sexp_round_trip_preserves_geometry() {
        let hand = open_hand(Handedness::Left).with_score(0.8);
        let value = lexpr::from_str(&hand.to_sexp()).unwrap();
        let parsed = HandLandmarks::from_sexp(&value).unwrap();
        assert_eq!(parsed.handedness(), Handedness::Left);
        assert!((parsed.score() - 0.8).abs() < 1e-3);
        let tip = parsed.point(Landmark::IndexTip);
        assert!((tip.x - 0.44).abs() < 1e-3);
        assert!((tip.y - 0.45).abs() < 1e-3);
    }

    #[test]
    fn test_hands_sexp_empty() {
        assert_eq!(hands_sexp(&[]), "nil");
    }
}
