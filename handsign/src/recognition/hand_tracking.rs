//! Hand keypoint data structures and observation validation.
//!
//! Models the 21 landmarks per hand produced by an external hand-landmark
//! detector (wrist first, then four points per finger, thumb to pinky).
//! Coordinates are normalized to the frame: x to the right, y downward,
//! z as relative depth from the camera.

use thiserror::Error;
use tracing::debug;

// ── Landmark definitions ───────────────────────────────────

/// The 21 hand landmarks, in detector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
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

/// Total number of keypoints per hand.
pub const KEYPOINT_COUNT: usize = 21;

impl HandLandmark {
    /// Convert landmark enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }
}

// ── Fingers ────────────────────────────────────────────────

/// The five fingers, in feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// All fingers, thumb first.
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Index => "index",
            Self::Middle => "middle",
            Self::Ring => "ring",
            Self::Pinky => "pinky",
        }
    }

    /// The finger's four landmarks from base to tip.
    pub fn chain(&self) -> [HandLandmark; 4] {
        use HandLandmark::*;
        match self {
            Self::Thumb => [ThumbCmc, ThumbMcp, ThumbIp, ThumbTip],
            Self::Index => [IndexMcp, IndexPip, IndexDip, IndexTip],
            Self::Middle => [MiddleMcp, MiddlePip, MiddleDip, MiddleTip],
            Self::Ring => [RingMcp, RingPip, RingDip, RingTip],
            Self::Pinky => [PinkyMcp, PinkyPip, PinkyDip, PinkyTip],
        }
    }
}

// ── Handedness ─────────────────────────────────────────────

/// Which hand the detector believes it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Handedness {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a handedness label. Anything unrecognized is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Self::Left,
            "right" | "r" => Self::Right,
            _ => Self::Unknown,
        }
    }
}

// ── Keypoint ───────────────────────────────────────────────

/// A normalized 3D landmark position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Keypoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ── Errors ─────────────────────────────────────────────────

/// A hand observation that cannot be turned into features.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("expected {expected} keypoints, got {got}")]
    WrongKeypointCount { expected: usize, got: usize },
    #[error("keypoint {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
    #[error("expected one or two hands, got {0}")]
    HandCount(usize),
}

// ── Observation ────────────────────────────────────────────

/// All keypoints of one hand in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    pub handedness: Handedness,
    /// 21 keypoints indexed by `HandLandmark`.
    pub keypoints: Vec<Keypoint>,
}

impl HandObservation {
    pub fn new(handedness: Handedness, keypoints: Vec<Keypoint>) -> Self {
        Self {
            handedness,
            keypoints,
        }
    }

    /// Check the keypoint count and that every coordinate is finite.
    pub fn validate(&self) -> Result<(), ObservationError> {
        if self.keypoints.len() != KEYPOINT_COUNT {
            debug!(
                "Hand observation: expected {} keypoints, got {} for {:?}",
                KEYPOINT_COUNT,
                self.keypoints.len(),
                self.handedness,
            );
            return Err(ObservationError::WrongKeypointCount {
                expected: KEYPOINT_COUNT,
                got: self.keypoints.len(),
            });
        }
        if let Some(index) = self.keypoints.iter().position(|k| !k.is_finite()) {
            return Err(ObservationError::NonFiniteCoordinate { index });
        }
        Ok(())
    }

    /// Keypoint for a landmark. Only meaningful after `validate` succeeds.
    pub fn point(&self, landmark: HandLandmark) -> Keypoint {
        self.keypoints
            .get(landmark.index())
            .copied()
            .unwrap_or_default()
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Build a right hand with the wrist at (0.5, 0.8) and every finger
/// pointing straight up; each finger can then be curled individually.
#[cfg(test)]
pub(crate) fn open_hand(handedness: Handedness) -> HandObservation {
    let mut points = vec![Keypoint::default(); KEYPOINT_COUNT];
    points[HandLandmark::Wrist.index()] = Keypoint::new(0.5, 0.8, 0.0);

    // Thumb sticks out sideways, toward the image left for a right hand.
    let side = if handedness == Handedness::Left { 1.0 } else { -1.0 };
    let thumb = [(0.04, 0.76), (0.07, 0.72), (0.10, 0.69), (0.13, 0.66)];
    for (landmark, (dx, y)) in Finger::Thumb.chain().iter().zip(thumb) {
        points[landmark.index()] = Keypoint::new(0.5 + side * dx, y, 0.0);
    }

    let columns = [
        (Finger::Index, 0.47),
        (Finger::Middle, 0.50),
        (Finger::Ring, 0.53),
        (Finger::Pinky, 0.56),
    ];
    for (finger, x) in columns {
        for (step, landmark) in finger.chain().iter().enumerate() {
            let y = 0.62 - step as f32 * 0.06;
            points[landmark.index()] = Keypoint::new(x, y, 0.0);
        }
    }
    HandObservation::new(handedness, points)
}

/// Fold a non-thumb finger so that its tip drops below the PIP joint.
#[cfg(test)]
pub(crate) fn curl(hand: &mut HandObservation, finger: Finger) {
    let [mcp, pip, dip, tip] = finger.chain();
    if finger == Finger::Thumb {
        let ip = hand.point(HandLandmark::ThumbIp);
        hand.keypoints[HandLandmark::ThumbTip.index()] = Keypoint::new(ip.x, ip.y + 0.03, 0.0);
        return;
    }
    let base = hand.point(mcp);
    let joint = hand.point(pip);
    hand.keypoints[dip.index()] = Keypoint::new(joint.x, joint.y + 0.03, -0.01);
    hand.keypoints[tip.index()] = Keypoint::new(base.x, joint.y + 0.05, -0.02);
}

// ── Tests ──────────────────────────────────────────────────
