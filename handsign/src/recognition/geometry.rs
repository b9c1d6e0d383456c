//! Stateless geometry over normalized keypoints.
//!
//! Every function here is total: degenerate input (coincident points,
//! zero-length segments) yields a defined sentinel instead of NaN.

use super::hand_tracking::{Handedness, Keypoint};

/// Default extension threshold in normalized coordinates.
pub const DEFAULT_EXTENSION_EPSILON: f32 = 0.02;

/// Default palm-direction threshold on the wrist→middle-MCP vector.
pub const DEFAULT_PALM_THRESHOLD: f32 = 0.1;

/// Wrist above this line (smaller y) is `High`.
pub const DEFAULT_POSITION_HIGH: f32 = 0.40;

/// Wrist below this line (larger y) is `Low`.
pub const DEFAULT_POSITION_LOW: f32 = 0.65;

/// Segments shorter than this count as zero-length.
const DEGENERATE_LENGTH: f32 = 1e-6;

// ── Labels ─────────────────────────────────────────────────

/// Coarse direction the palm is pointing, from wrist to middle knuckle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PalmDirection {
    Up,
    Down,
    Left,
    Right,
    Forward,
}

impl PalmDirection {
    pub const ALL: [PalmDirection; 5] = [
        PalmDirection::Up,
        PalmDirection::Down,
        PalmDirection::Left,
        PalmDirection::Right,
        PalmDirection::Forward,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Forward => "forward",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
    }
}

/// Vertical band of the frame the wrist sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandPosition {
    High,
    Middle,
    Low,
}

impl HandPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Middle => "middle",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "middle" => Some(Self::Middle),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

// ── Vectors ────────────────────────────────────────────────

/// Plain 3D vector between keypoints.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Vector pointing from `from` to `to`.
    pub fn between(from: Keypoint, to: Keypoint) -> Self {
        Self {
            x: to.x - from.x,
            y: to.y - from.y,
            z: to.z - from.z,
        }
    }

    pub fn dot(&self, other: &Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }
}

// ── Extension scores ───────────────────────────────────────

/// How far a fingertip sits above its PIP joint (positive = above).
///
/// A non-thumb finger is extended iff the score exceeds ε, i.e.
/// `tip.y < pip.y - ε` with y growing downward.
pub fn vertical_extension_score(tip: Keypoint, pip: Keypoint) -> f32 {
    pip.y - tip.y
}

/// Horizontal reach of the thumb tip past its IP joint, signed so that
/// positive means "away from the palm" for the given hand.
///
/// Frames are mirrored, so a right thumb points toward smaller x and a
/// left thumb toward larger x. With unknown handedness the magnitude of
/// the offset is used.
pub fn horizontal_extension_score(tip: Keypoint, ip: Keypoint, handedness: Handedness) -> f32 {
    let dx = tip.x - ip.x;
    match handedness {
        Handedness::Right => -dx,
        Handedness::Left => dx,
        Handedness::Unknown => dx.abs(),
    }
}

// ── Direction & orientation ────────────────────────────────

/// Palm basis vector from the wrist to the middle-finger MCP.
///
/// Left in normalized units: the palm thresholds are calibrated against
/// the raw offset, not a unit vector.
pub fn direction_vector(wrist: Keypoint, middle_mcp: Keypoint) -> Vec3 {
    Vec3::between(wrist, middle_mcp)
}

/// Classify a palm vector. Vertical dominance wins: `y` is tested before
/// `x`, and anything inside both thresholds is `Forward`.
pub fn classify_palm_direction(vector: Vec3, threshold: f32) -> PalmDirection {
    if vector.y < -threshold {
        PalmDirection::Up
    } else if vector.y > threshold {
        PalmDirection::Down
    } else if vector.x < -threshold {
        PalmDirection::Left
    } else if vector.x > threshold {
        PalmDirection::Right
    } else {
        PalmDirection::Forward
    }
}

/// Angle at `b` between segments b→a and b→c, in degrees [0, 180].
/// Zero-length segments give 0.
pub fn joint_angle_degrees(a: Keypoint, b: Keypoint, c: Keypoint) -> f32 {
    let ba = Vec3::between(b, a);
    let bc = Vec3::between(b, c);
    let denom = ba.length() * bc.length();
    if denom < DEGENERATE_LENGTH {
        return 0.0;
    }
    let cos = (ba.dot(&bc) / denom).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Bucket the wrist height into high / middle / low.
pub fn classify_hand_position(wrist_y: f32, high_below: f32, low_above: f32) -> HandPosition {
    if wrist_y < high_below {
        HandPosition::High
    } else if wrist_y > low_above {
        HandPosition::Low
    } else {
        HandPosition::Middle
    }
}

/// In-plane hand orientation in degrees, range (-180, 180].
///
/// 0° points right in the image, 90° points up (y is flipped so angles
/// read counter-clockwise on screen). Coincident points give 0.
pub fn hand_orientation_degrees(wrist: Keypoint, middle_mcp: Keypoint) -> f32 {
    let dx = middle_mcp.x - wrist.x;
    let dy = wrist.y - middle_mcp.y;
    if dx.abs() < DEGENERATE_LENGTH && dy.abs() < DEGENERATE_LENGTH {
        return 0.0;
    }
    let deg = dy.atan2(dx).to_degrees();
    if deg <= -180.0 {
        deg + 360.0
    } else {
        deg
    }
}

// ── Tests ──────────────────────────────────────────────────
