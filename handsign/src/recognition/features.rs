//! Feature extraction: raw hand keypoints to a compact pose description.
//!
//! Each hand is summarized independently (finger extension, palm
//! direction, orientation, joint angles, position bucket). Two-hand
//! relationships are left to the matcher.

use std::collections::VecDeque;

use super::geometry::{
    classify_hand_position, classify_palm_direction, direction_vector, hand_orientation_degrees,
    horizontal_extension_score, joint_angle_degrees, vertical_extension_score, HandPosition,
    PalmDirection, DEFAULT_EXTENSION_EPSILON, DEFAULT_PALM_THRESHOLD, DEFAULT_POSITION_HIGH,
    DEFAULT_POSITION_LOW,
};
use super::hand_tracking::{Finger, HandLandmark, HandObservation, Handedness, ObservationError};

// ── Config ─────────────────────────────────────────────────

/// Thresholds used by feature extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    /// Minimum tip offset (normalized units) for a finger to count as extended.
    pub extension_epsilon: f32,
    /// Palm-direction threshold on the wrist→middle-MCP vector.
    pub palm_threshold: f32,
    /// Wrist y below this is `High`.
    pub position_high: f32,
    /// Wrist y above this is `Low`.
    pub position_low: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            extension_epsilon: DEFAULT_EXTENSION_EPSILON,
            palm_threshold: DEFAULT_PALM_THRESHOLD,
            position_high: DEFAULT_POSITION_HIGH,
            position_low: DEFAULT_POSITION_LOW,
        }
    }
}

// ── Description ────────────────────────────────────────────

/// Geometric summary of one hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandFeatures {
    pub handedness: Handedness,
    /// Thumb, index, middle, ring, pinky.
    pub finger_extended: [bool; 5],
    pub palm_direction: PalmDirection,
    /// Signed in-plane angle, (-180, 180].
    pub orientation_deg: f32,
    /// One angle per finger: thumb at its IP joint, the others at the PIP.
    pub joint_angles: [f32; 5],
    pub position: HandPosition,
}

impl HandFeatures {
    pub fn extended_count(&self) -> usize {
        self.finger_extended.iter().filter(|e| **e).count()
    }

    pub fn is_extended(&self, finger: Finger) -> bool {
        self.finger_extended[finger.index()]
    }
}

/// Per-frame summary of one or two hands, in observation order.
///
/// Every per-hand value lives in `hands`, so all per-hand sequences have
/// exactly `hand_count()` entries by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDescription {
    hands: Vec<HandFeatures>,
}

impl FeatureDescription {
    /// Wrap already-extracted hands. Fails on zero or more than two.
    pub fn from_hands(hands: Vec<HandFeatures>) -> Result<Self, ObservationError> {
        if hands.is_empty() || hands.len() > 2 {
            return Err(ObservationError::HandCount(hands.len()));
        }
        Ok(Self { hands })
    }

    pub fn hand_count(&self) -> usize {
        self.hands.len()
    }

    pub fn hands(&self) -> &[HandFeatures] {
        &self.hands
    }

    pub fn hand(&self, index: usize) -> Option<&HandFeatures> {
        self.hands.get(index)
    }

    /// The first observed hand. Always present.
    pub fn primary(&self) -> &HandFeatures {
        &self.hands[0]
    }

    pub fn finger_extended(&self) -> Vec<[bool; 5]> {
        self.hands.iter().map(|h| h.finger_extended).collect()
    }

    pub fn palm_directions(&self) -> Vec<PalmDirection> {
        self.hands.iter().map(|h| h.palm_direction).collect()
    }

    pub fn positions(&self) -> Vec<HandPosition> {
        self.hands.iter().map(|h| h.position).collect()
    }

    /// A one-hand description holding only the hand at `index`.
    pub fn single(&self, index: usize) -> Option<FeatureDescription> {
        self.hands.get(index).map(|h| FeatureDescription {
            hands: vec![h.clone()],
        })
    }

    /// Short human-readable summary for debug output.
    pub fn summary(&self) -> String {
        self.hands
            .iter()
            .map(|h| {
                let fingers: Vec<&str> = Finger::ALL
                    .iter()
                    .filter(|f| h.is_extended(**f))
                    .map(|f| f.as_str())
                    .collect();
                format!(
                    "{} extended({}): [{}] palm={} pos={} angle={:.0}",
                    h.handedness.as_str(),
                    h.extended_count(),
                    fingers.join(","),
                    h.palm_direction.as_str(),
                    h.position.as_str(),
                    h.orientation_deg,
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

// ── History ────────────────────────────────────────────────

/// Default number of past descriptions kept for motion signs.
pub const DEFAULT_HISTORY_LEN: usize = 16;

/// Bounded ring of recent descriptions, oldest first.
#[derive(Debug, Clone)]
pub struct FeatureHistory {
    frames: VecDeque<FeatureDescription>,
    capacity: usize,
}

impl Default for FeatureHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl FeatureHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a description, evicting the oldest when full.
    pub fn push(&mut self, desc: FeatureDescription) {
        if self.capacity == 0 {
            return;
        }
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(desc);
    }

    pub fn latest(&self) -> Option<&FeatureDescription> {
        self.frames.back()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureDescription> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

// ── Extractor ──────────────────────────────────────────────

/// Stateless converter from observations to a `FeatureDescription`.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    pub config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Summarize one or two hands.
    pub fn extract(
        &self,
        hands: &[HandObservation],
    ) -> Result<FeatureDescription, ObservationError> {
        if hands.is_empty() || hands.len() > 2 {
            return Err(ObservationError::HandCount(hands.len()));
        }
        let hands = hands
            .iter()
            .map(|h| self.extract_hand(h))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureDescription { hands })
    }

    /// Summarize a single hand.
    pub fn extract_hand(&self, hand: &HandObservation) -> Result<HandFeatures, ObservationError> {
        hand.validate()?;

        let wrist = hand.point(HandLandmark::Wrist);
        let middle_mcp = hand.point(HandLandmark::MiddleMcp);

        let mut finger_extended = [false; 5];
        let mut joint_angles = [0.0; 5];
        for finger in Finger::ALL {
            let [base, second, third, tip] = finger.chain().map(|l| hand.point(l));
            let (score, angle) = if finger == Finger::Thumb {
                (
                    horizontal_extension_score(tip, third, hand.handedness),
                    joint_angle_degrees(second, third, tip),
                )
            } else {
                (
                    vertical_extension_score(tip, second),
                    joint_angle_degrees(base, second, third),
                )
            };
            finger_extended[finger.index()] = score > self.config.extension_epsilon;
            joint_angles[finger.index()] = angle;
        }

        Ok(HandFeatures {
            handedness: hand.handedness,
            finger_extended,
            palm_direction: classify_palm_direction(
                direction_vector(wrist, middle_mcp),
                self.config.palm_threshold,
            ),
            orientation_deg: hand_orientation_degrees(wrist, middle_mcp),
            joint_angles,
            position: classify_hand_position(
                wrist.y,
                self.config.position_high,
                self.config.position_low,
            ),
        })
    }
}

// ── Tests ──────────────────────────────────────────────────
