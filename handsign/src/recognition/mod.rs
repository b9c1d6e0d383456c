//! Recognition engine: hand keypoints in, accepted words out.
//!
//! Provides:
//! - `hand_tracking`: keypoints, landmark indices, observation validation
//! - `geometry`: stateless vector and threshold helpers
//! - `features`: per-frame `FeatureDescription` extraction and history
//! - `catalogue`: ordered sign definitions and the built-in vocabulary
//! - `matcher`: first-match scan of the catalogue
//! - `session`: cooldown-gated `RecognitionSession`
//! - `handoff`: latest-wins frame slot and cooldown snapshot for threads

pub mod catalogue;
pub mod features;
pub mod geometry;
pub mod hand_tracking;
pub mod handoff;
pub mod matcher;
pub mod session;

pub use catalogue::{
    Catalogue, CatalogueError, CatalogueRow, PoseRule, RequiredHands, SignDefinition,
    SignPredicate,
};
pub use features::{
    FeatureConfig, FeatureDescription, FeatureExtractor, FeatureHistory, HandFeatures,
};
pub use geometry::{HandPosition, PalmDirection};
pub use hand_tracking::{
    Finger, HandLandmark, HandObservation, Handedness, Keypoint, ObservationError,
};
pub use handoff::{CooldownMonitor, Frame, FrameSlot};
pub use matcher::{match_sign, Matcher, SingleHandPolicy};
pub use session::{
    CooldownState, DetectionEvent, FrameOutcome, RecognitionSession, SessionConfig, SessionState,
};
