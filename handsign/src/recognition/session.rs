//! Recognition session: per-frame matching behind a cooldown gate.
//!
//! A session turns a stream of hand observations into detection events.
//! Once a word is accepted, further matches are suppressed until the
//! cooldown has elapsed, so a held pose produces a single word. Frames
//! with no hands, invalid observations, or no match never touch the
//! cooldown clock.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::catalogue::Catalogue;
use super::features::{FeatureConfig, FeatureExtractor, FeatureHistory, DEFAULT_HISTORY_LEN};
use super::handoff::{CooldownMonitor, FrameSlot};
use super::hand_tracking::{HandObservation, ObservationError};
use super::matcher::{Matcher, SingleHandPolicy};

/// Default minimum time between accepted words.
pub const DEFAULT_COOLDOWN_S: f64 = 1.5;

// ── Config ─────────────────────────────────────────────────

/// Configuration for a recognition session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Minimum seconds between two accepted detections.
    pub cooldown_s: f64,
    /// Past descriptions kept for motion signs.
    pub history_len: usize,
    /// Frames considered by the stability vote (1 disables it).
    pub stability_window: usize,
    /// Matches of one word within the window needed to accept it.
    pub stability_votes: usize,
    /// Hand used by single-hand signs when two are visible.
    pub single_hand: SingleHandPolicy,
    pub features: FeatureConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cooldown_s: DEFAULT_COOLDOWN_S,
            history_len: DEFAULT_HISTORY_LEN,
            stability_window: 1,
            stability_votes: 1,
            single_hand: SingleHandPolicy::FirstObserved,
            features: FeatureConfig::default(),
        }
    }
}

// ── Events & outcomes ──────────────────────────────────────

/// A word accepted by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    pub word: String,
    /// Session time in seconds.
    pub timestamp_s: f64,
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// No hands in the frame; nothing was evaluated.
    NoHands,
    /// The observation was malformed and the frame was dropped.
    Skipped(ObservationError),
    /// Hands were seen but no sign matched.
    NoMatch,
    /// Matched, but the stability vote has not reached its quorum yet.
    Pending { word: String, votes: usize },
    /// Matched during cooldown.
    Suppressed { word: String, remaining_s: f64 },
    Accepted(DetectionEvent),
}

impl FrameOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoHands => "no-hands",
            Self::Skipped(_) => "skipped",
            Self::NoMatch => "no-match",
            Self::Pending { .. } => "pending",
            Self::Suppressed { .. } => "suppressed",
            Self::Accepted(_) => "accepted",
        }
    }

    pub fn event(&self) -> Option<&DetectionEvent> {
        match self {
            Self::Accepted(evt) => Some(evt),
            _ => None,
        }
    }
}

/// Derived readiness of the session at a given time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState {
    Ready,
    Cooling { remaining_s: f64 },
}

// ── Cooldown ───────────────────────────────────────────────

/// Last accepted time plus the cooldown length.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownState {
    last_accepted_s: Option<f64>,
    duration_s: f64,
}

impl CooldownState {
    pub fn new(duration_s: f64) -> Self {
        Self {
            last_accepted_s: None,
            duration_s,
        }
    }

    pub fn last_accepted(&self) -> Option<f64> {
        self.last_accepted_s
    }

    pub fn duration(&self) -> f64 {
        self.duration_s
    }

    /// Seconds left before a new word can be accepted; 0 when ready.
    pub fn remaining(&self, now_s: f64) -> f64 {
        match self.last_accepted_s {
            Some(last) => (self.duration_s - (now_s - last)).max(0.0),
            None => 0.0,
        }
    }

    pub fn is_ready(&self, now_s: f64) -> bool {
        match self.last_accepted_s {
            Some(last) => now_s - last >= self.duration_s,
            None => true,
        }
    }

    fn accept(&mut self, now_s: f64) {
        self.last_accepted_s = Some(now_s);
    }

    fn clear(&mut self) {
        self.last_accepted_s = None;
    }
}

// ── Stability vote ─────────────────────────────────────────

/// Sliding window of recent match results used to require agreement
/// across several frames before accepting a word.
#[derive(Debug, Clone, Default)]
struct StabilityVote {
    window: VecDeque<Option<String>>,
}

impl StabilityVote {
    /// Record a result and return the most frequent word with its count.
    /// Ties go to the word seen first in the window.
    fn push(&mut self, result: Option<&str>, size: usize) -> Option<(String, usize)> {
        self.window.push_back(result.map(str::to_string));
        while self.window.len() > size.max(1) {
            self.window.pop_front();
        }

        let mut best: Option<(&str, usize)> = None;
        for word in self.window.iter().flatten() {
            let count = self
                .window
                .iter()
                .filter(|w| w.as_deref() == Some(word.as_str()))
                .count();
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((word.as_str(), count));
            }
        }
        best.map(|(w, c)| (w.to_string(), c))
    }

    fn clear(&mut self) {
        self.window.clear();
    }
}

// ── Session ────────────────────────────────────────────────

/// Stateful orchestrator for one conversation.
pub struct RecognitionSession {
    config: SessionConfig,
    catalogue: Arc<Catalogue>,
    extractor: FeatureExtractor,
    matcher: Matcher,
    cooldown: CooldownState,
    history: FeatureHistory,
    stability: StabilityVote,
    monitor: CooldownMonitor,
    accepted_count: u64,
}

impl RecognitionSession {
    /// Build a session. `stability_votes` is clamped to `1..=stability_window`
    /// so a vote can always be won.
    pub fn new(catalogue: Arc<Catalogue>, mut config: SessionConfig) -> Self {
        let max_votes = config.stability_window.max(1);
        let votes = config.stability_votes.clamp(1, max_votes);
        if votes != config.stability_votes {
            warn!(
                "stability_votes {} outside 1..={}, using {}",
                config.stability_votes, max_votes, votes
            );
            config.stability_votes = votes;
        }
        let monitor = CooldownMonitor::new(config.cooldown_s);
        Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            matcher: Matcher::new(config.single_hand),
            cooldown: CooldownState::new(config.cooldown_s),
            history: FeatureHistory::new(config.history_len),
            stability: StabilityVote::default(),
            monitor,
            accepted_count: 0,
            catalogue,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &Arc<Catalogue> {
        &self.catalogue
    }

    pub fn cooldown(&self) -> &CooldownState {
        &self.cooldown
    }

    pub fn history(&self) -> &FeatureHistory {
        &self.history
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted_count
    }

    /// Read-only handle for other threads to observe the cooldown.
    pub fn monitor(&self) -> CooldownMonitor {
        self.monitor.clone()
    }

    /// Swap in a freshly loaded catalogue.
    pub fn replace_catalogue(&mut self, catalogue: Arc<Catalogue>) {
        info!("Catalogue replaced: {} signs", catalogue.len());
        self.catalogue = catalogue;
        self.stability.clear();
    }

    pub fn set_cooldown(&mut self, cooldown_s: f64) {
        self.config.cooldown_s = cooldown_s;
        self.cooldown.duration_s = cooldown_s;
        self.monitor.store_duration(cooldown_s);
    }

    pub fn set_extension_epsilon(&mut self, epsilon: f32) {
        self.config.features.extension_epsilon = epsilon;
        self.extractor.config.extension_epsilon = epsilon;
    }

    /// Ready, or cooling with the time left.
    pub fn state(&self, now_s: f64) -> SessionState {
        if self.cooldown.is_ready(now_s) {
            SessionState::Ready
        } else {
            SessionState::Cooling {
                remaining_s: self.cooldown.remaining(now_s),
            }
        }
    }

    /// Run one frame through extraction, matching and the cooldown gate.
    pub fn process_frame(&mut self, hands: &[HandObservation], now_s: f64) -> FrameOutcome {
        if hands.is_empty() {
            return FrameOutcome::NoHands;
        }

        let desc = match self.extractor.extract(hands) {
            Ok(d) => d,
            Err(e) => {
                debug!("Frame at {:.3}s skipped: {}", now_s, e);
                return FrameOutcome::Skipped(e);
            }
        };
        debug!("Frame at {:.3}s: {}", now_s, desc.summary());

        let matched = self
            .matcher
            .match_word(&desc, &self.catalogue, Some(&self.history))
            .map(str::to_string);
        self.history.push(desc);

        let Some(word) = matched else {
            if self.config.stability_window > 1 {
                self.stability.push(None, self.config.stability_window);
            }
            return FrameOutcome::NoMatch;
        };

        if !self.cooldown.is_ready(now_s) {
            let remaining_s = self.cooldown.remaining(now_s);
            debug!("Suppressed {:?}: cooldown {:.2}s left", word, remaining_s);
            return FrameOutcome::Suppressed { word, remaining_s };
        }

        if self.config.stability_window > 1 {
            let leader = self
                .stability
                .push(Some(&word), self.config.stability_window);
            match leader {
                Some((leader, votes)) if votes >= self.config.stability_votes => {
                    self.stability.clear();
                    return self.accept(leader, now_s);
                }
                _ => {
                    let votes = self.stability_votes_for(&word);
                    return FrameOutcome::Pending { word, votes };
                }
            }
        }

        self.accept(word, now_s)
    }

    /// Take the latest frame from a handoff slot, if any, and process it.
    pub fn drain(&mut self, slot: &FrameSlot) -> Option<FrameOutcome> {
        let frame = slot.take()?;
        Some(self.process_frame(&frame.hands, frame.timestamp_s))
    }

    /// Start a new conversation: clears cooldown, history and votes.
    pub fn reset(&mut self) {
        self.cooldown.clear();
        self.history.clear();
        self.stability.clear();
        self.monitor.store_last(None);
        debug!("Recognition session reset");
    }

    /// Drop pending stability votes without touching cooldown or history.
    pub fn clear_votes(&mut self) {
        self.stability.clear();
    }

    fn accept(&mut self, word: String, now_s: f64) -> FrameOutcome {
        self.cooldown.accept(now_s);
        self.monitor.store_last(Some(now_s));
        self.accepted_count += 1;
        info!("Detected {:?} at {:.3}s", word, now_s);
        FrameOutcome::Accepted(DetectionEvent {
            word,
            timestamp_s: now_s,
        })
    }

    fn stability_votes_for(&self, word: &str) -> usize {
        self.stability
            .window
            .iter()
            .filter(|w| w.as_deref() == Some(word))
            .count()
    }

    /// Generate s-expression for IPC status.
    pub fn status_sexp(&self, now_s: f64) -> String {
        let (state, remaining) = match self.state(now_s) {
            SessionState::Ready => ("ready", 0.0),
            SessionState::Cooling { remaining_s } => ("cooling", remaining_s),
        };
        let last = self
            .cooldown
            .last_accepted()
            .map(|t| format!("{:.3}", t))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:state :{} :remaining {:.2} :last-accepted {} :accepted {} :history {} :signs {})",
            state,
            remaining,
            last,
            self.accepted_count,
            self.history.len(),
            self.catalogue.len(),
        )
    }

    /// Generate s-expression for IPC config.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:cooldown {:.2} :epsilon {:.3} :palm-threshold {:.3} :stability-window {} :stability-votes {} :single-hand :{} :history-len {})",
            self.config.cooldown_s,
            self.config.features.extension_epsilon,
            self.config.features.palm_threshold,
            self.config.stability_window,
            self.config.stability_votes,
            self.config.single_hand.as_str(),
            self.config.history_len,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::catalogue::{always, RequiredHands, SignDefinition, SignPredicate};
    use crate::recognition::handoff::Frame;
    use crate::recognition::hand_tracking::{curl, open_hand, Finger, Handedness};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn builtin_session() -> RecognitionSession {
        RecognitionSession::new(Arc::new(Catalogue::builtin()), SessionConfig::default())
    }

    fn open() -> Vec<HandObservation> {
        vec![open_hand(Handedness::Right)]
    }

    fn peace() -> Vec<HandObservation> {
        let mut h = open_hand(Handedness::Right);
        curl(&mut h, Finger::Thumb);
        curl(&mut h, Finger::Ring);
        curl(&mut h, Finger::Pinky);
        vec![h]
    }

    fn partial() -> Vec<HandObservation> {
        let mut h = open_hand(Handedness::Right);
        curl(&mut h, Finger::Index);
        curl(&mut h, Finger::Ring);
        vec![h]
    }

    fn accepted_word(outcome: &FrameOutcome) -> Option<&str> {
        outcome.event().map(|e| e.word.as_str())
    }

    #[test]
    fn test_first_match_accepted() {
        let mut session = builtin_session();
        assert_eq!(session.state(0.0), SessionState::Ready);
        let outcome = session.process_frame(&open(), 0.0);
        assert_eq!(accepted_word(&outcome), Some("HELLO"));
        assert_eq!(session.cooldown().last_accepted(), Some(0.0));
        assert_eq!(session.accepted_count(), 1);
    }

    #[test]
    fn test_cooldown_sequence() {
        let mut session = builtin_session();
        assert!(session.process_frame(&open(), 0.0).event().is_some());

        match session.process_frame(&open(), 1.0) {
            FrameOutcome::Suppressed { word, remaining_s } => {
                assert_eq!(word, "HELLO");
                assert!((remaining_s - 0.5).abs() < 1e-9, "got {}", remaining_s);
            }
            other => panic!("expected suppression, got {:?}", other),
        }
        assert_eq!(session.cooldown().last_accepted(), Some(0.0));

        let outcome = session.process_frame(&open(), 1.6);
        assert_eq!(accepted_word(&outcome), Some("HELLO"));
        assert_eq!(session.cooldown().last_accepted(), Some(1.6));
    }

    #[test]
    fn test_cooldown_boundary_is_ready() {
        let mut session = builtin_session();
        session.process_frame(&open(), 10.0);
        assert!(matches!(session.state(11.0), SessionState::Cooling { .. }));
        assert_eq!(session.state(11.5), SessionState::Ready);
        assert!(session.process_frame(&peace(), 11.5).event().is_some());
    }

    #[test]
    fn test_suppression_applies_to_other_words() {
        let mut session = builtin_session();
        session.process_frame(&open(), 0.0);
        let outcome = session.process_frame(&peace(), 0.5);
        assert!(matches!(outcome, FrameOutcome::Suppressed { ref word, .. } if word == "PEACE"));
    }

    #[test]
    fn test_empty_hands_never_evaluates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let def = SignDefinition::new(
            "ANY",
            RequiredHands::Single,
            "",
            SignPredicate::pose(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        );
        let catalogue = Arc::new(Catalogue::new(vec![def]).unwrap());
        let mut session = RecognitionSession::new(catalogue, SessionConfig::default());

        assert_eq!(session.process_frame(&[], 0.0), FrameOutcome::NoHands);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.cooldown().last_accepted(), None);

        session.process_frame(&open(), 1.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.process_frame(&[], 1.2), FrameOutcome::NoHands);
        assert_eq!(session.cooldown().last_accepted(), Some(1.0));
    }

    #[test]
    fn test_no_match_leaves_clock_alone() {
        let mut session = builtin_session();
        session.process_frame(&open(), 0.0);
        assert_eq!(session.process_frame(&partial(), 1.0), FrameOutcome::NoMatch);
        assert_eq!(session.cooldown().last_accepted(), Some(0.0));
        assert!(session.process_frame(&open(), 1.5).event().is_some());
    }

    #[test]
    fn test_invalid_observation_is_skipped() {
        let mut session = builtin_session();
        let mut bad = open();
        bad[0].keypoints[3].x = f32::NAN;
        let outcome = session.process_frame(&bad, 0.0);
        assert_eq!(
            outcome,
            FrameOutcome::Skipped(ObservationError::NonFiniteCoordinate { index: 3 })
        );
        assert_eq!(session.cooldown().last_accepted(), None);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let mut session = builtin_session();
        session.process_frame(&open(), 0.0);
        assert!(!session.history().is_empty());
        session.reset();
        assert_eq!(session.cooldown().last_accepted(), None);
        assert!(session.history().is_empty());
        assert!(session.process_frame(&open(), 0.1).event().is_some());
    }

    #[test]
    fn test_stability_vote() {
        let config = SessionConfig {
            stability_window: 5,
            stability_votes: 3,
            ..SessionConfig::default()
        };
        let mut session = RecognitionSession::new(Arc::new(Catalogue::builtin()), config);

        assert_eq!(
            session.process_frame(&open(), 0.0),
            FrameOutcome::Pending {
                word: "HELLO".to_string(),
                votes: 1
            }
        );
        assert_eq!(session.process_frame(&partial(), 0.03), FrameOutcome::NoMatch);
        assert!(matches!(
            session.process_frame(&peace(), 0.06),
            FrameOutcome::Pending { votes: 1, .. }
        ));
        assert!(matches!(
            session.process_frame(&open(), 0.1),
            FrameOutcome::Pending { votes: 2, .. }
        ));
        let outcome = session.process_frame(&open(), 0.13);
        assert_eq!(accepted_word(&outcome), Some("HELLO"));

        // Votes are not collected while cooling down.
        assert!(matches!(
            session.process_frame(&open(), 0.5),
            FrameOutcome::Suppressed { .. }
        ));
        assert!(matches!(
            session.process_frame(&open(), 1.7),
            FrameOutcome::Pending { votes: 1, .. }
        ));
    }

    #[test]
    fn test_stability_window_slides() {
        let config = SessionConfig {
            stability_window: 3,
            stability_votes: 3,
            ..SessionConfig::default()
        };
        let mut session = RecognitionSession::new(Arc::new(Catalogue::builtin()), config);
        session.process_frame(&open(), 0.0);
        session.process_frame(&open(), 0.1);
        session.process_frame(&partial(), 0.2);
        // Window is now [HELLO, none, HELLO]: still short of three.
        assert!(matches!(
            session.process_frame(&open(), 0.3),
            FrameOutcome::Pending { votes: 2, .. }
        ));
    }

    #[test]
    fn test_clear_votes_discards_pending() {
        let config = SessionConfig {
            stability_window: 3,
            stability_votes: 2,
            ..SessionConfig::default()
        };
        let mut session = RecognitionSession::new(Arc::new(Catalogue::builtin()), config);
        assert!(matches!(
            session.process_frame(&open(), 0.0),
            FrameOutcome::Pending { votes: 1, .. }
        ));
        session.clear_votes();
        assert!(matches!(
            session.process_frame(&open(), 0.1),
            FrameOutcome::Pending { votes: 1, .. }
        ));
        assert_eq!(
            accepted_word(&session.process_frame(&open(), 0.2)),
            Some("HELLO")
        );
    }

    #[test]
    fn test_votes_clamped_to_window() {
        let config = SessionConfig {
            stability_window: 2,
            stability_votes: 5,
            ..SessionConfig::default()
        };
        let mut session = RecognitionSession::new(Arc::new(Catalogue::builtin()), config);
        assert_eq!(session.config().stability_votes, 2);
        session.process_frame(&open(), 0.0);
        assert_eq!(
            accepted_word(&session.process_frame(&open(), 0.1)),
            Some("HELLO")
        );

        let zero = SessionConfig {
            stability_votes: 0,
            ..SessionConfig::default()
        };
        let session = RecognitionSession::new(Arc::new(Catalogue::builtin()), zero);
        assert_eq!(session.config().stability_votes, 1);
    }

    #[test]
    fn test_set_cooldown() {
        let mut session = builtin_session();
        session.set_cooldown(0.2);
        session.process_frame(&open(), 0.0);
        assert!(session.process_frame(&open(), 0.25).event().is_some());
        assert!((session.monitor().duration() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_set_extension_epsilon() {
        let mut session = builtin_session();
        // Fingertips sit 0.12 above their PIP joints in the fixture.
        session.set_extension_epsilon(0.2);
        let outcome = session.process_frame(&open(), 0.0);
        assert_eq!(accepted_word(&outcome), Some("STOP"));
    }

    #[test]
    fn test_replace_catalogue() {
        let mut session = builtin_session();
        let custom = Catalogue::new(vec![always("ONLY", RequiredHands::Single)]).unwrap();
        session.replace_catalogue(Arc::new(custom));
        let outcome = session.process_frame(&open(), 0.0);
        assert_eq!(accepted_word(&outcome), Some("ONLY"));
    }

    #[test]
    fn test_monitor_tracks_session() {
        let mut session = builtin_session();
        let monitor = session.monitor();
        assert!(monitor.is_ready(0.0));
        session.process_frame(&open(), 2.0);
        assert_eq!(monitor.last_accepted(), Some(2.0));
        assert!((monitor.remaining(3.0) - 0.5).abs() < 1e-9);
        session.reset();
        assert_eq!(monitor.last_accepted(), None);
    }

    #[test]
    fn test_drain_from_slot() {
        let mut session = builtin_session();
        let slot = FrameSlot::new();
        assert!(session.drain(&slot).is_none());
        slot.publish(Frame {
            timestamp_s: 0.0,
            hands: peace(),
        });
        slot.publish(Frame {
            timestamp_s: 0.1,
            hands: open(),
        });
        let outcome = session.drain(&slot).unwrap();
        assert_eq!(accepted_word(&outcome), Some("HELLO"));
        assert_eq!(outcome.event().unwrap().timestamp_s, 0.1);
        assert!(session.drain(&slot).is_none());
    }

    #[test]
    fn test_status_sexp() {
        let mut session = builtin_session();
        let sexp = session.status_sexp(0.0);
        assert!(sexp.contains(":state :ready"));
        assert!(sexp.contains(":last-accepted nil"));
        session.process_frame(&open(), 0.0);
        let sexp = session.status_sexp(0.5);
        assert!(sexp.contains(":state :cooling"));
        assert!(sexp.contains(":remaining 1.00"));
        assert!(sexp.contains(":accepted 1"));
    }

    #[test]
    fn test_config_sexp() {
        let session = builtin_session();
        let sexp = session.config_sexp();
        assert!(sexp.contains(":cooldown 1.50"));
        assert!(sexp.contains(":epsilon 0.020"));
        assert!(sexp.contains(":single-hand :first"));
    }

    #[test]
    fn test_outcome_as_str() {
        assert_eq!(FrameOutcome::NoHands.as_str(), "no-hands");
        assert_eq!(FrameOutcome::NoMatch.as_str(), "no-match");
        assert_eq!(
            FrameOutcome::Skipped(ObservationError::HandCount(3)).as_str(),
            "skipped"
        );
    }
}
