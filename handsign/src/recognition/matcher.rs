//! Pattern matching of a feature description against the catalogue.

use super::catalogue::{Catalogue, RequiredHands, SignDefinition};
use super::features::{FeatureDescription, FeatureHistory};
use super::hand_tracking::Handedness;

/// Which hand single-hand signs look at when two hands are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleHandPolicy {
    /// Hand index 0, whatever its handedness.
    #[default]
    FirstObserved,
    /// The first hand with this handedness, falling back to index 0.
    Prefer(Handedness),
}

impl SingleHandPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstObserved => "first",
            Self::Prefer(Handedness::Left) => "left",
            Self::Prefer(Handedness::Right) => "right",
            Self::Prefer(Handedness::Unknown) => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Some(Self::FirstObserved),
            "left" => Some(Self::Prefer(Handedness::Left)),
            "right" => Some(Self::Prefer(Handedness::Right)),
            _ => None,
        }
    }

    /// Index of the hand single-hand signs are evaluated against.
    pub fn select(&self, desc: &FeatureDescription) -> usize {
        match self {
            Self::FirstObserved => 0,
            Self::Prefer(handedness) => desc
                .hands()
                .iter()
                .position(|h| h.handedness == *handedness)
                .unwrap_or(0),
        }
    }
}

/// Scans a catalogue in order and returns the first satisfied definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    pub policy: SingleHandPolicy,
}

impl Matcher {
    pub fn new(policy: SingleHandPolicy) -> Self {
        Self { policy }
    }

    /// First definition whose hand gate passes and whose predicate holds.
    ///
    /// Single-hand definitions see a one-hand view of the selected hand;
    /// two-hand definitions need exactly two hands and see both.
    pub fn find<'a>(
        &self,
        desc: &FeatureDescription,
        catalogue: &'a Catalogue,
        history: Option<&FeatureHistory>,
    ) -> Option<&'a SignDefinition> {
        let reduced = if desc.hand_count() > 1 {
            desc.single(self.policy.select(desc))
        } else {
            None
        };
        let single_view = reduced.as_ref().unwrap_or(desc);

        catalogue.iter().find(|def| match def.required_hands {
            RequiredHands::Single => def.predicate.evaluate(single_view, history),
            RequiredHands::Both => {
                desc.hand_count() == 2 && def.predicate.evaluate(desc, history)
            }
        })
    }

    /// Word of the first matching definition.
    pub fn match_word<'a>(
        &self,
        desc: &FeatureDescription,
        catalogue: &'a Catalogue,
        history: Option<&FeatureHistory>,
    ) -> Option<&'a str> {
        self.find(desc, catalogue, history).map(|d| d.word.as_str())
    }
}

/// Match with the default policy and no history.
pub fn match_sign<'a>(desc: &FeatureDescription, catalogue: &'a Catalogue) -> Option<&'a str> {
    Matcher::default().match_word(desc, catalogue, None)
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::catalogue::{always, PoseRule, SignPredicate};
    use crate::recognition::features::FeatureExtractor;
    use crate::recognition::geometry::PalmDirection;
    use crate::recognition::hand_tracking::{curl, open_hand, Finger, HandObservation, Keypoint};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn hand(handedness: Handedness, curled: &[Finger]) -> HandObservation {
        let mut h = open_hand(handedness);
        for f in curled {
            curl(&mut h, *f);
        }
        h
    }

    fn describe(hands: &[HandObservation]) -> FeatureDescription {
        FeatureExtractor::default().extract(hands).unwrap()
    }

    /// Lower the wrist so the palm vector falls inside both thresholds.
    fn facing_forward(mut h: HandObservation) -> HandObservation {
        h.keypoints[0] = Keypoint::new(0.5, 0.68, 0.0);
        h
    }

    #[test]
    fn test_builtin_cascade() {
        use Finger::*;
        let cat = Catalogue::builtin();
        let cases: Vec<(HandObservation, Option<&str>)> = vec![
            (hand(Handedness::Right, &[]), Some("HELLO")),
            (facing_forward(hand(Handedness::Right, &[])), Some("THANK YOU")),
            (hand(Handedness::Right, &[Thumb, Middle, Ring, Pinky]), Some("YOU")),
            (hand(Handedness::Right, &[Thumb, Ring, Pinky]), Some("PEACE")),
            (hand(Handedness::Right, &[Thumb, Pinky]), Some("WATER")),
            (hand(Handedness::Right, &[Index, Middle, Ring, Pinky]), Some("YES")),
            (hand(Handedness::Right, &[Thumb, Index, Middle, Ring, Pinky]), Some("STOP")),
            (hand(Handedness::Right, &[Index, Ring]), None),
        ];
        for (h, expected) in cases {
            let desc = describe(&[h]);
            assert_eq!(match_sign(&desc, &cat), expected, "for {}", desc.summary());
        }
    }

    #[test]
    fn test_result_is_in_catalogue() {
        let cat = Catalogue::builtin();
        for curled in [vec![], vec![Finger::Thumb], vec![Finger::Index, Finger::Ring]] {
            let desc = describe(&[hand(Handedness::Right, &curled)]);
            if let Some(word) = match_sign(&desc, &cat) {
                assert!(cat.get(word).is_some(), "{} not in catalogue", word);
            }
        }
    }

    #[test]
    fn test_match_is_pure() {
        let cat = Catalogue::builtin();
        let desc = describe(&[hand(Handedness::Right, &[Finger::Thumb, Finger::Pinky])]);
        assert_eq!(match_sign(&desc, &cat), match_sign(&desc, &cat));
    }

    #[test]
    fn test_shadowing_first_wins() {
        let desc = describe(&[hand(Handedness::Right, &[])]);
        for size in [2, 5, 20] {
            for second in 1..size {
                let defs: Vec<_> = (0..size)
                    .map(|i| {
                        let word = format!("W{}", i);
                        if i == 0 || i == second {
                            always(&word, RequiredHands::Single)
                        } else {
                            SignDefinition::new(
                                word,
                                RequiredHands::Single,
                                "",
                                SignPredicate::Never,
                            )
                        }
                    })
                    .collect();
                let cat = Catalogue::new(defs).unwrap();
                assert_eq!(match_sign(&desc, &cat), Some("W0"));
            }
        }
    }

    #[test]
    fn test_both_never_matches_one_hand() {
        let cat = Catalogue::new(vec![always("TOGETHER", RequiredHands::Both)]).unwrap();
        let one = describe(&[hand(Handedness::Right, &[])]);
        assert_eq!(match_sign(&one, &cat), None);

        let two = describe(&[hand(Handedness::Left, &[]), hand(Handedness::Right, &[])]);
        assert_eq!(match_sign(&two, &cat), Some("TOGETHER"));
    }

    #[test]
    fn test_both_rule_is_symmetric() {
        let rule = PoseRule {
            min_extended: Some(5),
            ..PoseRule::default()
        };
        let def = SignDefinition::new("FRIEND", RequiredHands::Both, "", rule.into_predicate());
        let cat = Catalogue::new(vec![def]).unwrap();

        let both_open = describe(&[hand(Handedness::Left, &[]), hand(Handedness::Right, &[])]);
        assert_eq!(match_sign(&both_open, &cat), Some("FRIEND"));

        let one_closed = describe(&[
            hand(Handedness::Left, &[Finger::Index]),
            hand(Handedness::Right, &[]),
        ]);
        assert_eq!(match_sign(&one_closed, &cat), None);
    }

    #[test]
    fn test_single_uses_first_hand_by_default() {
        let cat = Catalogue::builtin();
        let fist = [Finger::Thumb, Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];
        let desc = describe(&[hand(Handedness::Left, &fist), hand(Handedness::Right, &[])]);
        assert_eq!(match_sign(&desc, &cat), Some("STOP"));
    }

    #[test]
    fn test_single_prefer_policy() {
        let cat = Catalogue::builtin();
        let fist = [Finger::Thumb, Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];
        let desc = describe(&[hand(Handedness::Left, &fist), hand(Handedness::Right, &[])]);

        let prefer_right = Matcher::new(SingleHandPolicy::Prefer(Handedness::Right));
        assert_eq!(prefer_right.match_word(&desc, &cat, None), Some("HELLO"));

        // No hand with the preferred label: fall back to index 0.
        let one = describe(&[hand(Handedness::Left, &fist)]);
        assert_eq!(prefer_right.match_word(&one, &cat, None), Some("STOP"));
    }

    #[test]
    fn test_hand_gate_checked_before_predicate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let def = SignDefinition::new(
            "COUNTED",
            RequiredHands::Both,
            "",
            SignPredicate::pose(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        );
        let cat = Catalogue::new(vec![def]).unwrap();
        let one = describe(&[hand(Handedness::Right, &[])]);
        assert_eq!(match_sign(&one, &cat), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_motion_predicate_sees_history() {
        let def = SignDefinition::new(
            "WAVE",
            RequiredHands::Single,
            "",
            SignPredicate::motion(|desc, history| {
                let current = desc.primary().palm_direction;
                history
                    .latest()
                    .is_some_and(|prev| prev.primary().palm_direction != current)
            }),
        );
        let cat = Catalogue::new(vec![def]).unwrap();
        let matcher = Matcher::default();

        let up = describe(&[hand(Handedness::Right, &[])]);
        let forward = describe(&[facing_forward(hand(Handedness::Right, &[]))]);
        assert_eq!(up.primary().palm_direction, PalmDirection::Up);
        assert_eq!(forward.primary().palm_direction, PalmDirection::Forward);

        let mut history = FeatureHistory::new(4);
        assert_eq!(matcher.match_word(&forward, &cat, Some(&history)), None);
        history.push(up);
        assert_eq!(matcher.match_word(&forward, &cat, Some(&history)), Some("WAVE"));
        assert_eq!(matcher.match_word(&forward, &cat, None), None);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(SingleHandPolicy::parse("first"), Some(SingleHandPolicy::FirstObserved));
        assert_eq!(
            SingleHandPolicy::parse("Right"),
            Some(SingleHandPolicy::Prefer(Handedness::Right))
        );
        assert_eq!(SingleHandPolicy::parse("dominant"), None);
        assert_eq!(SingleHandPolicy::Prefer(Handedness::Left).as_str(), "left");
    }
}
