//! Sign catalogue: ordered word definitions with match predicates.
//!
//! Order is significant. The matcher scans front to back and the first
//! satisfied definition wins, so earlier entries shadow later ones.
//! A catalogue is immutable once built; reloading replaces it whole.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::features::{FeatureDescription, FeatureHistory, HandFeatures};
use super::geometry::{HandPosition, PalmDirection};
use super::hand_tracking::Finger;

// ── Errors ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogueError {
    #[error("duplicate sign definition for word {0:?}")]
    DuplicateSignDefinition(String),
    #[error("sign definition with an empty word")]
    EmptyWord,
    #[error("unknown hand requirement {0:?} (expected single or both)")]
    UnknownHands(String),
    #[error("malformed catalogue: {0}")]
    Parse(String),
}

// ── Hand requirement ───────────────────────────────────────

/// How many hands a sign uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequiredHands {
    #[default]
    Single,
    Both,
}

impl RequiredHands {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CatalogueError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "one" | "1" => Ok(Self::Single),
            "both" | "two" | "2" => Ok(Self::Both),
            _ => Err(CatalogueError::UnknownHands(s.to_string())),
        }
    }
}

// ── Predicates ─────────────────────────────────────────────

pub type PoseFn = Arc<dyn Fn(&FeatureDescription) -> bool + Send + Sync>;
pub type MotionFn = Arc<dyn Fn(&FeatureDescription, &FeatureHistory) -> bool + Send + Sync>;

/// What a sign definition tests a frame against.
#[derive(Clone)]
pub enum SignPredicate {
    /// Depends only on the current frame.
    Pose(PoseFn),
    /// Also sees the recent history of descriptions.
    Motion(MotionFn),
    /// Listed for lookup but never recognized.
    Never,
}

impl SignPredicate {
    pub fn pose<F>(f: F) -> Self
    where
        F: Fn(&FeatureDescription) -> bool + Send + Sync + 'static,
    {
        Self::Pose(Arc::new(f))
    }

    pub fn motion<F>(f: F) -> Self
    where
        F: Fn(&FeatureDescription, &FeatureHistory) -> bool + Send + Sync + 'static,
    {
        Self::Motion(Arc::new(f))
    }

    /// Motion predicates are false when no history is supplied.
    pub fn evaluate(&self, desc: &FeatureDescription, history: Option<&FeatureHistory>) -> bool {
        match self {
            Self::Pose(f) => f(desc),
            Self::Motion(f) => history.is_some_and(|h| f(desc, h)),
            Self::Never => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pose(_) => "pose",
            Self::Motion(_) => "motion",
            Self::Never => "never",
        }
    }
}

impl fmt::Debug for SignPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignPredicate::{}", self.kind())
    }
}

// ── Declarative rules ──────────────────────────────────────

/// Data-driven pose rule. Every populated field must hold; for a
/// multi-hand description it must hold on every hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseRule {
    /// Per finger: `Some(true)` extended, `Some(false)` curled, `None` either.
    pub fingers: [Option<bool>; 5],
    pub min_extended: Option<usize>,
    pub max_extended: Option<usize>,
    /// Allowed palm directions; empty means any.
    pub palm: Vec<PalmDirection>,
    pub position: Option<HandPosition>,
}

impl PoseRule {
    pub fn holds_for(&self, hand: &HandFeatures) -> bool {
        let fingers_ok = self
            .fingers
            .iter()
            .zip(hand.finger_extended)
            .all(|(want, got)| want.map_or(true, |w| w == got));
        let count = hand.extended_count();
        fingers_ok
            && self.min_extended.map_or(true, |m| count >= m)
            && self.max_extended.map_or(true, |m| count <= m)
            && (self.palm.is_empty() || self.palm.contains(&hand.palm_direction))
            && self.position.map_or(true, |p| p == hand.position)
    }

    pub fn holds(&self, desc: &FeatureDescription) -> bool {
        desc.hands().iter().all(|h| self.holds_for(h))
    }

    pub fn into_predicate(self) -> SignPredicate {
        SignPredicate::pose(move |desc| self.holds(desc))
    }
}

// ── Definitions ────────────────────────────────────────────

/// One recognizable word.
#[derive(Debug, Clone)]
pub struct SignDefinition {
    pub word: String,
    pub required_hands: RequiredHands,
    /// Free text for people; never consulted by matching.
    pub description: String,
    pub predicate: SignPredicate,
}

impl SignDefinition {
    pub fn new(
        word: impl Into<String>,
        required_hands: RequiredHands,
        description: impl Into<String>,
        predicate: SignPredicate,
    ) -> Self {
        Self {
            word: word.into(),
            required_hands,
            description: description.into(),
            predicate,
        }
    }
}

/// One row of the tabular catalogue source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogueRow {
    pub word: String,
    pub hands: RequiredHands,
    pub description: String,
    pub rule: Option<PoseRule>,
}

/// A word in a phrase paired with its definition, if known.
#[derive(Debug, Clone)]
pub struct PhraseEntry<'a> {
    pub word: String,
    pub definition: Option<&'a SignDefinition>,
}

// ── Catalogue ──────────────────────────────────────────────

/// Ordered, word-unique set of sign definitions.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    definitions: Vec<SignDefinition>,
    index: HashMap<String, usize>,
}

impl Catalogue {
    /// Build from definitions in match order. Rejects empty and duplicate words.
    pub fn new(definitions: Vec<SignDefinition>) -> Result<Self, CatalogueError> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if def.word.trim().is_empty() {
                return Err(CatalogueError::EmptyWord);
            }
            if index.insert(def.word.clone(), i).is_some() {
                warn!("Catalogue rejected: duplicate word {:?}", def.word);
                return Err(CatalogueError::DuplicateSignDefinition(def.word.clone()));
            }
        }
        Ok(Self { definitions, index })
    }

    /// The built-in vocabulary, in shadowing order.
    pub fn builtin() -> Self {
        let definitions = BUILTIN_SIGNS
            .iter()
            .map(|(word, description)| {
                SignDefinition::new(
                    *word,
                    RequiredHands::Single,
                    *description,
                    builtin_predicate(word).unwrap_or(SignPredicate::Never),
                )
            })
            .collect();
        // Built-in words are distinct and non-empty.
        Self::new(definitions).unwrap_or_default()
    }

    /// Build from tabular rows.
    ///
    /// Rows without a word are skipped. A row's predicate is its own rule,
    /// else the built-in rule for the word, else `Never`.
    pub fn from_rows(rows: Vec<CatalogueRow>) -> Result<Self, CatalogueError> {
        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            let word = row.word.trim();
            if word.is_empty() {
                debug!("Catalogue: skipping row without a word");
                continue;
            }
            let predicate = match row.rule {
                Some(rule) => rule.into_predicate(),
                None => builtin_predicate(word).unwrap_or_else(|| {
                    warn!("Catalogue: no rule for {:?}; it will never be recognized", word);
                    SignPredicate::Never
                }),
            };
            definitions.push(SignDefinition::new(word, row.hands, row.description, predicate));
        }
        let catalogue = Self::new(definitions)?;
        info!("Loaded {} signs", catalogue.len());
        Ok(catalogue)
    }

    pub fn get(&self, word: &str) -> Option<&SignDefinition> {
        self.index.get(word).map(|&i| &self.definitions[i])
    }

    /// Position of a word in match order.
    pub fn position(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Definitions in match order.
    pub fn iter(&self) -> impl Iterator<Item = &SignDefinition> {
        self.definitions.iter()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.word.as_str())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Split a phrase into upper-cased words and look each one up.
    pub fn lookup_phrase(&self, text: &str) -> Vec<PhraseEntry<'_>> {
        text.to_uppercase()
            .split_whitespace()
            .map(|w| PhraseEntry {
                word: w.to_string(),
                definition: self.get(w),
            })
            .collect()
    }

    /// Generate s-expression listing the catalogue.
    pub fn catalogue_sexp(&self) -> String {
        if self.definitions.is_empty() {
            return "nil".to_string();
        }
        let entries: Vec<String> = self
            .definitions
            .iter()
            .map(|d| {
                format!(
                    "(:word \"{}\" :hands :{} :predicate :{})",
                    escape(&d.word),
                    d.required_hands.as_str(),
                    d.predicate.kind(),
                )
            })
            .collect();
        format!("({})", entries.join(" "))
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Built-in vocabulary ────────────────────────────────────

/// Default words and descriptions, in match order.
pub const BUILTIN_SIGNS: [(&str, &str); 9] = [
    ("HELLO", "Open palm raised, all fingers extended"),
    ("THANK YOU", "Open palm facing forward"),
    ("PLEASE", "Open palm pointing down"),
    ("YOU", "Index finger pointing"),
    ("ME/I", "Index finger pointing sideways"),
    ("PEACE", "Index and middle extended"),
    ("WATER", "Index, middle and ring extended"),
    ("YES", "Thumbs up"),
    ("STOP", "Closed fist"),
];

/// Built-in pose predicate for a word, if there is one.
pub fn builtin_predicate(word: &str) -> Option<SignPredicate> {
    let f: fn(&HandFeatures) -> bool = match word {
        "HELLO" => |h| {
            h.extended_count() >= 4
                && (h.position == HandPosition::High
                    || !matches!(h.palm_direction, PalmDirection::Forward | PalmDirection::Down))
        },
        "THANK YOU" => |h| h.extended_count() >= 4 && h.palm_direction == PalmDirection::Forward,
        "PLEASE" => |h| h.extended_count() >= 4 && h.palm_direction == PalmDirection::Down,
        "YOU" => |h| h.is_extended(Finger::Index) && h.extended_count() == 1,
        "ME/I" => |h| {
            h.is_extended(Finger::Index)
                && h.extended_count() <= 2
                && matches!(h.palm_direction, PalmDirection::Left | PalmDirection::Right)
        },
        "PEACE" => |h| {
            h.is_extended(Finger::Index) && h.is_extended(Finger::Middle) && h.extended_count() == 2
        },
        "WATER" => |h| {
            h.is_extended(Finger::Index)
                && h.is_extended(Finger::Middle)
                && h.is_extended(Finger::Ring)
                && h.extended_count() == 3
        },
        "YES" => |h| h.is_extended(Finger::Thumb) && h.extended_count() == 1,
        "STOP" => |h| h.extended_count() == 0,
        _ => return None,
    };
    Some(SignPredicate::pose(move |desc| f(desc.primary())))
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
pub(crate) fn always(word: &str, hands: RequiredHands) -> SignDefinition {
    SignDefinition::new(word, hands, "", SignPredicate::pose(|_| true))
}
