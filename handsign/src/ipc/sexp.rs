//! S-expression plist helpers and decoders for frames and catalogue tables.
//!
//! Both keyword forms are accepted: `Value::Keyword("key")` from the elisp
//! parser and `Value::Symbol(":key")` from the default parser.

use lexpr::Value;
use thiserror::Error;

use crate::recognition::{
    CatalogueError, CatalogueRow, Frame, HandObservation, HandPosition, Handedness, Keypoint,
    PalmDirection, PoseRule, RequiredHands,
};

/// A message field that could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("missing :{0}")]
    Missing(&'static str),
    #[error("invalid :{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> DecodeError {
    DecodeError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ── Plist access ───────────────────────────────────────────

/// Raw value following `:key` in a plist.
pub fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Value following `:key`, rendered as a bare string.
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    get_value(value, key).map(atom_text)
}

pub fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

pub fn get_int(value: &Value, key: &str) -> Option<i64> {
    match get_value(value, key)? {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

pub fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_value(value, key).and_then(as_f64)
}

/// Text of an atom: keywords and symbols lose their leading colon,
/// `nil`/`()` become "nil".
pub fn atom_text(value: &Value) -> String {
    match value {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s: &str = v;
            s.strip_prefix(':').unwrap_or(s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => (if *b { "t" } else { "nil" }).to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        other => other.to_string(),
    }
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn is_nil(value: &Value) -> bool {
    match value {
        Value::Null | Value::Nil | Value::Bool(false) => true,
        Value::Symbol(s) => &**s == "nil",
        _ => false,
    }
}

/// Top-level elements of a proper list. `nil` and `()` give an empty vec;
/// a dotted tail is ignored.
pub fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        items.push(pair.car());
        current = pair.cdr();
    }
    if let Value::Vector(v) = value {
        items.extend(v.iter());
    }
    items
}

// ── Frames ─────────────────────────────────────────────────

/// Decode `(x y)` or `(x y z)`.
pub fn parse_keypoint(value: &Value) -> Result<Keypoint, DecodeError> {
    let coords = list_items(value)
        .into_iter()
        .map(as_f64)
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| invalid("points", format!("non-numeric point {}", value)))?;
    match coords.as_slice() {
        [x, y] => Ok(Keypoint::new(*x as f32, *y as f32, 0.0)),
        [x, y, z] => Ok(Keypoint::new(*x as f32, *y as f32, *z as f32)),
        _ => Err(invalid(
            "points",
            format!("expected 2 or 3 coordinates, got {}", coords.len()),
        )),
    }
}

/// Decode `(:handedness left :points ((x y z) ...))`.
///
/// The keypoint count is not checked here; the extractor rejects
/// observations of the wrong size.
pub fn parse_hand(value: &Value) -> Result<HandObservation, DecodeError> {
    let handedness = get_keyword(value, "handedness")
        .map(|s| Handedness::parse(&s))
        .unwrap_or_default();
    let points = get_value(value, "points").ok_or(DecodeError::Missing("points"))?;
    let keypoints = list_items(points)
        .into_iter()
        .map(parse_keypoint)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HandObservation::new(handedness, keypoints))
}

/// Decode a frame message: `:t` seconds and an optional `:hands` list.
pub fn parse_frame(value: &Value) -> Result<Frame, DecodeError> {
    let timestamp_s = match get_value(value, "t") {
        Some(v) => as_f64(v).ok_or_else(|| invalid("t", format!("not a number: {}", v)))?,
        None => return Err(DecodeError::Missing("t")),
    };
    if !timestamp_s.is_finite() {
        return Err(invalid("t", "not finite"));
    }
    let hands = match get_value(value, "hands") {
        Some(v) => list_items(v)
            .into_iter()
            .map(parse_hand)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(Frame { timestamp_s, hands })
}

// ── Catalogue tables ───────────────────────────────────────

fn finger_requirement(value: &Value) -> Result<Option<bool>, CatalogueError> {
    if is_nil(value) {
        return Ok(Some(false));
    }
    match atom_text(value).to_ascii_lowercase().as_str() {
        "t" | "extended" | "up" => Ok(Some(true)),
        "curled" | "down" => Ok(Some(false)),
        "_" | "any" => Ok(None),
        other => Err(CatalogueError::Parse(format!(
            "unknown finger requirement {:?}",
            other
        ))),
    }
}

fn rule_count(value: &Value, key: &str) -> Result<Option<usize>, CatalogueError> {
    match get_value(value, key) {
        None => Ok(None),
        Some(v) => match v {
            Value::Number(n) => n
                .as_u64()
                .map(|n| Some(n as usize))
                .ok_or_else(|| {
                    CatalogueError::Parse(format!(":{} must be a count, got {}", key, n))
                }),
            other => Err(CatalogueError::Parse(format!(
                ":{} must be a count, got {}",
                key, other
            ))),
        },
    }
}

/// Decode a pose rule:
/// `(:fingers (t t nil _ _) :min 1 :max 2 :palm (left right) :position high)`.
///
/// Finger entries are thumb to pinky; `t` means extended, `nil` curled and
/// `_` don't care. Every key is optional.
pub fn parse_pose_rule(value: &Value) -> Result<PoseRule, CatalogueError> {
    let mut rule = PoseRule::default();

    if let Some(fingers) = get_value(value, "fingers") {
        let items = list_items(fingers);
        if items.len() != rule.fingers.len() {
            return Err(CatalogueError::Parse(format!(
                ":fingers needs 5 entries, got {}",
                items.len()
            )));
        }
        for (slot, item) in rule.fingers.iter_mut().zip(items) {
            *slot = finger_requirement(item)?;
        }
    }

    rule.min_extended = rule_count(value, "min")?;
    rule.max_extended = rule_count(value, "max")?;

    if let Some(palm) = get_value(value, "palm") {
        let items = match palm {
            Value::Cons(_) => list_items(palm),
            single => vec![single],
        };
        for item in items {
            let name = atom_text(item);
            let dir = PalmDirection::parse(&name).ok_or_else(|| {
                CatalogueError::Parse(format!("unknown palm direction {:?}", name))
            })?;
            rule.palm.push(dir);
        }
    }

    if let Some(position) = get_value(value, "position") {
        let name = atom_text(position);
        rule.position = Some(
            HandPosition::parse(&name)
                .ok_or_else(|| CatalogueError::Parse(format!("unknown position {:?}", name)))?,
        );
    }

    Ok(rule)
}

/// Decode one `(:word "W" :hands single :description "..." :rule (...))` row.
pub fn parse_catalogue_row(value: &Value) -> Result<CatalogueRow, CatalogueError> {
    if !matches!(value, Value::Cons(_)) {
        return Err(CatalogueError::Parse(format!("row is not a plist: {}", value)));
    }
    let word = match get_value(value, "word") {
        Some(v) if !is_nil(v) => atom_text(v).trim().to_string(),
        _ => String::new(),
    };
    let hands = match get_value(value, "hands") {
        Some(v) => RequiredHands::parse(&atom_text(v))?,
        None => RequiredHands::default(),
    };
    let description = get_string(value, "description").unwrap_or_default();
    let rule = match get_value(value, "rule") {
        Some(v) if !is_nil(v) => Some(parse_pose_rule(v)?),
        _ => None,
    };
    Ok(CatalogueRow {
        word,
        hands,
        description,
        rule,
    })
}

/// Parse a whole catalogue table: a list of row plists.
pub fn parse_catalogue_table(src: &str) -> Result<Vec<CatalogueRow>, CatalogueError> {
    let value = lexpr::from_str(src).map_err(|e| CatalogueError::Parse(e.to_string()))?;
    list_items(&value)
        .into_iter()
        .map(parse_catalogue_row)
        .collect()
}

// ── Tests ──────────────────────────────────────────────────
