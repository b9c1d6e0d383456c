//! IPC message dispatch: parse s-expressions and route to the engine.

use lexpr::Value;
use tracing::{debug, warn};

use super::sexp::{get_float, get_int, get_keyword, get_string, parse_frame};
use crate::recognition::{FrameOutcome, RecognitionSession};
use crate::transcript::{format_clock, Transcript};

/// Everything a message can act on.
pub struct AppState {
    pub session: RecognitionSession,
    pub transcript: Transcript,
    /// Timestamp of the latest frame, used to label saved sentences.
    pub clock_s: f64,
}

impl AppState {
    pub fn new(session: RecognitionSession) -> Self {
        Self {
            session,
            transcript: Transcript::new(),
            clock_s: 0.0,
        }
    }

    /// Save any unsaved sentence, labelled with the latest frame time, and
    /// render the whole transcript.
    pub fn export_transcript(&mut self) -> String {
        if !self.transcript.words().is_empty() {
            self.transcript.save_sentence(format_clock(self.clock_s));
        }
        self.transcript.export()
    }
}

/// Parse an s-expression message and dispatch to the appropriate handler.
/// Returns an optional response string (s-expression); blank lines get none.
pub fn handle_message(state: &mut AppState, raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    let value = match lexpr::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("malformed s-expression: {}", e);
            return Some(error_response(0, &format!("malformed s-expression: {e}")));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);

    match msg_type.as_deref() {
        Some("frame") => handle_frame(state, msg_id, &value),
        Some("reset") => handle_reset(state, msg_id),
        Some("status") => handle_status(state, msg_id),
        Some("config") => handle_config(state, msg_id, &value),
        Some("clear") => handle_clear(state, msg_id),
        Some("save") => handle_save(state, msg_id, &value),
        Some("lookup") => handle_lookup(state, msg_id, &value),
        Some("catalogue") => handle_catalogue(state, msg_id),
        Some(other) => {
            debug!("unknown message type: {}", other);
            Some(error_response(msg_id, &format!("unknown message type: {other}")))
        }
        None => Some(error_response(msg_id, "missing :type")),
    }
}

// ── Handlers ───────────────────────────────────────────────

fn handle_frame(state: &mut AppState, msg_id: i64, value: &Value) -> Option<String> {
    let frame = match parse_frame(value) {
        Ok(f) => f,
        Err(e) => return Some(error_response(msg_id, &e.to_string())),
    };
    state.clock_s = frame.timestamp_s;

    let outcome = state.session.process_frame(&frame.hands, frame.timestamp_s);
    if let FrameOutcome::Accepted(evt) = &outcome {
        state.transcript.push(evt);
        let word = format!("\"{}\"", escape_string(&evt.word));
        let t = format!("{:.3}", evt.timestamp_s);
        return Some(format_event("detection", &[("word", &word), ("t", &t)]));
    }

    let detail = match &outcome {
        FrameOutcome::Skipped(e) => format!(" :reason \"{}\"", escape_string(&e.to_string())),
        FrameOutcome::Pending { word, votes } => {
            format!(" :word \"{}\" :votes {}", escape_string(word), votes)
        }
        FrameOutcome::Suppressed { word, remaining_s } => {
            format!(" :word \"{}\" :remaining {:.2}", escape_string(word), remaining_s)
        }
        _ => String::new(),
    };
    Some(format!(
        "(:type :response :id {} :status :ok :outcome :{}{})",
        msg_id,
        outcome.as_str(),
        detail
    ))
}

fn handle_reset(state: &mut AppState, msg_id: i64) -> Option<String> {
    state.session.reset();
    Some(ok_response(msg_id))
}

fn handle_status(state: &mut AppState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :session {} :sentence \"{}\" :saved {})",
        msg_id,
        state.session.status_sexp(state.clock_s),
        escape_string(&state.transcript.sentence()),
        state.transcript.history().len(),
    ))
}

fn handle_config(state: &mut AppState, msg_id: i64, value: &Value) -> Option<String> {
    let cooldown = get_float(value, "cooldown");
    let epsilon = get_float(value, "epsilon");

    // Validate everything before applying anything.
    if let Some(c) = cooldown {
        if !c.is_finite() || c < 0.0 {
            return Some(error_response(msg_id, ":cooldown must be a non-negative number"));
        }
    }
    if let Some(e) = epsilon {
        if !e.is_finite() || e < 0.0 {
            return Some(error_response(msg_id, ":epsilon must be a non-negative number"));
        }
    }

    if let Some(c) = cooldown {
        state.session.set_cooldown(c);
    }
    if let Some(e) = epsilon {
        state.session.set_extension_epsilon(e as f32);
    }
    if cooldown.is_some() || epsilon.is_some() {
        debug!("config updated: {}", state.session.config_sexp());
    }

    Some(format!(
        "(:type :response :id {} :status :ok :config {})",
        msg_id,
        state.session.config_sexp()
    ))
}

fn handle_clear(state: &mut AppState, msg_id: i64) -> Option<String> {
    state.transcript.clear_sentence();
    state.session.clear_votes();
    Some(ok_response(msg_id))
}

fn handle_save(state: &mut AppState, msg_id: i64, value: &Value) -> Option<String> {
    let at = get_string(value, "at").unwrap_or_else(|| format_clock(state.clock_s));
    let entry = match state.transcript.save_sentence(at) {
        Some(e) => format!(
            "(:at \"{}\" :text \"{}\")",
            escape_string(&e.at),
            escape_string(&e.text)
        ),
        None => "nil".to_string(),
    };
    Some(format!(
        "(:type :response :id {} :status :ok :entry {})",
        msg_id, entry
    ))
}

fn handle_lookup(state: &mut AppState, msg_id: i64, value: &Value) -> Option<String> {
    let text = match get_string(value, "text") {
        Some(t) => t,
        None => return Some(error_response(msg_id, "missing :text")),
    };
    let catalogue = state.session.catalogue();
    let entries: Vec<String> = catalogue
        .lookup_phrase(&text)
        .iter()
        .map(|entry| match entry.definition {
            Some(def) => format!(
                "(:word \"{}\" :known t :hands :{} :description \"{}\")",
                escape_string(&entry.word),
                def.required_hands.as_str(),
                escape_string(&def.description),
            ),
            None => format!("(:word \"{}\" :known nil)", escape_string(&entry.word)),
        })
        .collect();
    let words = if entries.is_empty() {
        "nil".to_string()
    } else {
        format!("({})", entries.join(" "))
    };
    Some(format!(
        "(:type :response :id {} :status :ok :words {})",
        msg_id, words
    ))
}

fn handle_catalogue(state: &mut AppState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :catalogue {})",
        msg_id,
        state.session.catalogue().catalogue_sexp()
    ))
}

// ── Helpers ────────────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

pub fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

/// Escape a string for s-expression output.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Format an IPC event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}
