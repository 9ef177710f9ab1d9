//! Canonical content for test records.
//!
//! A test's content is a flat mapping from field name to value whose shape
//! depends on the declared test type. Normalization turns the raw string
//! fields of an authoring request into that canonical mapping: control
//! fields are stripped, the server-decided audio path is injected, and a
//! per-type coercion rewrites known fields (comma lists, boolean answers).
//!
//! This is best-effort shaping, not schema validation: a field with the
//! wrong shape for its type passes through verbatim.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// The canonical content mapping as stored and returned.
pub type Content = Map<String, Value>;

/// Reserved field carrying the server-relative path of the attached audio
/// asset. Always server-decided — a client-supplied value is discarded.
pub const AUDIOFILE_FIELD: &str = "audiofile";

type Coercer = fn(&mut Content);

/// Type tag to coercion strategy. Adding a test type is one line here.
const REGISTRY: &[(&str, Coercer)] = &[
    ("multiple_choice", coerce_answers),
    ("input-choice", coerce_answers),
    ("true_false", coerce_correct_answer),
    ("fill_in_blank", coerce_blanks),
];

/// Build the canonical content mapping for a test of the given kind.
///
/// `audio_path` is the asset path the server decided on for this request
/// (freshly stored upload, or the retained prior asset on update). `None`
/// leaves the record without an audio reference.
pub fn normalize(
    kind: &str,
    raw_fields: HashMap<String, String>,
    audio_path: Option<&str>,
) -> Content {
    let mut content: Content = raw_fields
        .into_iter()
        .filter(|(name, _)| name != "type" && name != "title" && name != AUDIOFILE_FIELD)
        .map(|(name, value)| (name, Value::String(value)))
        .collect();

    if let Some(&(_, coerce)) = REGISTRY.iter().find(|(tag, _)| *tag == kind) {
        coerce(&mut content);
    }

    if let Some(path) = audio_path {
        content.insert(AUDIOFILE_FIELD.to_string(), Value::String(path.to_string()));
    }

    content
}

/// Parse stored content text back into its mapping. The read path is the
/// identity of the canonical form — no inverse transform.
pub fn decode(stored: &str) -> Result<Content, serde_json::Error> {
    serde_json::from_str(stored)
}

fn coerce_answers(content: &mut Content) {
    split_list(content, "answers");
}

fn coerce_blanks(content: &mut Content) {
    split_list(content, "blanks");
}

/// `"true"` and only `"true"` means true; every other string is false.
fn coerce_correct_answer(content: &mut Content) {
    if let Some(Value::String(s)) = content.get("correctAnswer") {
        let answer = s == "true";
        content.insert("correctAnswer".to_string(), Value::Bool(answer));
    }
}

/// Comma-split, trim, drop empties, keep order.
fn split_list(content: &mut Content, field: &str) {
    if let Some(Value::String(s)) = content.get(field) {
        let items: Vec<Value> = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect();
        content.insert(field.to_string(), Value::Array(items));
    }
}
