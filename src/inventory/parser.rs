//! Turns raw recognition-model text into typed items.
//!
//! Only JSON syntax is enforced. Individual fields are decoded leniently:
//! coordinates may be numbers or numeric strings, and missing fields are
//! carried as absent rather than rejected.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::MalformedAnnotationError;
use crate::models::{NormalizedBox, RawItem};

const FENCE: &str = "```";
const LANGUAGE_TAG: &str = "json";

/// Remove markdown code fences and a `json` language tag, whether it follows a fence
/// (optionally after spaces) or leads the text on its own
pub fn clean_model_text(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find(FENCE) {
        cleaned.push_str(&rest[..pos]);
        rest = strip_language_tag(&rest[pos + FENCE.len()..]);
    }
    cleaned.push_str(rest);

    strip_language_tag(cleaned.trim()).trim().to_string()
}

/// Drop a leading `json` tag. The tag must end the word: `jsonify` is left alone.
fn strip_language_tag(text: &str) -> &str {
    let candidate = text.trim_start_matches([' ', '\t']);
    let Some(tag) = candidate.get(..LANGUAGE_TAG.len()) else {
        return text;
    };
    if !tag.eq_ignore_ascii_case(LANGUAGE_TAG) {
        return text;
    }

    let after = &candidate[LANGUAGE_TAG.len()..];
    match after.chars().next() {
        None => after,
        Some(c) if c.is_whitespace() || c == '{' => after,
        Some(_) => text,
    }
}

/// Parse cleaned model text as exactly one JSON object
pub fn parse_object(raw: &str) -> Result<Map<String, Value>, MalformedAnnotationError> {
    let cleaned = clean_model_text(raw);
    if cleaned.is_empty() {
        return Err(MalformedAnnotationError::new("empty response", &cleaned));
    }

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(MalformedAnnotationError::new("not a JSON object", &cleaned)),
        Err(e) => Err(MalformedAnnotationError::new(e.to_string(), &cleaned)),
    }
}

/// Items of one tile, in the order the model listed them
pub type RawItems = Vec<(String, RawItem)>;

/// Parse one tile's annotation into (name, item) pairs
pub fn parse_annotation(raw: &str) -> Result<RawItems, MalformedAnnotationError> {
    let object = parse_object(raw)?;
    let mut items = Vec::with_capacity(object.len());

    for (name, value) in object {
        let Value::Object(fields) = value else {
            warn!(item = %name, "skipping item whose value is not an object");
            continue;
        };
        let item = parse_item(&name, &fields);
        items.push((name, item));
    }

    Ok(items)
}

fn parse_item(name: &str, fields: &Map<String, Value>) -> RawItem {
    let bounding_boxes = match fields.get("bounding_boxes") {
        Some(Value::Array(boxes)) => boxes
            .iter()
            .filter_map(|b| {
                let parsed = parse_box(b);
                if parsed.is_none() {
                    warn!(item = %name, value = %b, "dropping box with missing or non-numeric coordinates");
                }
                parsed
            })
            .collect(),
        Some(other) => {
            warn!(item = %name, value = %other, "bounding_boxes is not a list");
            Vec::new()
        }
        None => Vec::new(),
    };

    RawItem {
        quantity: fields.get("quantity").and_then(scalar_text),
        cost_per_item: fields.get("cost_per_item").and_then(scalar_text),
        bounding_boxes,
    }
}

fn parse_box(value: &Value) -> Option<NormalizedBox> {
    let fields = value.as_object()?;
    Some(NormalizedBox {
        x1: coordinate(fields.get("x1")?)?,
        y1: coordinate(fields.get("y1")?)?,
        x2: coordinate(fields.get("x2")?)?,
        y2: coordinate(fields.get("y2")?)?,
    })
}

/// Numbers as-is, numeric strings parsed
pub fn coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Verbatim text of a scalar field; `null` and containers count as absent
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
