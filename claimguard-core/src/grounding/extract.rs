//! JSON extraction from raw model text and normalization of clause shapes.
//!
//! The collaborator returns text that should be a JSON object, possibly
//! wrapped in a markdown fence. Extraction prefers a ```` ```json ```` fence,
//! then a bare fence, then the whole string.

use serde_json::{json, Map, Value};

use super::types::{ClauseShape, GeneratedClause, ModelOutput, PolicyCitation};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Locate the JSON payload inside a model response.
///
/// An unterminated fence yields everything after the opening marker.
pub fn extract_json_block(response: &str) -> &str {
    if let Some(start) = response.find(JSON_FENCE) {
        let rest = &response[start + JSON_FENCE.len()..];
        let end = rest.find(FENCE).unwrap_or(rest.len());
        return rest[..end].trim();
    }

    if let Some(start) = response.find(FENCE) {
        let rest = &response[start + FENCE.len()..];
        let end = rest.find(FENCE).unwrap_or(rest.len());
        return rest[..end].trim();
    }

    response.trim()
}

/// Parse a model response into a JSON object.
///
/// Anything that is not a JSON object after fence stripping is an error.
pub fn parse_model_json(response: &str) -> crate::error::Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(extract_json_block(response))? {
        Value::Object(map) => Ok(map),
        other => Err(crate::error::Error::LLM(format!(
            "Expected a JSON object from the model, got {}",
            json_kind(&other)
        ))),
    }
}

/// Parse a model response, substituting [`escalation_default`] on failure.
///
/// Returns the output and whether the fallback was used.
pub fn parse_or_escalate(response: &str) -> (ModelOutput, bool) {
    match parse_model_json(response) {
        Ok(map) => (ModelOutput::from_value(Value::Object(map)), false),
        Err(e) => {
            tracing::warn!(error = %e, "Unparsable model response, escalating for manual review");
            (ModelOutput::from_value(escalation_default()), true)
        }
    }
}

/// Fixed output used when the model response cannot be parsed.
pub fn escalation_default() -> Value {
    json!({
        "decision": "escalated",
        "confidence": 0.60,
        "reasoning": "Unable to parse LLM response. Escalating for manual review.",
        "payout_amount": null,
        "conditions": [],
        "risk_flags": ["LLM response parse failure"],
        "compliance_notes": "Requires manual review"
    })
}

/// Read one clause array into canonical clauses.
pub(crate) fn normalize_clauses(raw: &Value, shape: ClauseShape) -> Vec<GeneratedClause> {
    entries(raw, shape.key())
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let (text_key, impact_key, alias_key, type_raw) = match shape {
                ClauseShape::Policy => (
                    "clause_text",
                    "impact_on_claim",
                    "impact",
                    text_field(entry, "clause_type"),
                ),
                ClauseShape::Legacy => {
                    ("clause_excerpt", "impact", "impact_on_claim", String::new())
                }
            };
            let (section_number, section_is_text) = section_field(entry);
            let title = text_field(entry, "section_title");

            GeneratedClause {
                shape,
                index,
                section_number,
                section_is_text,
                section_title: (!title.is_empty()).then_some(title),
                clause_type_raw: type_raw,
                clause_text: text_field(entry, text_key),
                impact_raw: text_field(entry, impact_key),
                impact_alias_raw: text_field(entry, alias_key),
            }
        })
        .collect()
}

/// Read `policy_text_citations[]`.
pub(crate) fn normalize_citations(raw: &Value) -> Vec<PolicyCitation> {
    entries(raw, "policy_text_citations")
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let (section_number, section_is_text) = section_field(entry);
            PolicyCitation {
                index,
                section_number,
                section_is_text,
                quoted_text: text_field(entry, "quoted_text"),
            }
        })
        .collect()
}

fn entries<'a>(raw: &'a Value, key: &str) -> &'a [Value] {
    raw.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Section number as text, and whether the model actually sent a string.
/// Non-string values keep their JSON text for reporting only.
fn section_field(entry: &Value) -> (String, bool) {
    let is_text = matches!(entry.get("section_number"), Some(Value::String(_)));
    (text_field(entry, "section_number"), is_text)
}

/// String view of a field. Null or missing is empty; other scalars use their
/// JSON text so they are still reported verbatim.
fn text_field(entry: &Value, key: &str) -> String {
    match entry.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
