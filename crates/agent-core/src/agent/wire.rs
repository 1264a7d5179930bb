use serde::{Deserialize, Serialize};

pub const CODE_FENCE: &str = "```";

/// The JSON object the model is asked to reply with.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct MoveReplyWire {
    #[serde(rename = "move", default)]
    pub move_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub thinking: String,
}

impl MoveReplyWire {
    /// The proposed move, trimmed and lowercased for lookup.
    pub fn normalized_move(&self) -> String {
        self.move_name.trim().to_lowercase()
    }
}

fn null_as_empty<'de, D>(de: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyParseError {
    #[error("empty reply")]
    Empty,
    #[error("invalid reply json: {0}")]
    InvalidJson(String),
    #[error("reply json is not an object")]
    NotAnObject,
    #[error("invalid reply fields: {0}")]
    InvalidFields(String),
}

/// Best-effort removal of a surrounding markdown code fence.
///
/// Text that does not start with a fence is returned unchanged, whitespace
/// included; callers trim first. For fenced text the opening fence line is
/// dropped, then everything from the last fence onward, and the body is
/// trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with(CODE_FENCE) {
        return text;
    }
    let body = text
        .split_once('\n')
        .map_or(text, |(_fence_line, rest)| rest);
    let body = body.rfind(CODE_FENCE).map_or(body, |end| &body[..end]);
    body.trim()
}

fn parse_object(json_str: &str) -> Result<MoveReplyWire, ReplyParseError> {
    let value: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| ReplyParseError::InvalidJson(e.to_string()))?;
    // serde accepts sequences for structs; the contract is an object.
    if !value.is_object() {
        return Err(ReplyParseError::NotAnObject);
    }
    serde_json::from_value(value).map_err(|e| ReplyParseError::InvalidFields(e.to_string()))
}

/// Parses raw model text into a move reply.
///
/// Contract:
/// - Surrounding whitespace and an optional code fence are removed
/// - The remainder is a JSON object with optional string fields `move` and `thinking`
pub fn parse_move_reply(raw: &str) -> Result<MoveReplyWire, ReplyParseError> {
    let stripped = strip_code_fence(raw.trim());
    if stripped.is_empty() {
        return Err(ReplyParseError::Empty);
    }
    parse_object(stripped)
}
