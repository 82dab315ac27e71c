//! Decoding of stored embedding columns into canonical `Vec<f32>` vectors.
//!
//! The datastore may hand back an embedding as a native JSON array, as a string
//! holding a JSON array, or as a string holding a bracketed literal (pgvector
//! text form `[1,2,3]`, or a tuple `(1.0, 2.0)`). [`classify`] tags the raw
//! value and [`decode_embedding`] turns the tag into a vector. Nothing outside
//! the gateway sees the raw forms.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed embedding: {0}")]
pub struct MalformedEmbedding(pub String);

/// A stored embedding column before decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEmbedding<'a> {
    /// `null`, missing, or an empty string.
    Absent,
    /// A native JSON array.
    Native(&'a [Value]),
    /// A string holding a JSON array.
    Json(&'a str),
    /// A string holding a bracketed or parenthesised comma-separated list.
    Literal(&'a str),
}

/// Tag a raw column value.
pub fn classify(value: Option<&Value>) -> Result<RawEmbedding<'_>, MalformedEmbedding> {
    match value {
        None | Some(Value::Null) => Ok(RawEmbedding::Absent),
        Some(Value::Array(items)) => Ok(RawEmbedding::Native(items)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(RawEmbedding::Absent)
            } else if trimmed.starts_with('[') && serde_json::from_str::<Value>(trimmed).is_ok() {
                Ok(RawEmbedding::Json(trimmed))
            } else {
                Ok(RawEmbedding::Literal(trimmed))
            }
        }
        Some(other) => Err(MalformedEmbedding(format!(
            "unexpected {} value",
            json_kind(other)
        ))),
    }
}

/// Decode a raw column value. `Ok(None)` means no embedding is stored.
pub fn decode_embedding(value: Option<&Value>) -> Result<Option<Vec<f32>>, MalformedEmbedding> {
    let vector = match classify(value)? {
        RawEmbedding::Absent => return Ok(None),
        RawEmbedding::Native(items) => from_items(items)?,
        RawEmbedding::Json(text) => {
            let items: Vec<Value> = serde_json::from_str(text)
                .map_err(|e| MalformedEmbedding(format!("invalid JSON array: {e}")))?;
            from_items(&items)?
        }
        RawEmbedding::Literal(text) => parse_literal(text)?,
    };

    if vector.is_empty() {
        return Err(MalformedEmbedding("empty vector".into()));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(MalformedEmbedding("non-finite component".into()));
    }
    Ok(Some(vector))
}

fn from_items(items: &[Value]) -> Result<Vec<f32>, MalformedEmbedding> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| MalformedEmbedding(format!("item {i} is not a number")))
        })
        .collect()
}

fn parse_literal(text: &str) -> Result<Vec<f32>, MalformedEmbedding> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .or_else(|| text.strip_prefix('(').and_then(|t| t.strip_suffix(')')))
        .ok_or_else(|| MalformedEmbedding("not a bracketed list".into()))?;

    inner
        .split(',')
        .map(str::trim)
        // tolerate a trailing comma, as in a one-element tuple
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f32>()
                .map_err(|_| MalformedEmbedding(format!("cannot parse {part:?} as a number")))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
