use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::extractor::Captures;

/// Capture key whose text is expected to be JSON.
pub const DEFAULT_BODY_FIELD: &str = "response_body";

/// Caller context key, defaulted to null when the reply does not carry it.
pub const DEFAULT_CONTEXT_FIELD: &str = "prompt";

/// The designated field held text that is not valid JSON.
#[derive(Debug, thiserror::Error)]
#[error("`{field}` is not valid JSON ({source}): {text}")]
pub struct DecodeError {
    pub field: String,
    /// The normalized text that failed to decode.
    pub text: String,
    #[source]
    pub source: serde_json::Error,
}

// ── Final record ─────────────────────────────────────────────────────────────

/// Captured fields with the body decoded. Keeps capture order when
/// serialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
    body_field: String,
    body_is_structured: bool,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    /// The decoded designated field, or `None` when the reply lacked it.
    pub fn body(&self) -> Option<&Value> {
        self.get(&self.body_field).filter(|v| !v.is_null())
    }

    pub fn body_is_structured(&self) -> bool {
        self.body_is_structured
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_value(&self) -> Value {
        let map = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }

    fn set(&mut self, field: &str, value: Value) {
        match self.fields.iter_mut().find(|(k, _)| k == field) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ── Body decoding ────────────────────────────────────────────────────────────

/// Trim spaces and newlines at both ends, then drop every embedded newline.
pub fn normalize_body(text: &str) -> String {
    text.trim_matches(|c| c == ' ' || c == '\n').replace('\n', "")
}

/// Decodes the designated field of a capture mapping into JSON.
#[derive(Debug, Clone)]
pub struct BodyDecoder {
    body_field: String,
    context_field: String,
}

impl Default for BodyDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_FIELD, DEFAULT_CONTEXT_FIELD)
    }
}

impl BodyDecoder {
    pub fn new(body_field: impl Into<String>, context_field: impl Into<String>) -> Self {
        Self {
            body_field: body_field.into(),
            context_field: context_field.into(),
        }
    }

    pub fn decode(&self, captures: Captures) -> Result<Record, DecodeError> {
        let mut record = Record {
            fields: Vec::with_capacity(captures.len() + 2),
            body_field: self.body_field.clone(),
            body_is_structured: false,
        };

        for (name, text) in captures {
            if name == self.body_field {
                let normalized = normalize_body(&text);
                let value = serde_json::from_str(&normalized).map_err(|source| DecodeError {
                    field: name.clone(),
                    text: normalized,
                    source,
                })?;
                record.fields.push((name, value));
                record.body_is_structured = true;
            } else {
                record.fields.push((name, Value::String(text)));
            }
        }

        if record.get(&self.body_field).is_none() {
            record.set(&self.body_field, Value::Null);
        }
        if record.get(&self.context_field).is_none() {
            record.set(&self.context_field, Value::Null);
        }
        Ok(record)
    }
}

/// Decode with the default field names.
pub fn decode(captures: Captures) -> Result<Record, DecodeError> {
    BodyDecoder::default().decode(captures)
}
