//! JSON-like value model with an explicit opaque variant
//!
//! `serde_json::Value` cannot say "do not touch this": a base64 string and a
//! user's display name look the same. `Value` keeps binary, timestamp, and file
//! payloads in `Opaque` until the moment they are encoded for the wire.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};

/// A body, query map, or response payload as seen by the codec.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Opaque(Opaque),
}

/// Payloads whose internals are not user data.
#[derive(Debug, Clone, PartialEq)]
pub enum Opaque {
    Bytes(Bytes),
    Timestamp(DateTime<Utc>),
    File(FileData),
}

/// An uploaded file: name and content type travel with the raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FileData {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A multipart form. Field order is preserved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Form {
    pub fields: Vec<(String, FormPart)>,
}

/// One multipart field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text(String),
    File(FileData),
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), FormPart::Text(value.into())));
        self
    }

    /// Append a file field.
    pub fn file(mut self, name: impl Into<String>, file: FileData) -> Self {
        self.fields.push((name.into(), FormPart::File(file)));
        self
    }

    /// Field names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

impl Value {
    /// Look up a key on an object. Returns `None` for every other variant.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Parse a JSON document. An empty slice is `Null`, not an error, since
    /// 204 responses and bodiless errors are common.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice::<serde_json::Value>(bytes).map(Value::from)
    }

    /// Encode for the wire. Opaque bytes and files become base64 strings,
    /// timestamps become RFC 3339 strings.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => serde_json::Value::Number(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Value::into_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into_json())).collect(),
            ),
            Value::Opaque(Opaque::Bytes(bytes)) => {
                serde_json::Value::String(STANDARD.encode(&bytes))
            }
            Value::Opaque(Opaque::Timestamp(at)) => {
                serde_json::Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Opaque(Opaque::File(file)) => {
                serde_json::Value::String(STANDARD.encode(&file.bytes))
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Opaque> for Value {
    fn from(value: Opaque) -> Self {
        Value::Opaque(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Value::Object(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_parses_as_null() {
        assert_eq!(Value::from_slice(b"").unwrap(), Value::Null);
        assert_eq!(Value::from_slice(b"  \n").unwrap(), Value::Null);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Value::from_slice(b"<html>").is_err());
    }

    #[test]
    fn json_conversion_preserves_structure() {
        let original = json!({"a": [1, true, null, "x"], "b": {"c": 2.5}});
        let value = Value::from(original.clone());
        assert_eq!(value.get("b").and_then(|b| b.get("c")), Some(&Value::Number(
            serde_json::Number::from_f64(2.5).unwrap()
        )));
        assert_eq!(value.into_json(), original);
    }

    #[test]
    fn opaque_bytes_encode_as_base64() {
        let value = Value::Opaque(Opaque::Bytes(Bytes::from_static(b"\x00\xffhi")));
        assert_eq!(value.into_json(), json!("AP9oaQ=="));
    }

    #[test]
    fn timestamp_encodes_as_rfc3339() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let value = Value::Opaque(Opaque::Timestamp(at));
        assert_eq!(value.into_json(), json!("2024-03-01T09:30:00.000Z"));
    }

    #[test]
    fn form_builder_keeps_field_order() {
        let form = Form::new()
            .text("displayName", "Ann")
            .file(
                "avatarImage",
                FileData {
                    file_name: "a.png".into(),
                    content_type: Some("image/png".into()),
                    bytes: Bytes::from_static(b"png"),
                },
            );
        assert_eq!(form.names().collect::<Vec<_>>(), ["displayName", "avatarImage"]);
    }
}
