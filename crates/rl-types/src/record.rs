use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;

/// Field carrying the record kind tag.
pub const KIND_FIELD: &str = "kind";
/// Field carrying the identity that created the record.
pub const CREATOR_FIELD: &str = "creator";
/// Field carrying the identity that last wrote the record.
pub const UPDATED_BY_FIELD: &str = "updatedBy";

/// A ledger record: one JSON object.
///
/// Field values the schema knows about are strings. Fields the schema does
/// not name are carried through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a record from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| TypeError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(TypeError::NotAnObject(json_type_name(&other))),
        }
    }

    /// The string value of `field`.
    ///
    /// Absent and `null` fields read as `None`; any non-string value is a
    /// type error.
    pub fn text(&self, field: &str) -> Result<Option<&str>, TypeError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(TypeError::FieldType {
                field: field.to_string(),
                actual: json_type_name(other),
            }),
        }
    }

    /// The string value of `field`, or `""` when absent or not a string.
    pub fn text_or_empty(&self, field: &str) -> &str {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Ensure every named field is a string, `null`, or absent.
    pub fn ensure_text_fields<'a, I>(&self, fields: I) -> Result<(), TypeError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for field in fields {
            self.text(field)?;
        }
        Ok(())
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), Value::String(value.into()));
    }

    pub fn kind(&self) -> &str {
        self.text_or_empty(KIND_FIELD)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Serialized form persisted in the ledger.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(&self.fields).map_err(|e| TypeError::InvalidJson(e.to_string()))
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_objects_only() {
        assert!(Record::from_slice(br#"{"id":"H1"}"#).is_ok());
        assert_eq!(
            Record::from_slice(b"[1,2]").unwrap_err(),
            TypeError::NotAnObject("array")
        );
        assert!(matches!(
            Record::from_slice(b"{not json").unwrap_err(),
            TypeError::InvalidJson(_)
        ));
    }

    #[test]
    fn text_distinguishes_absent_null_and_wrong_type() {
        let r = Record::from_value(json!({"a": "x", "b": null, "c": 8})).unwrap();
        assert_eq!(r.text("a").unwrap(), Some("x"));
        assert_eq!(r.text("b").unwrap(), None);
        assert_eq!(r.text("missing").unwrap(), None);
        assert_eq!(
            r.text("c").unwrap_err(),
            TypeError::FieldType {
                field: "c".into(),
                actual: "number"
            }
        );
        assert_eq!(r.text_or_empty("c"), "");
    }

    #[test]
    fn ensure_text_fields_reports_first_bad_field() {
        let r = Record::from_value(json!({"a": "x", "b": true})).unwrap();
        assert!(r.ensure_text_fields(["a", "z"]).is_ok());
        assert!(r.ensure_text_fields(["a", "b"]).is_err());
    }

    #[test]
    fn set_overwrites_and_preserves_unknown_fields() {
        let mut r = Record::from_value(json!({"creator": "forged", "extra": [1]})).unwrap();
        r.set(CREATOR_FIELD, "alice");
        r.set(KIND_FIELD, "header");
        assert_eq!(r.text_or_empty(CREATOR_FIELD), "alice");
        assert_eq!(r.kind(), "header");
        assert_eq!(r.as_map()["extra"], json!([1]));
    }

    #[test]
    fn bytes_roundtrip() {
        let r = Record::from_value(json!({"id": "H1", "kind": "header"})).unwrap();
        let bytes = r.to_bytes().unwrap();
        assert_eq!(Record::from_slice(&bytes).unwrap(), r);
    }
}
