//! Raw field values as they come out of the record store
//!
//! A stored value is a scalar, a list of strings, or a text blob holding a
//! serialized nested structure (a JSON array). Legacy rows may also carry raw
//! bytes in a single-byte encoding. This module knows how to turn each of
//! those into plain text and how to decode multi-row list values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One raw value of a record field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Missing or explicitly empty value
    #[default]
    Null,
    /// Checkbox-style boolean
    Bool(bool),
    /// Numeric value, kept in its original textual precision
    Number(serde_json::Number),
    /// Plain text, possibly a serialized nested structure
    Text(String),
    /// Multi-select style list of values
    List(Vec<String>),
    /// Bytes that may not be valid UTF-8 (legacy single-byte encodings)
    #[serde(skip)]
    Bytes(Vec<u8>),
    /// Any other stored JSON: nested lists, mixed lists, objects
    Json(Value),
}

impl RawValue {
    /// Whether the value carries no data at all
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(s) => s.is_empty(),
            RawValue::List(items) => items.is_empty(),
            RawValue::Bytes(b) => b.is_empty(),
            RawValue::Json(Value::Array(items)) => items.is_empty(),
            RawValue::Json(Value::Object(map)) => map.is_empty(),
            RawValue::Json(value) => value.is_null(),
            RawValue::Bool(_) | RawValue::Number(_) => false,
        }
    }

    /// Render the value as plain text
    ///
    /// Lists are joined with `|`, booleans follow the form convention of
    /// `"1"` for checked and `""` for unchecked, and bytes are transcoded.
    pub fn to_text(&self) -> String {
        match self {
            RawValue::Null => String::new(),
            RawValue::Bool(true) => "1".to_string(),
            RawValue::Bool(false) => String::new(),
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s.clone(),
            RawValue::List(items) => items.join("|"),
            RawValue::Bytes(b) => transcode(b),
            RawValue::Json(Value::Array(items)) => {
                items.iter().map(scalar_text).collect::<Vec<_>>().join("|")
            }
            RawValue::Json(value) => scalar_text(value),
        }
    }

    /// Decode a list-like value
    ///
    /// Returns `Some` for explicit lists and for text that holds a serialized
    /// JSON array; `None` when the value is a plain scalar.
    pub fn decode_list(&self) -> Option<Vec<String>> {
        match self {
            RawValue::List(items) => Some(items.clone()),
            RawValue::Text(s) => decode_serialized_list(s),
            RawValue::Bytes(b) => decode_serialized_list(&transcode(b)),
            RawValue::Json(Value::Array(items)) => Some(items.iter().map(scalar_text).collect()),
            _ => None,
        }
    }

    /// Decode the sub-rows of a multi-row list field
    ///
    /// Each element of the serialized array is one sub-row; an element that is
    /// itself an array or object contributes one cell per member, in order.
    ///
    /// # Returns
    /// * `Ok(rows)` - Decoded sub-rows (empty for an empty value)
    /// * `Err(reason)` - The value is not a decodable list
    pub fn decode_sub_rows(&self) -> std::result::Result<Vec<Vec<String>>, String> {
        match self {
            RawValue::Null => Ok(Vec::new()),
            RawValue::List(items) => Ok(items.iter().map(|item| vec![item.clone()]).collect()),
            RawValue::Text(s) => decode_serialized_rows(s),
            RawValue::Bytes(b) => decode_serialized_rows(&transcode(b)),
            RawValue::Json(Value::Array(rows)) => Ok(rows_of(rows)),
            RawValue::Json(Value::Null) => Ok(Vec::new()),
            RawValue::Bool(_) | RawValue::Number(_) | RawValue::Json(_) => {
                Err(format!("expected a list of rows, found {}", self.to_text()))
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<u64> for RawValue {
    fn from(n: u64) -> Self {
        RawValue::Number(n.into())
    }
}

/// Turn bytes into text: UTF-8 when valid, otherwise Latin-1
pub fn transcode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn decode_serialized_list(s: &str) -> Option<Vec<String>> {
    if !s.trim_start().starts_with('[') {
        return None;
    }
    serde_json::from_str::<Vec<Value>>(s)
        .ok()
        .map(|items| items.iter().map(scalar_text).collect())
}

fn decode_serialized_rows(s: &str) -> std::result::Result<Vec<Vec<String>>, String> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<Value> = serde_json::from_str(s).map_err(|e| e.to_string())?;
    Ok(rows_of(&rows))
}

fn rows_of(rows: &[Value]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => cells.iter().map(scalar_text).collect(),
            Value::Object(map) => map.values().map(scalar_text).collect(),
            other => vec![scalar_text(other)],
        })
        .collect()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        nested => nested.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_text_scalars() {
        assert_eq!(RawValue::Null.to_text(), "");
        assert_eq!(RawValue::Bool(true).to_text(), "1");
        assert_eq!(RawValue::Bool(false).to_text(), "");
        assert_eq!(RawValue::from(42u64).to_text(), "42");
        assert_eq!(
            RawValue::List(vec!["a".into(), "b".into()]).to_text(),
            "a|b"
        );
    }

    #[test]
    fn test_transcode_latin1_fallback() {
        assert_eq!(transcode("café".as_bytes()), "café");
        // 0xE9 alone is not valid UTF-8; Latin-1 reads it as é
        assert_eq!(transcode(&[b'c', b'a', b'f', 0xE9]), "café");
    }

    #[test]
    fn test_decode_list_only_for_serialized_arrays() {
        assert_eq!(
            RawValue::from(r#"["red","blue"]"#).decode_list(),
            Some(vec!["red".to_string(), "blue".to_string()])
        );
        assert_eq!(RawValue::from("[not json").decode_list(), None);
        assert_eq!(RawValue::from("plain").decode_list(), None);
    }

    #[test]
    fn test_decode_sub_rows_objects_keep_member_order() {
        let value = RawValue::from(r#"[{"b":"2","a":"1"},{"b":"4","a":"3"}]"#);
        let rows = value.decode_sub_rows().unwrap();
        assert_eq!(rows, vec![vec!["2", "1"], vec!["4", "3"]]);
    }

    #[test]
    fn test_decode_sub_rows_malformed_is_error() {
        assert!(RawValue::from("{broken").decode_sub_rows().is_err());
        assert!(RawValue::from(3u64).decode_sub_rows().is_err());
        assert_eq!(RawValue::from("").decode_sub_rows().unwrap().len(), 0);
    }

    #[test]
    fn test_untagged_deserialization() {
        let values: Vec<RawValue> =
            serde_json::from_str(r#"[null, true, 1.5, "x", ["a","b"]]"#).unwrap();
        assert_eq!(values[0], RawValue::Null);
        assert_eq!(values[1], RawValue::Bool(true));
        assert_eq!(values[2].to_text(), "1.5");
        assert_eq!(values[3], RawValue::from("x"));
        assert_eq!(values[4], RawValue::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_native_json_values_are_kept() {
        let values: Vec<RawValue> =
            serde_json::from_str(r#"[[["a","1"],["b","2"]], [1, 2], {"k": "v"}, []]"#).unwrap();

        let nested = &values[0];
        assert!(matches!(nested, RawValue::Json(_)));
        assert_eq!(
            nested.decode_sub_rows().unwrap(),
            vec![vec!["a", "1"], vec!["b", "2"]]
        );

        assert_eq!(values[1].to_text(), "1|2");
        assert_eq!(values[1].decode_list(), Some(vec!["1".to_string(), "2".to_string()]));

        assert_eq!(values[2].to_text(), r#"{"k":"v"}"#);
        assert!(values[2].decode_sub_rows().is_err());

        assert!(values[3].is_empty());
    }
}
