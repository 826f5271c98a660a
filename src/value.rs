use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Values carried between application code and the database drivers.
///
/// Result rows, statement arguments, and builder inputs all use this
/// representation. Each backend converts to and from its native types at
/// the wire boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
    Array(Vec<SqlValue>),
    HStore(BTreeMap<String, String>),
    Json(JsonValue),
    Null,
}

impl SqlValue {
    /// Returns the value as an `i64` if it is an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as an `f64`. Integers widen losslessly.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is textual.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as a bool. Integer 1/0 and the single-character
    /// forms some backends store are accepted too.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(v) => Some(*v),
            SqlValue::Int(1) => Some(true),
            SqlValue::Int(0) => Some(false),
            SqlValue::Text(s) => match s.as_str() {
                "t" | "true" | "1" => Some(true),
                "f" | "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns the value as a timestamp. Text in the common wire formats
    /// is parsed leniently.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(v) => Some(*v),
            SqlValue::Text(s) => parse_timestamp_text(s),
            _ => None,
        }
    }

    /// Returns the value as a byte slice if it is a blob.
    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the elements if the value is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[SqlValue]> {
        match self {
            SqlValue::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the pairs if the value is a key/value store.
    #[must_use]
    pub fn as_hstore(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            SqlValue::HStore(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as a JSON document if it is one.
    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            SqlValue::Json(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Projects the value into JSON. Timestamps become ISO 8601 text,
    /// blobs become arrays of byte numbers, non-finite floats become null.
    #[must_use]
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            SqlValue::Int(v) => JsonValue::from(*v),
            SqlValue::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(JsonValue::Null, JsonValue::Number),
            SqlValue::Text(v) => JsonValue::String(v.clone()),
            SqlValue::Bool(v) => JsonValue::Bool(*v),
            SqlValue::Timestamp(v) => {
                JsonValue::String(v.format(ISO_TIMESTAMP_FORMAT).to_string())
            }
            SqlValue::Blob(v) => {
                JsonValue::Array(v.iter().map(|b| JsonValue::from(*b)).collect())
            }
            SqlValue::Array(items) => {
                JsonValue::Array(items.iter().map(SqlValue::to_json_value).collect())
            }
            SqlValue::HStore(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                    .collect(),
            ),
            SqlValue::Json(v) => v.clone(),
            SqlValue::Null => JsonValue::Null,
        }
    }
}

/// Wire format used when a timestamp travels as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Format used when a timestamp is embedded in a JSON document.
pub const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub(crate) fn parse_timestamp_text(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, ISO_TIMESTAMP_FORMAT))
        .ok()
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(v) => write!(f, "{v}"),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
            SqlValue::Blob(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            SqlValue::Array(_) | SqlValue::HStore(_) => {
                write!(f, "{}", self.to_json_value())
            }
            SqlValue::Json(v) => write!(f, "{v}"),
            SqlValue::Null => write!(f, "NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn timestamp_parses_wire_and_iso_text() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(18, 45, 1)
            .unwrap();
        let wire = SqlValue::Text("2024-03-09 18:45:01".to_string());
        let iso = SqlValue::Text("2024-03-09T18:45:01".to_string());
        assert_eq!(wire.as_timestamp(), Some(expected));
        assert_eq!(iso.as_timestamp(), Some(expected));
        assert_eq!(SqlValue::Text("yesterday".to_string()).as_timestamp(), None);
    }

    #[test]
    fn bool_accessor_accepts_integer_and_letter_forms() {
        assert_eq!(SqlValue::Int(1).as_bool(), Some(true));
        assert_eq!(SqlValue::Int(0).as_bool(), Some(false));
        assert_eq!(SqlValue::Text("t".to_string()).as_bool(), Some(true));
        assert_eq!(SqlValue::Text("f".to_string()).as_bool(), Some(false));
        assert_eq!(SqlValue::Int(7).as_bool(), None);
    }

    #[test]
    fn json_projection_keeps_structure() {
        let value = SqlValue::Array(vec![
            SqlValue::Int(1),
            SqlValue::Text("two".to_string()),
            SqlValue::Null,
        ]);
        assert_eq!(
            value.to_json_value(),
            serde_json::json!([1, "two", null])
        );
        let blob = SqlValue::Blob(vec![104, 105]);
        assert_eq!(blob.to_json_value(), serde_json::json!([104, 105]));
    }

    #[test]
    fn display_renders_null_and_bytes_readably() {
        assert_eq!(SqlValue::Null.to_string(), "NULL");
        assert_eq!(SqlValue::Blob(b"raw".to_vec()).to_string(), "raw");
    }
}
