use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use seedbed_core::TypeTag;
use uuid::Uuid;

use crate::buffer::RowHandle;

/// Concrete value supplied for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical text used to compare values inside key tuples.
    pub fn key(&self) -> String {
        match self {
            Value::Null => "\u{0}null".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Text(value) => value.clone(),
            Value::Uuid(value) => value.to_string(),
            Value::Date(value) => value.format("%Y-%m-%d").to_string(),
            Value::Time(value) => value.format("%H:%M:%S%.f").to_string(),
            Value::Timestamp(value) => value.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::Json(value) => value.to_string(),
            Value::Bytes(value) => hex::encode(value),
        }
    }

    /// Convert a JSON document value into a column value.
    ///
    /// Strings are parsed according to the column's type tag; `None` means
    /// the JSON value cannot represent a value of that type.
    pub fn from_json(json: serde_json::Value, tag: TypeTag) -> Option<Value> {
        use serde_json::Value as Json;

        if tag == TypeTag::Json {
            return Some(match json {
                Json::Null => Value::Null,
                other => Value::Json(other),
            });
        }

        match json {
            Json::Null => Some(Value::Null),
            Json::Bool(value) => Some(Value::Bool(value)),
            Json::Number(number) => number
                .as_i64()
                .map(Value::Int)
                .or_else(|| number.as_f64().map(Value::Float)),
            Json::String(text) => parse_text(text, tag),
            other @ (Json::Array(_) | Json::Object(_)) => Some(Value::Json(other)),
        }
    }
}

fn parse_text(text: String, tag: TypeTag) -> Option<Value> {
    match tag {
        TypeTag::Uuid => Uuid::parse_str(&text).ok().map(Value::Uuid),
        TypeTag::Date => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .ok()
            .map(Value::Date),
        TypeTag::Time => NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
            .ok()
            .map(Value::Time),
        TypeTag::Timestamp => parse_timestamp(&text).map(Value::Timestamp),
        _ => Some(Value::Text(text)),
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(value) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(value.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Reference to a column of a previously added row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRef {
    pub row: RowHandle,
    pub column: String,
}

/// Field supplied to `SeedStore::add`.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Concrete value, including `Value::Null`.
    Value(Value),
    /// Leave the column out so the database default applies.
    Unset,
    /// Copy the value of another buffered row's column.
    Ref(RowRef),
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl From<RowRef> for Field {
    fn from(reference: RowRef) -> Self {
        Field::Ref(reference)
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value $(as $cast)?)
                }
            }

            impl From<$ty> for Field {
                fn from(value: $ty) -> Self {
                    Field::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    String => Text,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    serde_json::Value => Json,
    Vec<u8> => Bytes,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Value(Value::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Option<T>> for Field {
    fn from(value: Option<T>) -> Self {
        Field::Value(Value::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_strings_follow_type_tag() {
        assert_eq!(
            Value::from_json(json!("2024-02-29"), TypeTag::Date),
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert_eq!(Value::from_json(json!("not-a-uuid"), TypeTag::Uuid), None);
        assert_eq!(
            Value::from_json(json!("hello"), TypeTag::Text),
            Some(Value::Text("hello".to_string()))
        );
    }

    #[test]
    fn json_columns_keep_documents() {
        assert_eq!(
            Value::from_json(json!({"a": 1}), TypeTag::Json),
            Some(Value::Json(json!({"a": 1})))
        );
        assert_eq!(
            Value::from_json(json!("plain"), TypeTag::Json),
            Some(Value::Json(json!("plain")))
        );
    }

    #[test]
    fn rfc3339_timestamps_normalize_to_utc() {
        let value = Value::from_json(json!("2024-01-01T12:00:00+02:00"), TypeTag::Timestamp);
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(value, Some(Value::Timestamp(expected)));
    }

    #[test]
    fn null_key_does_not_collide_with_text() {
        assert_ne!(Value::Null.key(), Value::from("null").key());
        assert_eq!(Value::from(Some(3)).key(), "3");
        assert!(Value::from(None::<i64>).is_null());
    }
}
