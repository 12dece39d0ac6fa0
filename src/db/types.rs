//! Row decoding for sqlx-backed connections.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the driver's column type name
//! 2. the category picks a decoder, with a fallback chain for drivers whose
//!    type names are loose (SQLite reports the declared affinity)
//!
//! Floats are rendered as strings so warehouse decimals and doubles keep the
//! textual form the agent sees in the warehouse console.

use crate::models::Row;
use serde_json::Value as JsonValue;
use sqlx::any::AnyRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// Logical category for a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Null,
    Integer,
    Float,
    Boolean,
    Text,
    Binary,
}

/// Classify a driver type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower == "null" {
        return TypeCategory::Null;
    }
    if lower.contains("int") {
        return TypeCategory::Integer;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("float")
        || lower.contains("double")
        || lower.contains("real")
        || lower.contains("decimal")
        || lower.contains("numeric")
    {
        return TypeCategory::Float;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    TypeCategory::Text
}

/// Decode binary data as UTF-8 text, falling back to base64.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Render a float the way result rows carry it.
pub fn float_value(value: f64) -> JsonValue {
    JsonValue::String(value.to_string())
}

/// Convert a sqlx `AnyRow` into an ordered row.
pub fn any_row_to_json(row: &AnyRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let category = categorize_type(col.type_info().name());
            (col.name().to_string(), decode_column(row, idx, category))
        })
        .collect()
}

/// Column names of a row, in order.
pub fn column_names(row: &AnyRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn decode_column(row: &AnyRow, idx: usize, category: TypeCategory) -> JsonValue {
    if row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true) {
        return JsonValue::Null;
    }

    // A NULL column type with a non-null value means the driver could not
    // resolve the declared type; let the fallback chain decide.
    let primary = match category {
        TypeCategory::Null => None,
        TypeCategory::Integer => try_integer(row, idx),
        TypeCategory::Float => try_float(row, idx),
        TypeCategory::Boolean => try_bool(row, idx),
        TypeCategory::Text => try_text(row, idx),
        TypeCategory::Binary => try_binary(row, idx),
    };

    primary
        .or_else(|| try_integer(row, idx))
        .or_else(|| try_float(row, idx))
        .or_else(|| try_bool(row, idx))
        .or_else(|| try_text(row, idx))
        .or_else(|| try_binary(row, idx))
        .unwrap_or(JsonValue::Null)
}

fn try_integer(row: &AnyRow, idx: usize) -> Option<JsonValue> {
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Some(JsonValue::from(v));
    }
    if let Ok(v) = row.try_get::<i32, _>(idx) {
        return Some(JsonValue::from(v));
    }
    row.try_get::<i16, _>(idx).ok().map(JsonValue::from)
}

fn try_float(row: &AnyRow, idx: usize) -> Option<JsonValue> {
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Some(float_value(v));
    }
    row.try_get::<f32, _>(idx)
        .ok()
        .map(|v| float_value(f64::from(v)))
}

fn try_bool(row: &AnyRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<bool, _>(idx).ok().map(JsonValue::Bool)
}

fn try_text(row: &AnyRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<String, _>(idx).ok().map(JsonValue::String)
}

fn try_binary(row: &AnyRow, idx: usize) -> Option<JsonValue> {
    row.try_get::<Vec<u8>, _>(idx)
        .ok()
        .map(|bytes| decode_binary_value(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type() {
        assert_eq!(categorize_type("BIGINT"), TypeCategory::Integer);
        assert_eq!(categorize_type("INTEGER"), TypeCategory::Integer);
        assert_eq!(categorize_type("DOUBLE"), TypeCategory::Float);
        assert_eq!(categorize_type("REAL"), TypeCategory::Float);
        assert_eq!(categorize_type("BOOLEAN"), TypeCategory::Boolean);
        assert_eq!(categorize_type("TEXT"), TypeCategory::Text);
        assert_eq!(categorize_type("BLOB"), TypeCategory::Binary);
        assert_eq!(categorize_type("NULL"), TypeCategory::Null);
        assert_eq!(categorize_type("VARCHAR"), TypeCategory::Text);
    }

    #[test]
    fn test_decode_binary_value() {
        assert_eq!(decode_binary_value(b"hello"), JsonValue::String("hello".into()));
        assert_eq!(
            decode_binary_value(&[0xff, 0xfe]),
            JsonValue::String("//4=".into())
        );
    }

    #[test]
    fn test_float_value_is_string() {
        assert_eq!(float_value(1.5), JsonValue::String("1.5".into()));
    }
}
