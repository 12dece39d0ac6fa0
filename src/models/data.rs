//! Result rows and the data envelope returned by data tools.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A result row as an ordered column -> value mapping.
pub type Row = serde_json::Map<String, JsonValue>;

/// Rows returned by one execution, tagged with a fresh identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    /// UUID v4 identifying this result set.
    pub data_id: String,
    pub rows: Vec<Row>,
}

impl QueryRows {
    /// Wrap rows under a newly generated `data_id`.
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            data_id: uuid::Uuid::new_v4().to_string(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Serializable structure produced by every data-returning tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope {
    /// Always `"data"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub data_id: String,
    pub data: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DataEnvelope {
    pub fn new(data_id: impl Into<String>, data: Vec<Row>) -> Self {
        Self {
            kind: "data".to_string(),
            data_id: data_id.into(),
            data,
            note: None,
        }
    }

    /// Attach a human-readable note (e.g. truncation notice).
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl From<QueryRows> for DataEnvelope {
    fn from(rows: QueryRows) -> Self {
        Self::new(rows.data_id, rows.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_rows_have_unique_ids() {
        let a = QueryRows::new(Vec::new());
        let b = QueryRows::new(Vec::new());
        assert_ne!(a.data_id, b.data_id);
        assert!(uuid::Uuid::parse_str(&a.data_id).is_ok());
    }

    #[test]
    fn test_envelope_serializes_type_field() {
        let mut row = Row::new();
        row.insert("b".into(), json!(1));
        row.insert("a".into(), json!("x"));
        let envelope = DataEnvelope::new("id-1", vec![row]);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "data");
        assert_eq!(value["data_id"], "id-1");
        assert!(value.get("note").is_none());

        // Column order survives serialization
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(text.find("\"b\"").unwrap() < text.find("\"a\"").unwrap());
    }

    #[test]
    fn test_envelope_with_note() {
        let envelope = DataEnvelope::new("id", Vec::new()).with_note("truncated");
        assert_eq!(envelope.note.as_deref(), Some("truncated"));
    }
}
