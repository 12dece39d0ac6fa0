//! Query execution tools.
//!
//! `read_query` consults the write classifier before touching the
//! warehouse and refuses anything that could mutate data or schema.
//! `write_query` is the explicit write path and is only exposed when writes
//! are enabled.

use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{DataEnvelope, QueryRows};
use crate::tools::{ToolContext, ToolHandler, ToolId, ToolOutput, parse_args, schema_object};
use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

pub const READ_ONLY_VIOLATION: &str = "Calls to read_query should not contain write operations";
pub const SELECT_IN_WRITE_QUERY: &str = "SELECT queries are not allowed for write_query";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadQueryInput {
    /// SELECT SQL query to execute
    pub query: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteQueryInput {
    /// SQL query to execute
    pub query: String,
}

/// Keep at most `max_rows` rows, noting how many were dropped.
pub fn truncate_rows(result: QueryRows, max_rows: usize) -> DataEnvelope {
    let QueryRows { data_id, mut rows } = result;
    let total = rows.len();
    if total <= max_rows {
        return DataEnvelope::new(data_id, rows);
    }

    rows.truncate(max_rows);
    warn!(total_rows = total, limit = max_rows, "Query result truncated");
    DataEnvelope::new(data_id, rows).with_note(format!(
        "Results of query have been truncated. There are {} more rows.",
        total - max_rows
    ))
}

/// True if the first word of `sql` is `word` (case-insensitive).
pub(crate) fn starts_with_word(sql: &str, word: &str) -> bool {
    sql.trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .is_some_and(|first| first.eq_ignore_ascii_case(word))
}

pub struct ReadQueryTool;

#[async_trait]
impl ToolHandler for ReadQueryTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<ReadQueryInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: ReadQueryInput = parse_args(ToolId::ReadQuery, args)?;

        let verdict = ctx.classifier.analyze(&input.query);
        if verdict.contains_write {
            warn!(
                operations = ?verdict.write_operations,
                cte_write = verdict.has_cte_write,
                "Rejected write operation in read_query"
            );
            return Err(WarehouseError::permission("read_query", READ_ONLY_VIOLATION));
        }

        let result = ctx.executor.execute(&input.query).await?;
        Ok(ToolOutput::data(truncate_rows(result, ctx.max_rows)))
    }
}

pub struct WriteQueryTool;

#[async_trait]
impl ToolHandler for WriteQueryTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<WriteQueryInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: WriteQueryInput = parse_args(ToolId::WriteQuery, args)?;
        if starts_with_word(&input.query, "SELECT") {
            return Err(WarehouseError::invalid_input(SELECT_IN_WRITE_QUERY));
        }

        info!("Executing write query");
        let result = ctx.executor.execute(&input.query).await?;
        let text = serde_json::to_string(&result.rows)
            .map_err(|e| WarehouseError::internal(format!("Failed to render rows: {e}")))?;
        Ok(ToolOutput::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Row;
    use serde_json::json;

    fn rows(n: usize) -> QueryRows {
        let rows = (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("n".into(), json!(i));
                row
            })
            .collect();
        QueryRows::new(rows)
    }

    #[test]
    fn test_truncate_under_limit_has_no_note() {
        let envelope = truncate_rows(rows(3), 50);
        assert_eq!(envelope.data.len(), 3);
        assert!(envelope.note.is_none());
    }

    #[test]
    fn test_truncate_at_limit_has_no_note() {
        let envelope = truncate_rows(rows(50), 50);
        assert_eq!(envelope.data.len(), 50);
        assert!(envelope.note.is_none());
    }

    #[test]
    fn test_truncate_over_limit_counts_remaining() {
        let envelope = truncate_rows(rows(57), 50);
        assert_eq!(envelope.data.len(), 50);
        assert_eq!(
            envelope.note.as_deref(),
            Some("Results of query have been truncated. There are 7 more rows.")
        );
        assert_eq!(envelope.data[49]["n"], json!(49));
    }

    #[test]
    fn test_starts_with_word() {
        assert!(starts_with_word("  select * from t", "SELECT"));
        assert!(starts_with_word("SELECT(1)", "SELECT"));
        assert!(!starts_with_word("SELECTED_ROWS", "SELECT"));
        assert!(!starts_with_word("INSERT INTO t SELECT 1", "SELECT"));
        assert!(!starts_with_word("", "SELECT"));
    }
}
