//! `match_all` full-text search over a Clickzetta table.

use crate::config::SearchDefaults;
use crate::db::catalog::{sql_literal, validate_identifier};
use crate::error::{WarehouseError, WarehouseResult};
use crate::models::DataEnvelope;
use crate::tools::{ToolContext, ToolHandler, ToolId, ToolOutput, parse_args, schema_object};
use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of matches returned.
pub const MATCH_LIMIT: usize = 5;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MatchAllInput {
    /// Question to search for
    pub question: String,
    /// Table to search; falls back to the configured default
    #[serde(default)]
    pub table_name: Option<String>,
    /// Column holding the searchable text; falls back to the configured default
    #[serde(default)]
    pub content_column_name: Option<String>,
    /// SQL condition restricting the searched partitions, e.g. "dt = '2024-01-01'"
    #[serde(default)]
    pub partition_scope: Option<String>,
}

/// Search arguments with configuration defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchAllRequest {
    pub question: String,
    pub table_name: String,
    pub content_column_name: String,
    pub partition_scope: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MatchAllInput {
    pub fn resolve(self, defaults: &SearchDefaults) -> WarehouseResult<MatchAllRequest> {
        if self.question.trim().is_empty() {
            return Err(WarehouseError::invalid_input("Missing question argument"));
        }

        let table_name = non_blank(self.table_name)
            .or_else(|| non_blank(defaults.table_name.clone()))
            .ok_or_else(|| WarehouseError::invalid_input("Missing table_name argument"))?;
        let content_column_name = non_blank(self.content_column_name)
            .or_else(|| non_blank(defaults.content_column_name.clone()))
            .ok_or_else(|| WarehouseError::invalid_input("Missing content_column_name argument"))?;
        let partition_scope =
            non_blank(self.partition_scope).or_else(|| non_blank(defaults.partition_scope.clone()));

        validate_identifier(&table_name, "table_name")?;
        validate_identifier(&content_column_name, "content_column_name")?;

        Ok(MatchAllRequest {
            question: self.question,
            table_name,
            content_column_name,
            partition_scope,
        })
    }
}

impl MatchAllRequest {
    pub fn to_sql(&self) -> String {
        let column = &self.content_column_name;
        let scope = self.partition_scope.as_deref().unwrap_or("1 = 1");
        format!(
            "SELECT {column}, 0 AS distance, 'match_all_search' AS search_method \
             FROM {table} WHERE {scope} AND (MATCH_ALL({column}, {question})) \
             ORDER BY 2 LIMIT {MATCH_LIMIT}",
            table = self.table_name,
            question = sql_literal(&self.question),
        )
    }
}

pub struct MatchAllTool;

#[async_trait]
impl ToolHandler for MatchAllTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<MatchAllInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: MatchAllInput = parse_args(ToolId::MatchAll, args)?;
        let request = input.resolve(&ctx.search)?;

        // The scope condition is spliced verbatim, so it goes through the same gate as read_query.
        if let Some(scope) = &request.partition_scope {
            let verdict = ctx.classifier.analyze(scope);
            if verdict.contains_write {
                warn!(operations = ?verdict.write_operations, "Rejected write in partition_scope");
                return Err(WarehouseError::permission(
                    "match_all",
                    "partition_scope should not contain write operations",
                ));
            }
        }

        let sql = request.to_sql();
        debug!(table = %request.table_name, "Running match_all search");
        let result = ctx.executor.execute(&sql).await?;
        Ok(ToolOutput::data(DataEnvelope::from(result)))
    }
}
