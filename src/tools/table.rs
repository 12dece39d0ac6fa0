//! Table creation tools.

use crate::db::catalog::validate_identifier;
use crate::error::{WarehouseError, WarehouseResult};
use crate::tools::{ToolContext, ToolHandler, ToolId, ToolOutput, parse_args, schema_object};
use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub const INVALID_COLUMNS_FORMAT: &str =
    "Invalid columns format. Use 'column1:type1,column2:type2'.";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTableInput {
    /// CREATE TABLE SQL statement
    pub query: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTableWithPromptInput {
    /// Name of the table to create
    pub table_name: String,
    /// Comma-separated column definitions, e.g. "id:int,name:string"
    pub columns: String,
}

fn is_create_table(sql: &str) -> bool {
    let mut words = sql.split_whitespace();
    matches!(
        (words.next(), words.next()),
        (Some(create), Some(table))
            if create.eq_ignore_ascii_case("CREATE") && table.eq_ignore_ascii_case("TABLE")
    )
}

/// Parse `name:type,name:type` into column definitions.
pub fn parse_columns(columns: &str) -> WarehouseResult<Vec<(String, String)>> {
    let mut parsed = Vec::new();
    for part in columns.split(',') {
        let Some((name, ty)) = part.split_once(':') else {
            return Err(WarehouseError::invalid_input(INVALID_COLUMNS_FORMAT));
        };
        let (name, ty) = (name.trim(), ty.trim());
        if name.is_empty() || ty.is_empty() {
            return Err(WarehouseError::invalid_input(INVALID_COLUMNS_FORMAT));
        }
        validate_identifier(name, "column name")?;
        if !ty
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '(' | ')' | ' ' | '<' | '>'))
        {
            return Err(WarehouseError::invalid_input(format!(
                "Invalid column type '{ty}'"
            )));
        }
        parsed.push((name.to_string(), ty.to_string()));
    }
    Ok(parsed)
}

/// `CREATE TABLE IF NOT EXISTS` statement for the given columns.
pub fn create_table_sql(table_name: &str, columns: &[(String, String)]) -> String {
    let defs = columns
        .iter()
        .map(|(name, ty)| format!("{name} {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {table_name} ({defs})")
}

pub struct CreateTableTool;

#[async_trait]
impl ToolHandler for CreateTableTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<CreateTableInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: CreateTableInput = parse_args(ToolId::CreateTable, args)?;
        if !is_create_table(&input.query) {
            return Err(WarehouseError::invalid_input(
                "Only CREATE TABLE statements are allowed",
            ));
        }

        let result = ctx.executor.execute(&input.query).await?;
        info!(data_id = %result.data_id, "Table created");
        Ok(ToolOutput::text(format!(
            "Table created successfully. data_id = {}",
            result.data_id
        )))
    }
}

pub struct CreateTableWithPromptTool;

#[async_trait]
impl ToolHandler for CreateTableWithPromptTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<CreateTableWithPromptInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: CreateTableWithPromptInput = parse_args(ToolId::CreateTableWithPrompt, args)?;
        let table_name = input.table_name.trim();
        validate_identifier(table_name, "table_name")?;
        let columns = parse_columns(&input.columns)?;

        let sql = create_table_sql(table_name, &columns);
        let result = ctx.executor.execute(&sql).await?;
        info!(table = %table_name, columns = columns.len(), "Table created from prompt");
        Ok(ToolOutput::text(format!(
            "Table '{table_name}' created successfully. data_id = {}",
            result.data_id
        )))
    }
}
