//! Catalog tools.
//!
//! `list_tables`, `describe_table`, `show_object_list` and `desc_object` run
//! the platform's catalog SQL and return the rows as a data envelope. The
//! prefetched table brief used with `--prefetch` lives here too.

use crate::db::catalog::tables_brief;
use crate::error::WarehouseResult;
use crate::models::{DataEnvelope, Row};
use crate::tools::format::to_yaml;
use crate::tools::{ToolContext, ToolHandler, ToolId, ToolOutput, parse_args, schema_object};
use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Name of the table to describe
    pub table_name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ShowObjectListInput {
    /// Object type to list, e.g. tables, schemas, vclusters
    pub object_type: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescObjectInput {
    /// Object type, e.g. table, vcluster, volume
    pub object_type: String,
    /// Name of the object to describe
    pub object_name: String,
}

async fn run_catalog_query(ctx: &ToolContext, sql: &str) -> WarehouseResult<ToolOutput> {
    let result = ctx.executor.execute(sql).await?;
    Ok(ToolOutput::data(DataEnvelope::from(result)))
}

pub struct ListTablesTool;

#[async_trait]
impl ToolHandler for ListTablesTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<ListTablesInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let _: ListTablesInput = parse_args(ToolId::ListTables, args)?;
        info!("Listing tables");
        run_catalog_query(ctx, &ctx.catalog.list_tables_sql()?).await
    }
}

pub struct DescribeTableTool;

#[async_trait]
impl ToolHandler for DescribeTableTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<DescribeTableInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: DescribeTableInput = parse_args(ToolId::DescribeTable, args)?;
        run_catalog_query(ctx, &ctx.catalog.describe_table_sql(&input.table_name)?).await
    }
}

pub struct ShowObjectListTool;

#[async_trait]
impl ToolHandler for ShowObjectListTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<ShowObjectListInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: ShowObjectListInput = parse_args(ToolId::ShowObjectList, args)?;
        run_catalog_query(ctx, &ctx.catalog.show_objects_sql(&input.object_type)?).await
    }
}

pub struct DescObjectTool;

#[async_trait]
impl ToolHandler for DescObjectTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<DescObjectInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: DescObjectInput = parse_args(ToolId::DescObject, args)?;
        let sql = ctx
            .catalog
            .desc_object_sql(&input.object_type, &input.object_name)?;
        run_catalog_query(ctx, &sql).await
    }
}

/// Prefetched descriptions of the tables in the configured schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TablesBrief {
    /// `{table: {..table row.., COLUMNS: {column: row}}}`
    pub tables: Row,
    /// YAML of `tables`, or the prefetch error message.
    pub text: String,
}

impl TablesBrief {
    fn failed(message: String) -> Self {
        Self {
            tables: Row::new(),
            text: message,
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// YAML description of one table, `None` when it was not prefetched.
    pub fn table_yaml(&self, name: &str) -> Option<WarehouseResult<String>> {
        self.tables.get(name).map(|entry: &JsonValue| to_yaml(entry))
    }
}

/// Fetch tables and columns of the configured schema.
///
/// Failures are folded into the brief's text so startup never aborts
/// because of a catalog permission problem.
pub async fn prefetch_tables_brief(ctx: &ToolContext) -> TablesBrief {
    match fetch_brief(ctx).await {
        Ok(brief) => brief,
        Err(e) => {
            warn!(error = %e, "Prefetch failed");
            TablesBrief::failed(format!("Error prefetching table descriptions: {e}"))
        }
    }
}

async fn fetch_brief(ctx: &ToolContext) -> WarehouseResult<TablesBrief> {
    info!("Prefetching table descriptions");
    let tables = ctx.executor.execute(&ctx.catalog.prefetch_tables_sql()?).await?;
    info!("Prefetching column descriptions");
    let columns = ctx.executor.execute(&ctx.catalog.prefetch_columns_sql()?).await?;
    let tables = tables_brief(tables.rows, columns.rows);
    let text = to_yaml(&tables)?;
    Ok(TablesBrief { tables, text })
}
