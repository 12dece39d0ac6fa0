use crate::error::{WarehouseError, WarehouseResult};
use crate::models::MEMO_URI;
use crate::tools::{ToolContext, ToolHandler, ToolId, ToolOutput, parse_args, schema_object};
use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AppendInsightInput {
    /// Data insight discovered from analysis
    pub insight: String,
}

/// Records an insight in the memo and flags `memo://insights` as updated.
pub struct AppendInsightTool;

#[async_trait]
impl ToolHandler for AppendInsightTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<AppendInsightInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: AppendInsightInput = parse_args(ToolId::AppendInsight, args)?;
        if input.insight.trim().is_empty() {
            return Err(WarehouseError::invalid_input("Missing insight argument"));
        }

        let count = ctx.memo.append(input.insight).await;
        info!(insights = count, "Insight added to memo");
        Ok(ToolOutput::text("Insight added to memo").notify(MEMO_URI))
    }
}
