//! Output formatting for MCP tools.
//!
//! A data envelope is rendered twice: as YAML text for the agent to read,
//! and as an embedded JSON resource at `data://<data_id>` for clients that
//! post-process results.

use crate::error::{WarehouseError, WarehouseResult};
use crate::models::DataEnvelope;
use crate::tools::{ToolContent, ToolOutput};
use rmcp::model::{Content, ResourceContents};
use serde::Serialize;

pub const DATA_MIME_TYPE: &str = "application/json";

/// Serialize `value` as YAML, keeping map insertion order.
pub fn to_yaml<T: Serialize>(value: &T) -> WarehouseResult<String> {
    serde_yaml::to_string(value)
        .map_err(|e| WarehouseError::internal(format!("Failed to render YAML: {e}")))
}

/// URI of the embedded JSON copy of a result set.
pub fn data_uri(data_id: &str) -> String {
    format!("data://{data_id}")
}

/// Render a data envelope as YAML text plus an embedded JSON resource.
pub fn envelope_contents(envelope: &DataEnvelope) -> WarehouseResult<Vec<Content>> {
    let yaml = to_yaml(envelope)?;
    let json = serde_json::to_string(envelope)
        .map_err(|e| WarehouseError::internal(format!("Failed to render JSON: {e}")))?;

    let mut resource = ResourceContents::text(json, data_uri(&envelope.data_id));
    if let ResourceContents::TextResourceContents { mime_type, .. } = &mut resource {
        *mime_type = Some(DATA_MIME_TYPE.to_string());
    }

    Ok(vec![Content::text(yaml), Content::resource(resource)])
}

/// Render a successful tool output as protocol content.
pub fn render(output: &ToolOutput) -> WarehouseResult<Vec<Content>> {
    match &output.content {
        ToolContent::Text(text) => Ok(vec![Content::text(text.clone())]),
        ToolContent::Data(envelope) => envelope_contents(envelope),
    }
}

/// Text of an error as shown to the agent.
pub fn error_text(err: &WarehouseError) -> String {
    format!("Error: {err}")
}
