//! Tool registry and exposure policy.
//!
//! The registry owns one handler per [`ToolId`]. [`ToolPolicy`] decides
//! which tools are listed and which calls are allowed:
//! - excluded names are refused before anything else
//! - unknown names and tools missing on the platform are "Unknown tool"
//! - write tools need `--allow-write`
//! - with `--prefetch`, `list_tables`/`describe_table` are hidden from the
//!   listing and the table brief is appended to `read_query`'s description

use crate::error::{WarehouseError, WarehouseResult};
use crate::models::Platform;
use crate::tools::import::ImportDataTool;
use crate::tools::insight::AppendInsightTool;
use crate::tools::query::{ReadQueryTool, WriteQueryTool};
use crate::tools::schema::{DescObjectTool, DescribeTableTool, ListTablesTool, ShowObjectListTool};
use crate::tools::search::MatchAllTool;
use crate::tools::table::{CreateTableTool, CreateTableWithPromptTool};
use crate::tools::url_import::ImportUrlTool;
use crate::tools::{ToolContext, ToolHandler, ToolId, ToolOutput, ToolTag};
use rmcp::model::{JsonObject, Tool};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const WRITE_NOT_ALLOWED: &str = "Write operations are not allowed for this data connection";

/// Which tools are exposed for this connection.
#[derive(Debug, Clone, Default)]
pub struct ToolPolicy {
    pub platform: Platform,
    pub allow_write: bool,
    pub prefetch: bool,
    pub excluded: BTreeSet<String>,
}

impl ToolPolicy {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            ..Default::default()
        }
    }

    pub fn with_allow_write(mut self, allow_write: bool) -> Self {
        self.allow_write = allow_write;
        self
    }

    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn with_excluded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = names.into_iter().map(Into::into).collect();
        self
    }

    fn hidden_by_prefetch(&self, id: ToolId) -> bool {
        self.prefetch && matches!(id, ToolId::ListTables | ToolId::DescribeTable)
    }

    /// Whether `id` appears in `tools/list`.
    pub fn is_listed(&self, id: ToolId) -> bool {
        id.supports(self.platform)
            && !self.excluded.contains(id.name())
            && (self.allow_write || !id.has_tag(ToolTag::Write))
            && !self.hidden_by_prefetch(id)
    }

    /// Resolve a called name, enforcing exclusion, platform and write rules.
    pub fn check_call(&self, name: &str) -> WarehouseResult<ToolId> {
        if self.excluded.contains(name) {
            return Err(WarehouseError::tool_unavailable(name));
        }
        let id: ToolId = name.parse()?;
        if !id.supports(self.platform) {
            return Err(WarehouseError::unknown_tool(name));
        }
        if id.has_tag(ToolTag::Write) && !self.allow_write {
            return Err(WarehouseError::permission(name, WRITE_NOT_ALLOWED));
        }
        Ok(id)
    }
}

pub struct ToolRegistry {
    handlers: BTreeMap<ToolId, Arc<dyn ToolHandler>>,
    policy: ToolPolicy,
    tables_brief: Option<String>,
}

fn handler_for(id: ToolId) -> Arc<dyn ToolHandler> {
    match id {
        ToolId::ListTables => Arc::new(ListTablesTool),
        ToolId::DescribeTable => Arc::new(DescribeTableTool),
        ToolId::ShowObjectList => Arc::new(ShowObjectListTool),
        ToolId::DescObject => Arc::new(DescObjectTool),
        ToolId::MatchAll => Arc::new(MatchAllTool),
        ToolId::ReadQuery => Arc::new(ReadQueryTool),
        ToolId::AppendInsight => Arc::new(AppendInsightTool),
        ToolId::WriteQuery => Arc::new(WriteQueryTool),
        ToolId::CreateTable => Arc::new(CreateTableTool),
        ToolId::CreateTableWithPrompt => Arc::new(CreateTableWithPromptTool),
        ToolId::ImportDataFromDatabase => Arc::new(ImportDataTool),
        ToolId::ImportDataFromUrl => Arc::new(ImportUrlTool),
    }
}

impl ToolRegistry {
    /// Registry holding every built-in tool.
    pub fn new(policy: ToolPolicy) -> Self {
        let handlers = ToolId::ALL
            .into_iter()
            .map(|id| (id, handler_for(id)))
            .collect();
        Self {
            handlers,
            policy,
            tables_brief: None,
        }
    }

    /// Append a prefetched table brief to the `read_query` description.
    pub fn with_tables_brief(mut self, brief: impl Into<String>) -> Self {
        self.tables_brief = Some(brief.into());
        self
    }

    pub fn policy(&self) -> &ToolPolicy {
        &self.policy
    }

    pub fn description(&self, id: ToolId) -> String {
        let base = id.description(self.policy.platform);
        match (&self.tables_brief, id) {
            (Some(brief), ToolId::ReadQuery) => {
                format!("{base} These are the tables available: {brief}")
            }
            _ => base,
        }
    }

    /// Tool definitions for `tools/list`.
    pub fn list(&self) -> Vec<Tool> {
        self.handlers
            .iter()
            .filter(|(id, _)| self.policy.is_listed(**id))
            .map(|(id, handler)| Tool::new(id.name(), self.description(*id), handler.input_schema()))
            .collect()
    }

    /// Names of the listed tools, in listing order.
    pub fn listed_names(&self) -> Vec<&'static str> {
        self.handlers
            .keys()
            .filter(|id| self.policy.is_listed(**id))
            .map(|id| id.name())
            .collect()
    }

    pub fn resolve(&self, name: &str) -> WarehouseResult<(ToolId, Arc<dyn ToolHandler>)> {
        let id = self.policy.check_call(name)?;
        let handler = self
            .handlers
            .get(&id)
            .cloned()
            .ok_or_else(|| WarehouseError::unknown_tool(name))?;
        Ok((id, handler))
    }

    /// Run a tool call through the policy and its handler.
    pub async fn call(
        &self,
        ctx: &ToolContext,
        name: &str,
        args: Option<JsonObject>,
    ) -> WarehouseResult<ToolOutput> {
        let (id, handler) = match self.resolve(name) {
            Ok(found) => found,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call refused");
                return Err(e);
            }
        };

        debug!(tool = %id, "Invoking tool");
        let result = handler.invoke(ctx, args.unwrap_or_default()).await;
        match &result {
            Ok(_) => info!(tool = %id, "Tool call succeeded"),
            Err(e) => warn!(tool = %id, error = %e, "Tool call failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_listing_on_snowflake() {
        let registry = ToolRegistry::new(ToolPolicy::new(Platform::Snowflake));
        assert_eq!(
            registry.listed_names(),
            vec![
                "list_tables",
                "describe_table",
                "show_object_list",
                "desc_object",
                "read_query",
                "append_insight"
            ]
        );
    }

    #[test]
    fn test_allow_write_lists_write_tools() {
        let registry =
            ToolRegistry::new(ToolPolicy::new(Platform::Clickzetta).with_allow_write(true));
        let names = registry.listed_names();
        assert!(names.contains(&"match_all"));
        assert!(names.contains(&"write_query"));
        assert!(names.contains(&"import_data_into_table_from_database"));
        assert!(names.contains(&"import_data_into_table_from_url"));
        assert_eq!(names.len(), ToolId::ALL.len());
    }

    #[test]
    fn test_prefetch_hides_catalog_tools_and_extends_description() {
        let registry = ToolRegistry::new(ToolPolicy::new(Platform::Snowflake).with_prefetch(true))
            .with_tables_brief("ORDERS: {}");
        let names = registry.listed_names();
        assert!(!names.contains(&"list_tables"));
        assert!(!names.contains(&"describe_table"));
        assert!(
            registry
                .description(ToolId::ReadQuery)
                .ends_with("These are the tables available: ORDERS: {}")
        );
        // still callable
        assert!(registry.resolve("list_tables").is_ok());
    }

    #[test]
    fn test_call_order_of_refusals() {
        let policy = ToolPolicy::new(Platform::Snowflake).with_excluded(["write_query", "bogus"]);

        let excluded = policy.check_call("write_query").unwrap_err();
        assert_eq!(
            excluded.to_string(),
            "Tool write_query is excluded from this data connection"
        );
        assert!(matches!(
            policy.check_call("bogus").unwrap_err(),
            WarehouseError::ToolUnavailable { .. }
        ));
        assert_eq!(
            policy.check_call("nope").unwrap_err().to_string(),
            "Unknown tool: nope"
        );
        assert_eq!(
            policy.check_call("match_all").unwrap_err().to_string(),
            "Unknown tool: match_all"
        );
        assert_eq!(
            policy.check_call("create_table").unwrap_err().to_string(),
            WRITE_NOT_ALLOWED
        );
        assert_eq!(policy.check_call("read_query").unwrap(), ToolId::ReadQuery);
    }

    #[test]
    fn test_listed_tools_carry_schemas() {
        let registry = ToolRegistry::new(ToolPolicy::new(Platform::Snowflake));
        let tools = registry.list();
        let read = tools
            .iter()
            .find(|t| t.name == "read_query")
            .expect("read_query listed");
        assert_eq!(read.input_schema["type"], "object");
        assert!(read.input_schema["properties"]["query"].is_object());
    }
}
