//! MCP tool implementations.
//!
//! Every tool is a [`ToolHandler`] registered under a [`ToolId`]:
//! - `schema`: `list_tables`, `describe_table`, `show_object_list`, `desc_object`
//! - `query`: `read_query` (write-gated by the classifier), `write_query`
//! - `table`: `create_table`, `create_table_with_prompt`
//! - `search`: `match_all` full-text search (Clickzetta)
//! - `insight`: `append_insight`
//! - `import`: `import_data_into_table_from_database`
//! - `url_import`: `import_data_into_table_from_url` (CSV, TXT, JSON files)
//!
//! Handlers return `WarehouseResult<ToolOutput>`; turning errors into
//! protocol content is left to the MCP service.

pub mod format;
pub mod import;
pub mod insight;
pub mod query;
pub mod registry;
pub mod schema;
pub mod search;
pub mod table;
pub mod url_import;

pub use registry::{ToolPolicy, ToolRegistry};

use crate::classifier::SqlWriteClassifier;
use crate::config::{DEFAULT_MAX_ROWS, SearchDefaults};
use crate::db::{Catalog, ExecutorOptions, QueryExecutor};
use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{DataEnvelope, InsightMemo, Platform};
use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::sync::Arc;

/// Closed set of tools the server knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolId {
    ListTables,
    DescribeTable,
    ShowObjectList,
    DescObject,
    MatchAll,
    ReadQuery,
    AppendInsight,
    WriteQuery,
    CreateTable,
    CreateTableWithPrompt,
    ImportDataFromDatabase,
    ImportDataFromUrl,
}

/// Capability tags used by the exposure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolTag {
    Query,
    Write,
    ResourceBased,
}

impl ToolId {
    pub const ALL: [ToolId; 12] = [
        ToolId::ListTables,
        ToolId::DescribeTable,
        ToolId::ShowObjectList,
        ToolId::DescObject,
        ToolId::MatchAll,
        ToolId::ReadQuery,
        ToolId::AppendInsight,
        ToolId::WriteQuery,
        ToolId::CreateTable,
        ToolId::CreateTableWithPrompt,
        ToolId::ImportDataFromDatabase,
        ToolId::ImportDataFromUrl,
    ];

    /// Wire name of the tool.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
            Self::ShowObjectList => "show_object_list",
            Self::DescObject => "desc_object",
            Self::MatchAll => "match_all",
            Self::ReadQuery => "read_query",
            Self::AppendInsight => "append_insight",
            Self::WriteQuery => "write_query",
            Self::CreateTable => "create_table",
            Self::CreateTableWithPrompt => "create_table_with_prompt",
            Self::ImportDataFromDatabase => "import_data_into_table_from_database",
            Self::ImportDataFromUrl => "import_data_into_table_from_url",
        }
    }

    pub fn tags(&self) -> &'static [ToolTag] {
        match self {
            Self::ListTables
            | Self::DescribeTable
            | Self::ShowObjectList
            | Self::DescObject
            | Self::MatchAll
            | Self::ReadQuery => &[ToolTag::Query],
            Self::AppendInsight => &[ToolTag::ResourceBased],
            Self::WriteQuery
            | Self::CreateTable
            | Self::CreateTableWithPrompt
            | Self::ImportDataFromDatabase
            | Self::ImportDataFromUrl => &[ToolTag::Write],
        }
    }

    pub fn has_tag(&self, tag: ToolTag) -> bool {
        self.tags().contains(&tag)
    }

    /// Platforms on which the tool exists.
    pub fn supports(&self, platform: Platform) -> bool {
        match self {
            Self::MatchAll => platform == Platform::Clickzetta,
            _ => true,
        }
    }

    /// Tool description shown to the agent.
    pub fn description(&self, platform: Platform) -> String {
        let target = platform.display_name();
        match self {
            Self::ListTables => format!("List all tables in the {target}"),
            Self::DescribeTable => "Get the schema information for a specific table".to_string(),
            Self::ShowObjectList => "Get the list of a specific object type in the current workspace, \
                such as catalogs, vclusters, connections, volumes, schemas, tables, tables history, \
                table streams, users, jobs or functions"
                .to_string(),
            Self::DescObject => "Get the information of a specific object, such as a catalog, \
                vcluster, connection, volume, schema, table, table stream, view, share or job"
                .to_string(),
            Self::MatchAll => "Perform search via match all function on a table using a question \
                and return the top 5 answers"
                .to_string(),
            Self::ReadQuery => match platform {
                Platform::Snowflake => format!("Execute a SELECT query on the {target}."),
                Platform::Clickzetta => "Execute a SELECT query. Date and time functions that are \
                    compatible with Spark SQL."
                    .to_string(),
            },
            Self::AppendInsight => "Add a data insight to the memo".to_string(),
            Self::WriteQuery => match platform {
                Platform::Snowflake => {
                    format!("Execute an INSERT, UPDATE, or DELETE query on the {target}")
                }
                Platform::Clickzetta => format!(
                    "Execute an INSERT INTO, INSERT OVERWRITE, MERGE INTO, UPDATE, DELETE, or \
                    TRUNCATE query on the {target}"
                ),
            },
            Self::CreateTable => format!("Create a new table in the {target}"),
            Self::CreateTableWithPrompt => "Create a new table from a table name and a list of \
                columns with their types"
                .to_string(),
            Self::ImportDataFromDatabase => format!(
                "Connect to a MySQL, PostgreSQL or SQLite database, read a table and import its \
                rows into a table of the {target}. The destination table is recreated with \
                STRING columns."
            ),
            Self::ImportDataFromUrl => format!(
                "Import a CSV, TXT or JSON file from an http(s) URL or a local file path into a \
                table of the {target}. The destination table is recreated with STRING columns."
            ),
        }
    }
}

impl FromStr for ToolId {
    type Err = WarehouseError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.name() == name)
            .ok_or_else(|| WarehouseError::unknown_tool(name))
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared state handed to every handler.
pub struct ToolContext {
    pub platform: Platform,
    pub executor: Arc<dyn QueryExecutor>,
    pub classifier: SqlWriteClassifier,
    pub catalog: Catalog,
    pub memo: Arc<InsightMemo>,
    pub search: SearchDefaults,
    pub max_rows: usize,
    /// Options for connections opened by the import tool.
    pub executor_options: ExecutorOptions,
}

impl ToolContext {
    /// Context with default limits and an empty memo.
    pub fn new(platform: Platform, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            platform,
            executor,
            classifier: SqlWriteClassifier::new(platform),
            catalog: Catalog::new(platform, None, None),
            memo: Arc::new(InsightMemo::new()),
            search: SearchDefaults::default(),
            max_rows: DEFAULT_MAX_ROWS,
            executor_options: ExecutorOptions::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_search(mut self, search: SearchDefaults) -> Self {
        self.search = search;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_executor_options(mut self, options: ExecutorOptions) -> Self {
        self.executor_options = options;
        self
    }
}

/// Successful tool result before protocol rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolContent {
    Text(String),
    Data(DataEnvelope),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: ToolContent,
    /// Resource URI whose subscribers must be told it changed.
    pub updated_resource: Option<&'static str>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: ToolContent::Text(text.into()),
            updated_resource: None,
        }
    }

    pub fn data(envelope: DataEnvelope) -> Self {
        Self {
            content: ToolContent::Data(envelope),
            updated_resource: None,
        }
    }

    pub fn notify(mut self, uri: &'static str) -> Self {
        self.updated_resource = Some(uri);
        self
    }
}

/// Contract implemented by every tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// JSON schema of the tool's arguments.
    fn input_schema(&self) -> Arc<JsonObject>;

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput>;
}

/// JSON schema object for `T`.
pub fn schema_object<T: JsonSchema>() -> Arc<JsonObject> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(mut map)) => {
            map.remove("$schema");
            map.remove("title");
            Arc::new(map)
        }
        _ => {
            let mut map = JsonObject::new();
            map.insert("type".into(), serde_json::Value::String("object".into()));
            Arc::new(map)
        }
    }
}

/// Deserialize tool arguments, reporting failures as invalid input.
pub fn parse_args<T: DeserializeOwned>(tool: ToolId, args: JsonObject) -> WarehouseResult<T> {
    serde_json::from_value(serde_json::Value::Object(args)).map_err(|e| {
        WarehouseError::invalid_input(format!("Invalid arguments for {tool}: {e}"))
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::SqlxExecutor;
    use crate::mcp::WarehouseService;

    /// Context over a lazily opened in-memory SQLite database.
    pub fn sqlite_context(platform: Platform) -> ToolContext {
        let executor = SqlxExecutor::new("sqlite::memory:", ExecutorOptions::default());
        ToolContext::new(platform, Arc::new(executor))
    }

    pub fn sqlite_service() -> WarehouseService {
        let ctx = sqlite_context(Platform::Snowflake);
        let registry = ToolRegistry::new(ToolPolicy::new(Platform::Snowflake));
        WarehouseService::new(Arc::new(registry), Arc::new(ctx))
    }
}
