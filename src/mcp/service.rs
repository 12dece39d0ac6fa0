//! MCP service implementation using rmcp.
//!
//! `WarehouseService` implements `ServerHandler` by hand: the tool set is
//! decided at startup by the registry's policy, so tools are listed and
//! dispatched through [`ToolRegistry`] instead of a generated router.
//! Handler errors are turned into error content here and nowhere else.
//!
//! Resources are the insight memo and, with `--prefetch`, one
//! `context://table/<name>` description per prefetched table.

use crate::error::WarehouseError;
use crate::mcp::prompts::{prompt_list, render_prompt};
use crate::models::{MEMO_DESCRIPTION, MEMO_NAME, MEMO_URI};
use crate::tools::format::{error_text, render};
use crate::tools::schema::TablesBrief;
use crate::tools::{ToolContext, ToolRegistry};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Content, GetPromptRequestParam,
        GetPromptResult, Implementation, JsonObject, ListPromptsResult, ListResourcesResult,
        ListToolsResult, PaginatedRequestParam, ProtocolVersion, RawResource,
        ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
        ResourceUpdatedNotificationParam, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// URI prefix of prefetched table descriptions.
pub const TABLE_CONTEXT_PREFIX: &str = "context://table/";

#[derive(Clone)]
pub struct WarehouseService {
    registry: Arc<ToolRegistry>,
    ctx: Arc<ToolContext>,
    tables: Arc<TablesBrief>,
}

impl WarehouseService {
    pub fn new(registry: Arc<ToolRegistry>, ctx: Arc<ToolContext>) -> Self {
        Self {
            registry,
            ctx,
            tables: Arc::new(TablesBrief::default()),
        }
    }

    /// Publish prefetched tables as `context://table/<name>` resources.
    pub fn with_tables(mut self, tables: TablesBrief) -> Self {
        self.tables = Arc::new(tables);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Run a tool and convert the outcome to a protocol result.
    ///
    /// Returns the result together with the resource URI that changed, if any.
    pub async fn dispatch(
        &self,
        name: &str,
        args: Option<rmcp::model::JsonObject>,
    ) -> (CallToolResult, Option<&'static str>) {
        let outcome = self
            .registry
            .call(&self.ctx, name, args)
            .await
            .and_then(|output| render(&output).map(|content| (content, output.updated_resource)));

        match outcome {
            Ok((content, updated)) => (CallToolResult::success(content), updated),
            Err(e) => (error_result(&e), None),
        }
    }

    /// Resources offered by `resources/list`.
    pub fn resources(&self) -> Vec<Resource> {
        let mut memo = RawResource::new(MEMO_URI, MEMO_NAME);
        memo.description = Some(MEMO_DESCRIPTION.to_string());
        memo.mime_type = Some("text/plain".to_string());

        let tables = self.tables.table_names().map(|name| {
            let mut table = RawResource::new(
                format!("{TABLE_CONTEXT_PREFIX}{name}"),
                format!("{name} table"),
            );
            table.description = Some(format!("Description of the {name} table"));
            table.mime_type = Some("text/plain".to_string());
            table.no_annotation()
        });

        std::iter::once(memo.no_annotation()).chain(tables).collect()
    }

    /// Text of a resource by URI.
    pub async fn resource_text(&self, uri: &str) -> Result<String, McpError> {
        let Some((scheme, path)) = uri.split_once("://") else {
            return Err(McpError::invalid_params(
                format!("Unsupported URI scheme: {uri}"),
                None,
            ));
        };
        match (scheme, path) {
            ("memo", "insights") => Ok(self.ctx.memo.synthesize().await),
            ("context", path) if path.starts_with("table/") => {
                let name = &path["table/".len()..];
                match self.tables.table_yaml(name) {
                    Some(yaml) => yaml.map_err(McpError::from),
                    None => Err(McpError::invalid_params(
                        format!("Unknown table: {name}"),
                        None,
                    )),
                }
            }
            ("memo" | "context", path) => Err(McpError::invalid_params(
                format!("Unknown resource path: {path}"),
                None,
            )),
            (scheme, _) => Err(McpError::invalid_params(
                format!("Unsupported URI scheme: {scheme}"),
                None,
            )),
        }
    }

    /// Render a prompt for `prompts/get`.
    pub fn prompt(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<GetPromptResult, McpError> {
        render_prompt(name, arguments).map_err(|e| {
            debug!(prompt = name, error = %e, "Prompt rejected");
            McpError::from(e)
        })
    }

    fn instructions(&self) -> String {
        let platform = self.ctx.platform;
        let writes = if self.registry.policy().allow_write {
            "Write tools are enabled for this connection."
        } else {
            "This connection is read-only; write tools are not offered."
        };
        format!(
            "Tools for exploring and querying a {target}.\n\
            \n\
            ## Workflow\n\
            1. Use `list_tables` and `describe_table` (or the table list in the `read_query` \
            description) to learn the schema\n\
            2. Run SELECT statements with `read_query`; results come back as YAML plus a \
            JSON resource at `data://<data_id>`\n\
            3. Record findings with `append_insight`; they accumulate in the `{MEMO_URI}` resource\n\
            \n\
            The `create_table_prompt` and `create_database_connection_and_query_table_prompt` \
            prompts help fill in table and import arguments.\n\
            \n\
            {writes}",
            target = platform.display_name(),
        )
    }
}

fn error_result(err: &WarehouseError) -> CallToolResult {
    CallToolResult::error(vec![Content::text(error_text(err))])
}

impl ServerHandler for WarehouseService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "warehouse-mcp-server".to_owned(),
                title: Some("Warehouse MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(self.instructions()),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(self.registry.list())))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let (result, updated) = self.dispatch(&request.name, request.arguments).await;

            if let Some(uri) = updated {
                debug!(uri, "Notifying resource update");
                if let Err(e) = context
                    .peer
                    .notify_resource_updated(ResourceUpdatedNotificationParam {
                        uri: uri.to_string(),
                    })
                    .await
                {
                    warn!(uri, error = %e, "Failed to send resource update");
                }
            }
            Ok(result)
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListResourcesResult::with_all_items(self.resources())))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let text = self.resource_text(&request.uri).await?;
            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(text, request.uri)],
            })
        }
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListPromptsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListPromptsResult::with_all_items(prompt_list())))
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<GetPromptResult, McpError>> + Send + '_ {
        std::future::ready(self.prompt(&request.name, request.arguments))
    }
}
