//! Warehouse MCP Server - Main entry point.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use warehouse_mcp_server::config::{Config, TransportMode};
use warehouse_mcp_server::db::{self, Catalog};
use warehouse_mcp_server::mcp::WarehouseService;
use warehouse_mcp_server::tools::schema::{TablesBrief, prefetch_tables_brief};
use warehouse_mcp_server::tools::{ToolContext, ToolPolicy, ToolRegistry};
use warehouse_mcp_server::transport::{HttpTransport, StdioTransport, Transport};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    let settings = match config.connection_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            eprintln!("Usage: warehouse-mcp-server --account <ACCOUNT> --user <USER> --password <PASSWORD>");
            eprintln!("       warehouse-mcp-server --platform clickzetta --url <URL>");
            eprintln!();
            eprintln!("Snowflake settings can also come from SNOWFLAKE_ACCOUNT, SNOWFLAKE_USER,");
            eprintln!("SNOWFLAKE_PASSWORD, SNOWFLAKE_ROLE, SNOWFLAKE_WAREHOUSE, SNOWFLAKE_DATABASE");
            eprintln!("and SNOWFLAKE_SCHEMA.");
            std::process::exit(1);
        }
    };

    info!(
        platform = %config.platform,
        transport = %config.transport,
        target = %settings.describe(),
        allow_write = config.allow_write,
        prefetch = config.prefetch,
        "Starting Warehouse MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let executor = db::connect(&settings, config.executor_options())?;
    let catalog = Catalog::new(config.platform, config.database.clone(), config.schema.clone());
    let ctx = ToolContext::new(config.platform, executor)
        .with_catalog(catalog)
        .with_search(config.search_defaults())
        .with_max_rows(config.max_rows)
        .with_executor_options(config.executor_options());

    let policy = ToolPolicy::new(config.platform)
        .with_allow_write(config.allow_write)
        .with_prefetch(config.prefetch)
        .with_excluded(config.excluded_tools());
    let mut registry = ToolRegistry::new(policy);
    let mut tables = TablesBrief::default();
    if config.prefetch {
        tables = prefetch_tables_brief(&ctx).await;
        registry = registry.with_tables_brief(tables.text.clone());
    }
    info!(tools = ?registry.listed_names(), "Tools registered");

    let service = WarehouseService::new(Arc::new(registry), Arc::new(ctx)).with_tables(tables);

    let result = match config.transport {
        TransportMode::Stdio => StdioTransport::new(service).run().await,
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                service,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
