//! Configuration handling for the warehouse MCP server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::db::executor::{DEFAULT_QUERY_TIMEOUT_SECS, ExecutorOptions};
use crate::db::session::DEFAULT_SESSION_TTL_SECS;
use crate::db::snowflake::SnowflakeSettings;
use crate::error::{WarehouseError, WarehouseResult};
use crate::models::Platform;
use clap::{Parser, ValueEnum};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_MAX_ROWS: usize = 50;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Resolved connection target.
#[derive(Debug, Clone)]
pub enum ConnectionSettings {
    Snowflake(SnowflakeSettings),
    /// sqlx driver URL. Shown redacted by [`redact_url`].
    Url(Url),
}

impl ConnectionSettings {
    /// Description safe for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Snowflake(s) => format!("snowflake account={} user={}", s.account, s.user),
            Self::Url(url) => redact_url(url),
        }
    }
}

/// Render `url` with its password replaced by `***`.
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    if redacted.password().is_some() {
        // set_password only fails for URLs that cannot carry credentials
        let _ = redacted.set_password(Some("***"));
    }
    redacted.to_string()
}

/// Fallback arguments for the `match_all` search tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchDefaults {
    pub table_name: Option<String>,
    pub content_column_name: Option<String>,
    pub partition_scope: Option<String>,
}

/// Configuration for the warehouse MCP server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "warehouse-mcp-server",
    about = "MCP server exposing a Snowflake or Clickzetta warehouse to AI assistants",
    version,
    author
)]
pub struct Config {
    /// Warehouse platform
    #[arg(
        long,
        value_enum,
        default_value = "snowflake",
        env = "MCP_PLATFORM"
    )]
    pub platform: Platform,

    /// Snowflake account identifier
    #[arg(long, env = "SNOWFLAKE_ACCOUNT")]
    pub account: Option<String>,

    /// Snowflake user
    #[arg(long, env = "SNOWFLAKE_USER")]
    pub user: Option<String>,

    /// Snowflake password
    #[arg(long, env = "SNOWFLAKE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Snowflake role
    #[arg(long, env = "SNOWFLAKE_ROLE")]
    pub role: Option<String>,

    /// Snowflake virtual warehouse
    #[arg(long, env = "SNOWFLAKE_WAREHOUSE")]
    pub warehouse: Option<String>,

    /// Database (Snowflake) or workspace (Clickzetta)
    #[arg(long, visible_alias = "workspace", env = "SNOWFLAKE_DATABASE")]
    pub database: Option<String>,

    /// Schema holding the tables exposed by the catalog tools
    #[arg(long, env = "SNOWFLAKE_SCHEMA")]
    pub schema: Option<String>,

    /// sqlx connection URL (required for clickzetta)
    #[arg(long, value_name = "URL", env = "MCP_DATABASE_URL", hide_env_values = true)]
    pub url: Option<String>,

    /// Allow write operations on the database
    #[arg(long, env = "MCP_ALLOW_WRITE")]
    pub allow_write: bool,

    /// Prefetch table descriptions (list_tables and describe_table are then hidden)
    #[arg(long, env = "MCP_PREFETCH")]
    pub prefetch: bool,

    /// Tools to exclude
    #[arg(
        long = "exclude-tools",
        value_name = "TOOL",
        env = "MCP_EXCLUDE_TOOLS",
        value_delimiter = ','
    )]
    pub exclude_tools: Vec<String>,

    /// Maximum rows returned by read_query
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS, env = "MCP_MAX_ROWS")]
    pub max_rows: usize,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Session lifetime in seconds before reconnecting
    #[arg(
        long,
        default_value_t = DEFAULT_SESSION_TTL_SECS,
        env = "MCP_SESSION_TTL"
    )]
    pub session_ttl: u64,

    /// Default table for match_all
    #[arg(long, env = "SIMILAR_TABLE_NAME")]
    pub similar_table_name: Option<String>,

    /// Default content column for match_all
    #[arg(long, env = "SIMILAR_CONTENT_COLUMN_NAME")]
    pub similar_content_column_name: Option<String>,

    /// Default partition filter for match_all
    #[arg(long, env = "SIMILAR_PARTITION_SCOPE")]
    pub similar_partition_scope: Option<String>,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            platform: Platform::Snowflake,
            account: None,
            user: None,
            password: None,
            role: None,
            warehouse: None,
            database: None,
            schema: None,
            url: None,
            allow_write: false,
            prefetch: false,
            exclude_tools: Vec::new(),
            max_rows: DEFAULT_MAX_ROWS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            session_ttl: DEFAULT_SESSION_TTL_SECS,
            similar_table_name: None,
            similar_content_column_name: None,
            similar_partition_scope: None,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Validate the per-platform settings and resolve the connection target.
    ///
    /// A URL always wins; otherwise Snowflake needs account, user and
    /// password. Clickzetta is only reachable through a URL.
    pub fn connection_settings(&self) -> WarehouseResult<ConnectionSettings> {
        if let Some(raw) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            let url = Url::parse(raw.trim()).map_err(|e| {
                WarehouseError::invalid_input(format!("Invalid connection URL: {e}"))
            })?;
            return Ok(ConnectionSettings::Url(url));
        }

        match self.platform {
            Platform::Clickzetta => Err(WarehouseError::invalid_input(
                "A connection URL (--url) is required for the clickzetta platform",
            )),
            Platform::Snowflake => {
                let missing: Vec<&str> = [
                    ("SNOWFLAKE_ACCOUNT", &self.account),
                    ("SNOWFLAKE_USER", &self.user),
                    ("SNOWFLAKE_PASSWORD", &self.password),
                ]
                .into_iter()
                .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
                .map(|(name, _)| name)
                .collect();

                if !missing.is_empty() {
                    return Err(WarehouseError::invalid_input(format!(
                        "Missing Snowflake settings: {}",
                        missing.join(", ")
                    )));
                }

                Ok(ConnectionSettings::Snowflake(SnowflakeSettings {
                    account: self.account.clone().unwrap_or_default(),
                    user: self.user.clone().unwrap_or_default(),
                    password: self.password.clone().unwrap_or_default(),
                    role: self.role.clone(),
                    warehouse: self.warehouse.clone(),
                    database: self.database.clone(),
                    schema: self.schema.clone(),
                }))
            }
        }
    }

    /// Executor tunables.
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            query_timeout: self.query_timeout_duration(),
            session_ttl: Duration::from_secs(self.session_ttl),
        }
    }

    /// Fallback arguments for `match_all`.
    pub fn search_defaults(&self) -> SearchDefaults {
        SearchDefaults {
            table_name: self.similar_table_name.clone(),
            content_column_name: self.similar_content_column_name.clone(),
            partition_scope: self.similar_partition_scope.clone(),
        }
    }

    /// Excluded tool names, trimmed and without blanks.
    pub fn excluded_tools(&self) -> Vec<String> {
        self.exclude_tools
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
