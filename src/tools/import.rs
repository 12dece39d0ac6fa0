//! `import_data_into_table_from_database`: copy a table from MySQL,
//! PostgreSQL or SQLite into the warehouse.
//!
//! The source is read in one `SELECT *` through a short-lived sqlx
//! connection. The destination table is dropped and recreated with one
//! STRING column per source column, then filled with batched INSERTs.

use crate::db::catalog::{sql_literal, validate_identifier};
use crate::db::{QueryExecutor, SqlxExecutor};
use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{DataEnvelope, Platform, QueryRows, Row};
use crate::tools::{ToolContext, ToolHandler, ToolId, ToolOutput, parse_args, schema_object};
use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Rows per INSERT statement.
pub const INSERT_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Mysql,
    Postgresql,
    Sqlite,
}

impl SourceKind {
    pub const SUPPORTED: &'static str = "mysql, postgresql, sqlite";

    pub fn parse(value: &str) -> WarehouseResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "postgresql" | "postgres" => Ok(Self::Postgresql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(WarehouseError::invalid_input(format!(
                "Unsupported database type '{other}'. Supported types are: {}",
                Self::SUPPORTED
            ))),
        }
    }

    fn required(&self) -> &'static [&'static str] {
        match self {
            Self::Mysql | Self::Postgresql => &[
                "host",
                "port",
                "database",
                "username",
                "password",
                "source_table",
                "dest_table",
            ],
            Self::Sqlite => &["database", "source_table", "dest_table"],
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mysql => f.write_str("mysql"),
            Self::Postgresql => f.write_str("postgresql"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ImportInput {
    /// Source database type: mysql, postgresql or sqlite
    #[serde(default)]
    pub db_type: Option<String>,
    /// Source host (mysql, postgresql)
    #[serde(default)]
    pub host: Option<String>,
    /// Source port (mysql, postgresql)
    #[serde(default)]
    #[schemars(with = "Option<u16>")]
    pub port: Option<JsonValue>,
    /// Database name, or the file path for sqlite
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Table to read from the source database
    #[serde(default)]
    pub source_table: Option<String>,
    /// Warehouse table to (re)create and fill
    #[serde(default)]
    pub dest_table: Option<String>,
}

/// Validated import request.
pub struct ImportPlan {
    pub kind: SourceKind,
    pub source_url: String,
    pub source_table: String,
    pub dest_table: String,
}

impl fmt::Debug for ImportPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportPlan")
            .field("kind", &self.kind)
            .field("source_table", &self.source_table)
            .field("dest_table", &self.dest_table)
            .finish_non_exhaustive()
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn port_present(value: &Option<JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn parse_port(value: &JsonValue) -> WarehouseResult<u16> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        JsonValue::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| WarehouseError::invalid_input(format!("Invalid port '{value}'")))
}

impl ImportInput {
    fn is_set(&self, field: &str) -> bool {
        match field {
            "host" => present(&self.host),
            "port" => port_present(&self.port),
            "database" => present(&self.database),
            "username" => present(&self.username),
            "password" => present(&self.password),
            "source_table" => present(&self.source_table),
            "dest_table" => present(&self.dest_table),
            _ => false,
        }
    }

    /// Source type, once every argument it requires is present.
    pub fn check_required(&self) -> WarehouseResult<SourceKind> {
        let db_type = self
            .db_type
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| WarehouseError::invalid_input("Missing required argument: 'db_type'"))?;
        let kind = SourceKind::parse(db_type)?;

        let missing: Vec<&str> = kind
            .required()
            .iter()
            .copied()
            .filter(|field| !self.is_set(field))
            .collect();
        if !missing.is_empty() {
            return Err(WarehouseError::invalid_input(format!(
                "Missing required arguments for database type '{kind}': {}",
                missing.join(", ")
            )));
        }
        Ok(kind)
    }

    pub fn plan(self) -> WarehouseResult<ImportPlan> {
        let kind = self.check_required()?;

        let source_table = self.source_table.unwrap_or_default().trim().to_string();
        let dest_table = self.dest_table.unwrap_or_default().trim().to_string();
        validate_identifier(&source_table, "source_table")?;
        validate_identifier(&dest_table, "dest_table")?;

        let database = self.database.unwrap_or_default();
        let source_url = match kind {
            SourceKind::Sqlite => format!("sqlite://{}?mode=ro", database.trim()),
            SourceKind::Mysql | SourceKind::Postgresql => {
                let host = self.host.unwrap_or_default();
                let port = self.port.as_ref().map(parse_port).transpose()?;
                server_url(
                    kind,
                    host.trim(),
                    port,
                    database.trim(),
                    self.username.as_deref().unwrap_or_default(),
                    self.password.as_deref().unwrap_or_default(),
                )?
            }
        };

        Ok(ImportPlan {
            kind,
            source_url,
            source_table,
            dest_table,
        })
    }
}

fn server_url(
    kind: SourceKind,
    host: &str,
    port: Option<u16>,
    database: &str,
    username: &str,
    password: &str,
) -> WarehouseResult<String> {
    let invalid = || WarehouseError::invalid_input(format!("Invalid host '{host}'"));
    let mut url = Url::parse(&format!("{}://{host}", kind.scheme())).map_err(|_| invalid())?;
    url.set_port(port).map_err(|_| invalid())?;
    url.set_username(username).map_err(|_| invalid())?;
    url.set_password(Some(password)).map_err(|_| invalid())?;
    url.set_path(database);
    Ok(url.to_string())
}

/// Render a source cell as a warehouse literal.
fn cell_literal(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) => sql_literal(s),
        JsonValue::Bool(b) => sql_literal(&b.to_string()),
        JsonValue::Number(n) => sql_literal(&n.to_string()),
        other => sql_literal(&other.to_string()),
    }
}

/// Statements that recreate `dest_table` and load `rows` into it.
pub fn load_statements(
    platform: Platform,
    dest_table: &str,
    columns: &[String],
    rows: &[Row],
) -> Vec<String> {
    let quoted: Vec<String> = columns
        .iter()
        .map(|c| platform.quote_ident(c))
        .collect();

    let mut statements = vec![
        format!("DROP TABLE IF EXISTS {dest_table}"),
        format!(
            "CREATE TABLE {dest_table} ({})",
            quoted
                .iter()
                .map(|c| format!("{c} STRING"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    ];

    let column_list = quoted.join(", ");
    for batch in rows.chunks(INSERT_BATCH_SIZE) {
        let values = batch
            .iter()
            .map(|row| {
                let cells = columns
                    .iter()
                    .map(|c| cell_literal(row.get(c).unwrap_or(&JsonValue::Null)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({cells})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        statements.push(format!(
            "INSERT INTO {dest_table} ({column_list}) VALUES {values}"
        ));
    }
    statements
}

pub struct ImportDataTool;

impl ImportDataTool {
    async fn read_source(ctx: &ToolContext, plan: &ImportPlan) -> WarehouseResult<Vec<Row>> {
        let source = SqlxExecutor::new(plan.source_url.clone(), ctx.executor_options);
        let result = source
            .execute(&format!("SELECT * FROM {}", plan.source_table))
            .await;
        source.close().await;
        Ok(result?.rows)
    }
}

#[async_trait]
impl ToolHandler for ImportDataTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<ImportInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: ImportInput = parse_args(ToolId::ImportDataFromDatabase, args)?;
        let plan = input.plan()?;
        info!(
            db_type = %plan.kind,
            source = %plan.source_table,
            dest = %plan.dest_table,
            "Importing table"
        );

        let rows = Self::read_source(ctx, &plan).await?;
        let Some(first) = rows.first() else {
            warn!(source = %plan.source_table, "Source table is empty");
            return Err(WarehouseError::invalid_input(format!(
                "Source table '{}' has no rows to import",
                plan.source_table
            )));
        };
        let columns: Vec<String> = first.keys().cloned().collect();

        for sql in load_statements(ctx.platform, &plan.dest_table, &columns, &rows) {
            ctx.executor.execute(&sql).await?;
        }
        info!(dest = %plan.dest_table, rows = rows.len(), "Import finished");
        Ok(import_summary(&plan.dest_table, rows.len()))
    }
}

/// Data envelope reporting a finished import.
pub(crate) fn import_summary(dest_table: &str, rows: usize) -> ToolOutput {
    let mut summary = Row::new();
    summary.insert(
        "Result".into(),
        json!("Successfully imported data into table"),
    );
    summary.insert("Table".into(), json!(dest_table));
    summary.insert("Rows".into(), json!(rows));
    ToolOutput::data(DataEnvelope::from(QueryRows::new(vec![summary])))
}
