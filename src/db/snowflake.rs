//! Snowflake executor built on `snowflake-connector-rs`.

use crate::db::executor::{ExecutorOptions, QueryExecutor, run_with_timeout};
use crate::db::session::SessionCell;
use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{QueryRows, Row};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use snowflake_connector_rs::{
    SnowflakeAuthMethod, SnowflakeClient, SnowflakeClientConfig, SnowflakeRow, SnowflakeSession,
};
use std::time::Duration;
use tracing::info;

/// Login settings for a Snowflake account.
#[derive(Clone)]
pub struct SnowflakeSettings {
    pub account: String,
    pub user: String,
    pub password: String,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
}

impl std::fmt::Debug for SnowflakeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeSettings")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"***")
            .field("role", &self.role)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

pub struct SnowflakeExecutor {
    client: SnowflakeClient,
    query_timeout: Duration,
    session: SessionCell<SnowflakeSession>,
}

impl SnowflakeExecutor {
    /// Build the client. No login happens until the first statement.
    pub fn new(settings: &SnowflakeSettings, options: ExecutorOptions) -> WarehouseResult<Self> {
        let client = SnowflakeClient::new(
            &settings.user,
            SnowflakeAuthMethod::Password(settings.password.clone()),
            SnowflakeClientConfig {
                account: settings.account.clone(),
                role: settings.role.clone(),
                warehouse: settings.warehouse.clone(),
                database: settings.database.clone(),
                schema: settings.schema.clone(),
                timeout: Some(options.query_timeout),
            },
        )
        .map_err(|e| {
            WarehouseError::connection(
                e.to_string(),
                "Check SNOWFLAKE_ACCOUNT and SNOWFLAKE_USER",
            )
        })?;

        Ok(Self {
            client,
            query_timeout: options.query_timeout,
            session: SessionCell::new(options.session_ttl),
        })
    }

    async fn open(&self) -> WarehouseResult<SnowflakeSession> {
        info!("Logging in to Snowflake");
        self.client.create_session().await.map_err(|e| {
            WarehouseError::connection(
                format!("Error connecting to Snowflake database: {e}"),
                "Check the Snowflake credentials, role and warehouse",
            )
        })
    }

    async fn fetch(&self, sql: &str) -> WarehouseResult<Vec<Row>> {
        let session = self.session.acquire(|| self.open()).await?;
        let rows = session.query(sql).await?;
        Ok(rows_to_json(&rows))
    }
}

/// Read every cell as text; absent or NULL cells become JSON null.
fn rows_to_json(rows: &[SnowflakeRow]) -> Vec<Row> {
    let column_names: Vec<String> = rows.first().map_or(Vec::new(), |first| {
        first
            .column_types()
            .into_iter()
            .map(|col| col.name().to_string())
            .collect()
    });

    rows.iter()
        .map(|row| {
            column_names
                .iter()
                .map(|name| {
                    let value = match row.get::<Option<String>>(name) {
                        Ok(Some(text)) => JsonValue::String(text),
                        _ => JsonValue::Null,
                    };
                    (name.clone(), value)
                })
                .collect()
        })
        .collect()
}

#[async_trait]
impl QueryExecutor for SnowflakeExecutor {
    async fn execute(&self, sql: &str) -> WarehouseResult<QueryRows> {
        let statement = sql.trim().trim_end_matches(';');
        let result = run_with_timeout(statement, self.query_timeout, self.fetch(statement)).await;
        if matches!(&result, Err(e) if e.is_connection_error()) {
            self.session.invalidate().await;
        }
        result.map(QueryRows::new)
    }

    async fn close(&self) {
        if self.session.take().await.is_some() {
            info!("Closing Snowflake session");
        }
    }
}
