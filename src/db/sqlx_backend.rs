//! sqlx-backed executor over a single `AnyConnection`.
//!
//! Serves Clickzetta endpoints reachable through a sqlx driver URL and any
//! database sqlx can drive. There is no pool: one connection is opened
//! lazily and reopened after its TTL or a connection error.

use crate::db::executor::{ExecutorOptions, QueryExecutor, run_with_timeout};
use crate::db::session::SessionCell;
use crate::db::types::any_row_to_json;
use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{QueryRows, Row};
use async_trait::async_trait;
use sqlx::{AnyConnection, Connection};
use std::time::Duration;
use tracing::{debug, info};

pub struct SqlxExecutor {
    url: String,
    query_timeout: Duration,
    session: SessionCell<AnyConnection>,
}

impl SqlxExecutor {
    /// Create an executor for `url`. The connection opens on first use.
    pub fn new(url: impl Into<String>, options: ExecutorOptions) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            url: url.into(),
            query_timeout: options.query_timeout,
            session: SessionCell::new(options.session_ttl),
        }
    }

    /// Open a connection immediately and verify it answers.
    pub async fn connect(url: impl Into<String>, options: ExecutorOptions) -> WarehouseResult<Self> {
        let executor = Self::new(url, options);
        {
            let mut conn = executor.session.acquire(|| open(&executor.url)).await?;
            conn.ping().await?;
        }
        Ok(executor)
    }

    async fn fetch(&self, sql: &str) -> WarehouseResult<Vec<Row>> {
        let mut conn = self.session.acquire(|| open(&self.url)).await?;
        let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
        Ok(rows.iter().map(any_row_to_json).collect())
    }
}

async fn open(url: &str) -> WarehouseResult<AnyConnection> {
    debug!("Connecting through sqlx");
    AnyConnection::connect(url).await.map_err(|e| match e {
        sqlx::Error::Database(db_err) => WarehouseError::connection(
            db_err.message().to_string(),
            "Check the credentials and database name in the connection URL",
        ),
        other => WarehouseError::from(other),
    })
}

#[async_trait]
impl QueryExecutor for SqlxExecutor {
    async fn execute(&self, sql: &str) -> WarehouseResult<QueryRows> {
        let result = run_with_timeout(sql, self.query_timeout, self.fetch(sql)).await;
        if matches!(&result, Err(e) if e.is_connection_error() || matches!(e, WarehouseError::Timeout { .. }))
        {
            self.session.invalidate().await;
        }
        result.map(QueryRows::new)
    }

    async fn close(&self) {
        if let Some(conn) = self.session.take().await {
            info!("Closing database connection");
            if let Err(e) = conn.close().await {
                debug!(error = %e, "Error while closing connection");
            }
        }
    }
}
