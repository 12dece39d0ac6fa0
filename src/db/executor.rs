//! Query execution contract shared by the warehouse backends.

use crate::error::{WarehouseError, WarehouseResult};
use crate::models::QueryRows;
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default per-statement timeout.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 300;

/// Executes SQL against the connected warehouse.
///
/// Execution is one-shot: a failed statement is reported, never retried.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `sql` and return its rows in column order.
    async fn execute(&self, sql: &str) -> WarehouseResult<QueryRows>;

    /// Release the underlying session, if one is open.
    async fn close(&self) {}
}

/// Tunables common to every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    pub query_timeout: Duration,
    pub session_ttl: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(crate::db::session::DEFAULT_SESSION_TTL_SECS),
        }
    }
}

/// Await `fut` under `limit`, logging the statement and its outcome.
pub(crate) async fn run_with_timeout<T, F>(sql: &str, limit: Duration, fut: F) -> WarehouseResult<T>
where
    F: Future<Output = WarehouseResult<T>>,
{
    let start = Instant::now();
    debug!(sql = %sql, timeout_secs = limit.as_secs(), "Executing query");

    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => {
            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Query completed");
            Ok(value)
        }
        Ok(Err(err)) => {
            warn!(sql = %sql, error = %err, "Query failed");
            Err(err)
        }
        Err(_) => {
            warn!(sql = %sql, timeout_secs = limit.as_secs(), "Query timed out");
            Err(WarehouseError::timeout("query", limit.as_secs()))
        }
    }
}
