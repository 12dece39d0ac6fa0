//! Warehouse access layer.
//!
//! - `executor`: the `QueryExecutor` contract and timeout handling
//! - `session`: lazily opened, TTL-bounded session holder
//! - `snowflake`: Snowflake backend
//! - `sqlx_backend`: single-connection sqlx backend (Clickzetta URL, SQLite)
//! - `catalog`: platform-specific catalog SQL
//! - `types`: row decoding

pub mod catalog;
pub mod executor;
pub mod session;
pub mod snowflake;
pub mod sqlx_backend;
pub mod types;

pub use catalog::Catalog;
pub use executor::{DEFAULT_QUERY_TIMEOUT_SECS, ExecutorOptions, QueryExecutor};
pub use session::{DEFAULT_SESSION_TTL_SECS, SessionCell};
pub use snowflake::{SnowflakeExecutor, SnowflakeSettings};
pub use sqlx_backend::SqlxExecutor;

use crate::config::ConnectionSettings;
use crate::error::WarehouseResult;
use std::sync::Arc;

/// Build the executor for the configured connection.
///
/// No session is opened here; the first statement logs in.
pub fn connect(
    settings: &ConnectionSettings,
    options: ExecutorOptions,
) -> WarehouseResult<Arc<dyn QueryExecutor>> {
    match settings {
        ConnectionSettings::Snowflake(snowflake) => {
            Ok(Arc::new(SnowflakeExecutor::new(snowflake, options)?))
        }
        ConnectionSettings::Url(url) => Ok(Arc::new(SqlxExecutor::new(url.as_str(), options))),
    }
}
