//! Warehouse MCP Server Library
//!
//! Exposes a Snowflake or Clickzetta warehouse to AI assistants as MCP
//! tools. `read_query` is gated by a lexical write classifier; write tools
//! are only offered when writes are enabled.

pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use classifier::{ClassificationResult, SqlWriteClassifier};
pub use config::Config;
pub use error::{WarehouseError, WarehouseResult};
pub use mcp::WarehouseService;
