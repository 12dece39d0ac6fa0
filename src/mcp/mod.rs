//! MCP server integration.
//!
//! Bridges the rmcp protocol handler to the tool registry and serves the
//! prompt templates.

pub mod prompts;
pub mod service;

pub use service::WarehouseService;
