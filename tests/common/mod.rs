//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use warehouse_mcp_server::WarehouseResult;
use warehouse_mcp_server::db::{ExecutorOptions, QueryExecutor, SqlxExecutor};
use warehouse_mcp_server::models::{Platform, QueryRows, Row};
use warehouse_mcp_server::tools::ToolContext;

/// Executor that records statements and replays scripted results.
#[derive(Default)]
pub struct FakeExecutor {
    statements: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<WarehouseResult<Vec<Row>>>>,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the result of the next statement. Unscripted statements return no rows.
    pub fn respond(&self, result: WarehouseResult<Vec<Row>>) {
        self.responses.lock().unwrap().push_back(result);
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(&self, sql: &str) -> WarehouseResult<QueryRows> {
        self.statements.lock().unwrap().push(sql.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new())).map(QueryRows::new)
    }
}

/// Build a row from `(column, value)` pairs, keeping their order.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn fake_context(platform: Platform) -> (Arc<FakeExecutor>, ToolContext) {
    let fake = FakeExecutor::new();
    let ctx = ToolContext::new(platform, fake.clone());
    (fake, ctx)
}

/// Context over a private in-memory SQLite database.
pub fn sqlite_context() -> ToolContext {
    let executor = SqlxExecutor::new("sqlite::memory:", ExecutorOptions::default());
    ToolContext::new(Platform::Snowflake, Arc::new(executor))
}

/// Tool arguments from a JSON literal.
pub fn args(value: Value) -> Option<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
