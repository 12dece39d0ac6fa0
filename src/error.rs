//! Error types for the warehouse MCP server.
//!
//! Every fallible operation returns [`WarehouseResult`]. Tool handlers return
//! these errors unchanged; the MCP service converts them into tool error
//! content at a single boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("{message}")]
    Query {
        message: String,
        /// e.g. "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("{reason}")]
    Permission { operation: String, reason: String },

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("Tool {name} is excluded from this data connection")]
    ToolUnavailable { name: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WarehouseError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query error with optional SQL state.
    pub fn query(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a permission error.
    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn tool_unavailable(name: impl Into<String>) -> Self {
        Self::ToolUnavailable { name: name.into() }
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Timeout { .. } => {
                Some("Consider increasing the query timeout or narrowing the query")
            }
            Self::ToolUnavailable { .. } | Self::UnknownTool { .. } => {
                Some("Call tools/list to see the tools offered by this connection")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// True for errors after which the warehouse session should be reopened.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Convert sqlx errors to WarehouseError.
impl From<sqlx::Error> for WarehouseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => WarehouseError::connection(
                msg.to_string(),
                "Check the connection URL format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                WarehouseError::query(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => WarehouseError::query("No rows returned", None),
            sqlx::Error::PoolTimedOut => WarehouseError::timeout("connection acquire", 30),
            sqlx::Error::PoolClosed => {
                WarehouseError::connection("Connection is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => WarehouseError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => WarehouseError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => WarehouseError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                WarehouseError::query(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                WarehouseError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                WarehouseError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::AnyDriverError(err) => WarehouseError::connection(
                format!("Driver error: {}", err),
                "Check that the URL scheme names a supported driver",
            ),
            sqlx::Error::WorkerCrashed => WarehouseError::internal("Database worker crashed"),
            _ => WarehouseError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert Snowflake client errors to WarehouseError.
///
/// Expired or invalid session tokens are reported as connection errors so the
/// session is reopened on the next call.
impl From<snowflake_connector_rs::Error> for WarehouseError {
    fn from(err: snowflake_connector_rs::Error) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();
        if lower.contains("expired") || lower.contains("session") || lower.contains("login") {
            WarehouseError::connection(message, "Check the Snowflake credentials and account")
        } else {
            WarehouseError::query(message, None)
        }
    }
}

/// Result type alias for warehouse operations.
pub type WarehouseResult<T> = Result<T, WarehouseError>;

fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert WarehouseError to MCP ErrorData for protocol-level failures
/// (resource reads, malformed requests).
impl From<WarehouseError> for rmcp::ErrorData {
    fn from(err: WarehouseError) -> Self {
        let data = suggestion_data(err.suggestion());
        match &err {
            WarehouseError::InvalidInput { .. }
            | WarehouseError::Permission { .. }
            | WarehouseError::ToolUnavailable { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), data)
            }

            WarehouseError::UnknownTool { .. } => {
                rmcp::ErrorData::resource_not_found(err.to_string(), data)
            }

            WarehouseError::Query {
                message, sql_state, ..
            } => {
                let msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, data)
            }

            WarehouseError::Connection { .. }
            | WarehouseError::Timeout { .. }
            | WarehouseError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), data)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WarehouseError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_tool_messages() {
        assert_eq!(
            WarehouseError::tool_unavailable("write_query").to_string(),
            "Tool write_query is excluded from this data connection"
        );
        assert_eq!(
            WarehouseError::unknown_tool("nope").to_string(),
            "Unknown tool: nope"
        );
    }

    #[test]
    fn test_permission_displays_reason_only() {
        let err = WarehouseError::permission(
            "read_query",
            "Calls to read_query should not contain write operations",
        );
        assert_eq!(
            err.to_string(),
            "Calls to read_query should not contain write operations"
        );
    }

    #[test]
    fn test_error_retryable() {
        assert!(WarehouseError::timeout("query", 30).is_retryable());
        assert!(WarehouseError::connection("err", "sugg").is_retryable());
        assert!(!WarehouseError::permission("write", "read-only").is_retryable());
    }

    #[test]
    fn test_invalid_input_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = WarehouseError::invalid_input("bad input").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_unknown_tool_maps_to_resource_not_found() {
        let mcp_err: rmcp::ErrorData = WarehouseError::unknown_tool("x").into();
        assert_eq!(mcp_err.code.0, -32002);
        assert!(mcp_err.data.is_some());
    }

    #[test]
    fn test_connection_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = WarehouseError::connection("failed", "try again").into();
        assert_eq!(mcp_err.code.0, -32603);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "try again");
    }

    #[test]
    fn test_timeout_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = WarehouseError::timeout("query", 30).into();
        assert_eq!(mcp_err.code.0, -32603);
    }

    #[test]
    fn test_query_error_includes_sql_state() {
        let err = WarehouseError::query("syntax error", Some("42601".to_string()));
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32602);
        assert!(mcp_err.message.contains("42601"));
    }
}
