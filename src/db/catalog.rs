//! Platform-specific catalog SQL.
//!
//! Builds the statements behind the schema tools (`list_tables`,
//! `describe_table`, `show_object_list`, `desc_object`) and the prefetch
//! queries. Agent-supplied names are validated before being spliced into
//! SQL; string literals are escaped.

use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{Platform, Row};
use serde_json::Value as JsonValue;

/// Maximum length of an agent-supplied identifier.
pub const MAX_IDENTIFIER_LEN: usize = 512;

/// Escape `value` as a single-quoted SQL string literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Validate a (possibly qualified) object name.
///
/// Accepts letters, digits, `_`, `.`, `$`, `-`, and quoted segments using
/// double quotes or backticks.
pub fn validate_identifier(value: &str, what: &str) -> WarehouseResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WarehouseError::invalid_input(format!("Missing {what} argument")));
    }
    if trimmed.len() > MAX_IDENTIFIER_LEN {
        return Err(WarehouseError::invalid_input(format!(
            "{what} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }

    let mut quote: Option<char> = None;
    for ch in trimmed.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {
                if ch.is_control() {
                    return Err(invalid_char(what, ch));
                }
            }
            None => match ch {
                '"' | '`' => quote = Some(ch),
                c if c.is_alphanumeric() || matches!(c, '_' | '.' | '$' | '-') => {}
                c => return Err(invalid_char(what, c)),
            },
        }
    }
    if quote.is_some() {
        return Err(WarehouseError::invalid_input(format!(
            "{what} has an unterminated quoted identifier"
        )));
    }
    Ok(())
}

/// Validate an object type keyword such as `TABLES` or `TABLE STREAM`.
pub fn validate_object_type(value: &str) -> WarehouseResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WarehouseError::invalid_input("Missing object_type argument"));
    }
    match trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == ' '))
    {
        Some(c) => Err(invalid_char("object_type", c)),
        None => Ok(()),
    }
}

fn invalid_char(what: &str, ch: char) -> WarehouseError {
    WarehouseError::invalid_input(format!("{what} contains invalid character '{ch}'"))
}

/// Catalog statement builder for one connection.
#[derive(Debug, Clone)]
pub struct Catalog {
    platform: Platform,
    /// Snowflake database or Clickzetta workspace.
    database: Option<String>,
    schema: Option<String>,
}

impl Catalog {
    pub fn new(platform: Platform, database: Option<String>, schema: Option<String>) -> Self {
        Self {
            platform,
            database: database.filter(|d| !d.trim().is_empty()),
            schema: schema.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    fn database(&self) -> WarehouseResult<&str> {
        let label = match self.platform {
            Platform::Snowflake => "database",
            Platform::Clickzetta => "workspace",
        };
        self.database
            .as_deref()
            .ok_or_else(|| WarehouseError::invalid_input(format!("No {label} is configured")))
    }

    fn schema(&self) -> WarehouseResult<&str> {
        self.schema
            .as_deref()
            .ok_or_else(|| WarehouseError::invalid_input("No schema is configured"))
    }

    /// Tables of the configured schema.
    pub fn list_tables_sql(&self) -> WarehouseResult<String> {
        let database = self.database()?;
        let schema = self.schema()?;
        validate_identifier(database, "database")?;
        Ok(match self.platform {
            Platform::Snowflake => format!(
                "select table_catalog, table_schema, table_name, comment from {database}.information_schema.tables where table_schema = {}",
                sql_literal(&schema.to_uppercase())
            ),
            Platform::Clickzetta => format!(
                "SELECT table_catalog, table_schema, table_name, comment FROM {database}.information_schema.tables WHERE table_catalog = {} AND table_schema = {}",
                sql_literal(&database.to_lowercase()),
                sql_literal(&schema.to_lowercase())
            ),
        })
    }

    /// Column information for `table_name`.
    ///
    /// On Snowflake a `db.schema.table` name is resolved against the
    /// configured database and schema, all parts upper-cased.
    pub fn describe_table_sql(&self, table_name: &str) -> WarehouseResult<String> {
        validate_identifier(table_name, "table_name")?;
        match self.platform {
            Platform::Snowflake => {
                let parts: Vec<&str> = table_name.trim().split('.').collect();
                let table = parts[parts.len() - 1].to_uppercase();
                let schema = match parts.len() {
                    n if n > 1 => parts[n - 2].to_string(),
                    _ => self.schema()?.to_string(),
                }
                .to_uppercase();
                let database = match parts.len() {
                    n if n > 2 => parts[n - 3].to_string(),
                    _ => self.database()?.to_string(),
                }
                .to_uppercase();
                Ok(format!(
                    "select column_name, column_default, is_nullable, data_type, comment from {database}.information_schema.columns where table_schema = {} and table_name = {}",
                    sql_literal(&schema),
                    sql_literal(&table)
                ))
            }
            Platform::Clickzetta => Ok(format!("DESC TABLE EXTENDED {}", table_name.trim())),
        }
    }

    /// `SHOW <object_type>`.
    pub fn show_objects_sql(&self, object_type: &str) -> WarehouseResult<String> {
        validate_object_type(object_type)?;
        Ok(format!("SHOW {}", object_type.trim()))
    }

    /// Describe a single object of `object_type`.
    pub fn desc_object_sql(&self, object_type: &str, object_name: &str) -> WarehouseResult<String> {
        validate_object_type(object_type)?;
        validate_identifier(object_name, "object_name")?;
        let (object_type, object_name) = (object_type.trim(), object_name.trim());
        Ok(match self.platform {
            Platform::Clickzetta => format!("DESC {object_type} EXTENDED {object_name}"),
            Platform::Snowflake => format!("DESCRIBE {object_type} {object_name}"),
        })
    }

    /// Prefetch query for table names and comments.
    pub fn prefetch_tables_sql(&self) -> WarehouseResult<String> {
        let database = self.database()?;
        let schema = self.schema()?;
        validate_identifier(database, "database")?;
        Ok(match self.platform {
            Platform::Snowflake => format!(
                "select table_name, comment from {database}.information_schema.tables where table_schema = {}",
                sql_literal(&schema.to_uppercase())
            ),
            Platform::Clickzetta => format!(
                "SELECT table_name, comment FROM {database}.information_schema.tables WHERE table_catalog = {} AND table_schema = {}",
                sql_literal(&database.to_lowercase()),
                sql_literal(&schema.to_lowercase())
            ),
        })
    }

    /// Prefetch query for every column of the configured schema.
    pub fn prefetch_columns_sql(&self) -> WarehouseResult<String> {
        let database = self.database()?;
        let schema = self.schema()?;
        validate_identifier(database, "database")?;
        Ok(match self.platform {
            Platform::Snowflake => format!(
                "select table_name, column_name, data_type, comment from {database}.information_schema.columns where table_schema = {}",
                sql_literal(&schema.to_uppercase())
            ),
            Platform::Clickzetta => format!(
                "SELECT table_name, column_name, data_type, comment FROM {database}.information_schema.columns WHERE table_catalog = {} AND table_schema = {}",
                sql_literal(&database.to_lowercase()),
                sql_literal(&schema.to_lowercase())
            ),
        })
    }
}

/// Case-insensitive column lookup; warehouses differ in result-name casing.
pub fn column_value<'a>(row: &'a Row, name: &str) -> Option<&'a JsonValue> {
    row.get(name).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn key_of(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

/// Group prefetched rows into `{table: {..table row.., COLUMNS: {column: row}}}`.
///
/// Columns of tables missing from `tables` are ignored.
pub fn tables_brief(tables: Vec<Row>, columns: Vec<Row>) -> Row {
    let mut brief = Row::new();
    for mut row in tables {
        let Some(name) = column_value(&row, "table_name").and_then(key_of) else {
            continue;
        };
        row.insert("COLUMNS".to_string(), JsonValue::Object(Row::new()));
        brief.insert(name, JsonValue::Object(row));
    }

    for row in columns {
        let table = column_value(&row, "table_name").and_then(key_of);
        let column = column_value(&row, "column_name").and_then(key_of);
        let (Some(table), Some(column)) = (table, column) else {
            continue;
        };
        if let Some(JsonValue::Object(entry)) = brief.get_mut(&table) {
            if let Some(JsonValue::Object(cols)) = entry.get_mut("COLUMNS") {
                cols.insert(column, JsonValue::Object(row));
            }
        }
    }
    brief
}
