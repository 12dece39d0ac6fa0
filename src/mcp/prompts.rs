//! Prompt templates served through `prompts/list` and `prompts/get`.

use crate::error::{WarehouseError, WarehouseResult};
use crate::tools::ToolId;
use crate::tools::import::ImportInput;
use rmcp::model::{
    GetPromptResult, JsonObject, Prompt, PromptArgument, PromptMessage, PromptMessageRole,
};
use serde_json::Value as JsonValue;

pub const CREATE_TABLE_PROMPT: &str = "create_table_prompt";
pub const IMPORT_TABLE_PROMPT: &str = "create_database_connection_and_query_table_prompt";

const COLUMNS_HELP: &str = "The columns and their types in the format 'column1:type1,column2:type2' \
    (e.g., 'id:INTEGER,name:STRING').";

fn argument(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        required: Some(required),
    }
}

/// Every prompt the server offers.
pub fn prompt_list() -> Vec<Prompt> {
    vec![
        Prompt::new(
            CREATE_TABLE_PROMPT,
            Some(format!(
                "Create a new table by prompting the user for table name, columns, and their types. {COLUMNS_HELP}"
            )),
            Some(vec![
                argument("table_name", "The name of the table to create.", true),
                argument("columns", COLUMNS_HELP, true),
            ]),
        ),
        Prompt::new(
            IMPORT_TABLE_PROMPT,
            Some(
                "Establish a connection to a database by providing the necessary connection \
                parameters and query data from table.",
            ),
            Some(vec![
                argument(
                    "db_type",
                    "The type of the database: 'mysql', 'postgresql' or 'sqlite'.",
                    true,
                ),
                argument(
                    "host",
                    "The hostname or IP address of the database server. Not required for SQLite.",
                    false,
                ),
                argument(
                    "port",
                    "The port number of the database server. Not required for SQLite.",
                    false,
                ),
                argument(
                    "database",
                    "The name of the database to connect to. For SQLite, this is the file path \
                    to the database file.",
                    false,
                ),
                argument(
                    "username",
                    "The username for authentication. Not required for SQLite.",
                    false,
                ),
                argument(
                    "password",
                    "The password for authentication. Not required for SQLite.",
                    false,
                ),
                argument("source_table", "The table(source table) to be queried.", true),
                argument("dest_table", "The table(destination table) to be write.", true),
            ]),
        ),
    ]
}

/// Argument as display text; missing and null become empty.
fn text_arg(arguments: &JsonObject, key: &str) -> String {
    match arguments.get(key) {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn required_arg(arguments: &JsonObject, key: &str) -> WarehouseResult<String> {
    let value = text_arg(arguments, key);
    if value.trim().is_empty() {
        return Err(WarehouseError::invalid_input(format!(
            "Missing required argument: '{key}'"
        )));
    }
    Ok(value)
}

fn user_message(description: &str, text: String) -> GetPromptResult {
    GetPromptResult {
        description: Some(description.to_string()),
        messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
    }
}

/// Render prompt `name` with the caller's arguments.
pub fn render_prompt(name: &str, arguments: Option<JsonObject>) -> WarehouseResult<GetPromptResult> {
    let arguments = arguments.unwrap_or_default();
    match name {
        CREATE_TABLE_PROMPT => {
            let table_name = required_arg(&arguments, "table_name")?;
            let columns = required_arg(&arguments, "columns")?;
            Ok(user_message(
                "Create a table",
                format!(
                    "Create a table named '{table_name}' with the following columns:\n\n{columns}"
                ),
            ))
        }
        IMPORT_TABLE_PROMPT => {
            let input: ImportInput = serde_json::from_value(JsonValue::Object(arguments.clone()))
                .map_err(|e| {
                    WarehouseError::invalid_input(format!("Invalid prompt arguments: {e}"))
                })?;
            let kind = input.check_required()?;
            let [host, port, database, username, password, source_table, dest_table] = [
                "host",
                "port",
                "database",
                "username",
                "password",
                "source_table",
                "dest_table",
            ]
            .map(|key| text_arg(&arguments, key));
            Ok(user_message(
                "Copy a database table into the warehouse",
                format!(
                    "Connect to a {kind} database with the following details:\n\
                    Host: {host}\n\
                    Port: {port}\n\
                    Database: {database}\n\
                    Username: {username}\n\
                    Password: {password}\n\
                    \n\
                    Query the table named '{source_table}' and save the results into the target \
                    table '{dest_table}' using the {tool} tool.",
                    tool = ToolId::ImportDataFromDatabase.name(),
                ),
            ))
        }
        other => Err(WarehouseError::invalid_input(format!(
            "Prompt not found: {other}"
        ))),
    }
}
