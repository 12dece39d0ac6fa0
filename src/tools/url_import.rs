//! `import_data_into_table_from_url`: load a delimited text or JSON file
//! into the warehouse.
//!
//! The file comes from an http(s) URL, a `file://` URL or a local path. Its
//! type is taken from the extension: `csv` and `txt` are delimited text (comma
//! or tab, sniffed from the first kilobyte), `json` is an array of objects.
//! The destination table is recreated with one STRING column per source
//! column, exactly like the database import.

use crate::db::catalog::validate_identifier;
use crate::error::{WarehouseError, WarehouseResult};
use crate::models::Row;
use crate::tools::import::{import_summary, load_statements};
use crate::tools::{ToolContext, ToolHandler, ToolId, ToolOutput, parse_args, schema_object};
use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Bytes inspected when guessing the delimiter.
const DELIMITER_SAMPLE: usize = 1024;

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct UrlImportInput {
    /// http(s) URL, file:// URL or local path of a .csv, .txt or .json file
    #[serde(default)]
    pub from_url: Option<String>,
    /// Warehouse table to (re)create and fill
    #[serde(default)]
    pub dest_table: Option<String>,
}

/// Where the file is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Http(Url),
    Local(PathBuf),
}

impl FileSource {
    pub fn parse(source: &str) -> WarehouseResult<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let url = Url::parse(source)
                .map_err(|e| WarehouseError::invalid_input(format!("Invalid URL '{source}': {e}")))?;
            return Ok(Self::Http(url));
        }
        if source.starts_with("file://") {
            let path = Url::parse(source)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| WarehouseError::invalid_input(format!("Invalid file URL '{source}'")))?;
            return Ok(Self::Local(path));
        }
        Ok(Self::Local(PathBuf::from(source)))
    }

    /// Lower-cased extension of the last path segment.
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Self::Http(url) => url.path_segments()?.next_back()?.to_string(),
            Self::Local(path) => path.file_name()?.to_string_lossy().into_owned(),
        };
        Path::new(&name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    async fn fetch(&self, timeout: Duration) -> Result<Vec<u8>, String> {
        match self {
            Self::Http(url) => {
                let client = reqwest::Client::builder()
                    .timeout(timeout)
                    .build()
                    .map_err(|e| e.to_string())?;
                let response = client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(|e| e.to_string())?;
                let body = response.bytes().await.map_err(|e| e.to_string())?;
                Ok(body.to_vec())
            }
            Self::Local(path) => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Err(format!("Local file does not exist: {}", path.display()));
                }
                tokio::fs::read(path).await.map_err(|e| e.to_string())
            }
        }
    }
}

/// File formats the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Delimited,
    Json,
}

impl FileFormat {
    pub fn from_extension(ext: Option<&str>) -> WarehouseResult<Self> {
        match ext {
            Some("csv" | "txt") => Ok(Self::Delimited),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(WarehouseError::invalid_input(format!(
                "Unsupported file type: {other}"
            ))),
            None => Err(WarehouseError::invalid_input(
                "Unsupported file type: the source has no file extension",
            )),
        }
    }
}

/// Column names and rows read from a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Comma when the sample has one, else tab when it has one, else comma.
pub fn sniff_delimiter(text: &str) -> char {
    let sample = match text.char_indices().nth(DELIMITER_SAMPLE) {
        Some((idx, _)) => &text[..idx],
        None => text,
    };
    if sample.contains(',') {
        ','
    } else if sample.contains('\t') {
        '\t'
    } else {
        ','
    }
}

/// Split delimited text into records.
///
/// Fields may be wrapped in double quotes; `""` inside quotes is a literal
/// quote and quoted fields may span lines. An empty unquoted field is `None`.
/// Blank lines are skipped.
pub fn split_records(text: &str, delimiter: char) -> WarehouseResult<Vec<Vec<Option<String>>>> {
    fn finish(field: &mut String, quoted: &mut bool) -> Option<String> {
        let value = std::mem::take(field);
        let was_quoted = std::mem::take(quoted);
        (was_quoted || !value.is_empty()).then_some(value)
    }

    let mut records = Vec::new();
    let mut record: Vec<Option<String>> = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    let mut push_record = |record: &mut Vec<Option<String>>| {
        let done = std::mem::take(record);
        if !(done.len() == 1 && done[0].is_none()) {
            records.push(done);
        }
    };

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }
        match ch {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            c if c == delimiter => record.push(finish(&mut field, &mut quoted)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(finish(&mut field, &mut quoted));
                push_record(&mut record);
            }
            c => field.push(c),
        }
    }

    if in_quotes {
        return Err(WarehouseError::invalid_input("Unterminated quoted field"));
    }
    if quoted || !field.is_empty() || !record.is_empty() {
        record.push(finish(&mut field, &mut quoted));
        push_record(&mut record);
    }
    Ok(records)
}

/// Header names with blanks filled in and duplicates suffixed `.1`, `.2`, ...
fn header_names(header: Vec<Option<String>>) -> Vec<String> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    header
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Unnamed: {idx}"));
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

/// Parse delimited text whose first record is the header.
pub fn parse_delimited(text: &str) -> WarehouseResult<Table> {
    let delimiter = sniff_delimiter(text);
    let mut records = split_records(text, delimiter)?.into_iter();
    let Some(header) = records.next() else {
        return Ok(Table::default());
    };
    let columns = header_names(header);

    let mut rows = Vec::new();
    for (idx, record) in records.enumerate() {
        if record.len() > columns.len() {
            return Err(WarehouseError::invalid_input(format!(
                "Row {} has {} fields, expected {}",
                idx + 1,
                record.len(),
                columns.len()
            )));
        }
        let mut row = Row::new();
        let mut values = record.into_iter();
        for column in &columns {
            let value = values
                .next()
                .flatten()
                .map_or(JsonValue::Null, JsonValue::String);
            row.insert(column.clone(), value);
        }
        rows.push(row);
    }
    Ok(Table { columns, rows })
}

/// Parse a JSON array of objects. Columns are the keys in first-seen order.
pub fn parse_json(text: &str) -> WarehouseResult<Table> {
    let not_records = || WarehouseError::invalid_input("JSON source must be an array of objects");
    let value: JsonValue = serde_json::from_str(text)
        .map_err(|e| WarehouseError::invalid_input(format!("Invalid JSON: {e}")))?;
    let JsonValue::Array(items) = value else {
        return Err(not_records());
    };

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let JsonValue::Object(row) = item else {
            return Err(not_records());
        };
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        rows.push(row);
    }
    Ok(Table { columns, rows })
}

pub fn parse_file(format: FileFormat, bytes: &[u8]) -> WarehouseResult<Table> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| WarehouseError::invalid_input("File is not valid UTF-8 text"))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    match format {
        FileFormat::Delimited => parse_delimited(text),
        FileFormat::Json => parse_json(text),
    }
}

pub struct ImportUrlTool;

#[async_trait]
impl ToolHandler for ImportUrlTool {
    fn input_schema(&self) -> Arc<JsonObject> {
        schema_object::<UrlImportInput>()
    }

    async fn invoke(&self, ctx: &ToolContext, args: JsonObject) -> WarehouseResult<ToolOutput> {
        let input: UrlImportInput = parse_args(ToolId::ImportDataFromUrl, args)?;
        let from_url = input
            .from_url
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| WarehouseError::invalid_input("Missing from_url argument"))?;
        let dest_table = input
            .dest_table
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| WarehouseError::invalid_input("Missing dest_table argument"))?;
        validate_identifier(&dest_table, "dest_table")?;

        let source = FileSource::parse(&from_url)?;
        let format = FileFormat::from_extension(source.extension().as_deref())?;
        info!(source = %from_url, dest = %dest_table, ?format, "Importing file");

        let read_failed = |reason: String| {
            WarehouseError::invalid_input(format!(
                "Failed to read file from source {from_url}: {reason}"
            ))
        };
        let bytes = source
            .fetch(ctx.executor_options.query_timeout)
            .await
            .map_err(read_failed)?;
        debug!(bytes = bytes.len(), "Source file read");
        let table = parse_file(format, &bytes).map_err(|e| read_failed(e.to_string()))?;

        if table.columns.is_empty() {
            return Err(WarehouseError::invalid_input(format!(
                "Source '{from_url}' has no columns to import"
            )));
        }

        for sql in load_statements(ctx.platform, &dest_table, &table.columns, &table.rows) {
            ctx.executor.execute(&sql).await?;
        }
        info!(dest = %dest_table, rows = table.rows.len(), "Import finished");
        Ok(import_summary(&dest_table, table.rows.len()))
    }
}
