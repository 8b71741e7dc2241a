use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use calamine::{open_workbook, Data, Reader, Xlsx};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::table::Table;

/// Supported source file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Csv,
    Xlsx,
    Json,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Csv => "csv",
            SourceType::Xlsx => "xlsx",
            SourceType::Json => "json",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(SourceType::Csv),
            "xlsx" => Ok(SourceType::Xlsx),
            "json" => Ok(SourceType::Json),
            other => Err(EtlError::Extraction(format!(
                "unsupported source type: '{other}' (expected csv, xlsx or json)"
            ))),
        }
    }
}

/// Reads a source file into an in-memory [`Table`].
#[derive(Debug, Default)]
pub struct DataExtractor;

impl DataExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, source_path: &Path, source_type: SourceType) -> Result<Table> {
        info!(path = %source_path.display(), source_type = %source_type, "extracting source");
        let table = match source_type {
            SourceType::Csv => extract_csv(source_path)?,
            SourceType::Xlsx => extract_xlsx(source_path)?,
            SourceType::Json => extract_json(source_path)?,
        };
        debug!(
            rows = table.row_count(),
            columns = table.column_count(),
            "extraction complete"
        );
        Ok(table)
    }
}

/// Convenience wrapper matching the extractor contract.
pub fn extract_from_source(source_path: &Path, source_type: SourceType) -> Result<Table> {
    DataExtractor::new().extract(source_path, source_type)
}

fn extract_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| EtlError::Extraction(format!("cannot read CSV '{}': {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EtlError::Extraction(format!("bad CSV headers: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut table = Table::new(headers)?;
    for record in reader.records() {
        let record =
            record.map_err(|e| EtlError::Extraction(format!("malformed CSV record: {e}")))?;
        let row = record
            .iter()
            .map(|field| Value::String(field.to_string()))
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}

fn extract_xlsx(path: &Path) -> Result<Table> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| EtlError::Extraction(format!("cannot open XLSX '{}': {e}", path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EtlError::Extraction("XLSX workbook has no worksheets".to_string()))?
        .map_err(|e| EtlError::Extraction(format!("cannot read first worksheet: {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_to_header).collect(),
        None => Vec::new(),
    };

    let mut table = Table::new(headers)?;
    for sheet_row in rows {
        let row: Vec<Value> = sheet_row.iter().map(cell_to_value).collect();
        table.push_row(row)?;
    }
    Ok(table)
}

fn cell_to_header(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::String(s.clone()),
        Data::DateTime(_) => Value::String(cell.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(format!("#ERROR:{e:?}")),
    }
}

fn extract_json(path: &Path) -> Result<Table> {
    let file = File::open(path)
        .map_err(|e| EtlError::Extraction(format!("cannot open JSON '{}': {e}", path.display())))?;
    let value: Value = serde_json::from_reader(file)
        .map_err(|e| EtlError::Extraction(format!("malformed JSON: {e}")))?;

    let records = value
        .as_array()
        .ok_or_else(|| EtlError::Extraction("JSON source must be an array of objects".to_string()))?;

    // Column order follows first appearance across the records
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        let object = record.as_object().ok_or_else(|| {
            EtlError::Extraction("JSON source must be an array of objects".to_string())
        })?;
        for key in object.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = Table::new(columns)?;
    for record in records {
        let object = record.as_object().expect("validated above");
        let row = table
            .columns()
            .iter()
            .map(|col| object.get(col).cloned().unwrap_or(Value::Null))
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}
