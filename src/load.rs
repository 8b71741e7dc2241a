use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::Utc;
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::error::{EtlError, Result};
use crate::table::{ColumnType, Table};

/// Supported destination formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            "json" => Ok(OutputFormat::Json),
            other => Err(EtlError::Load(format!(
                "unsupported output format: '{other}' (expected csv, parquet or json)"
            ))),
        }
    }
}

/// Derives the sibling summary-file path by suffix substitution, e.g.
/// `out/data.csv` -> `out/data_summary.json`.
pub fn derive_summary_path(output_path: &Path, format: OutputFormat) -> PathBuf {
    let path = output_path.to_string_lossy();
    let suffix = format!(".{}", format.as_str());
    if let Some(stem) = path.strip_suffix(suffix.as_str()) {
        PathBuf::from(format!("{stem}_summary.json"))
    } else {
        PathBuf::from(format!("{path}_summary.json"))
    }
}

/// Per-column statistics for the data-summary document.
#[derive(Debug, Serialize)]
struct ColumnSummary {
    name: String,
    #[serde(rename = "type")]
    column_type: ColumnType,
    null_count: usize,
    distinct_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mean: Option<f64>,
}

#[derive(Debug, Serialize)]
struct DataSummary {
    generated_at: chrono::DateTime<Utc>,
    row_count: usize,
    column_count: usize,
    columns: Vec<ColumnSummary>,
}

/// Persists a [`Table`] to the destination format and materialises the
/// data-summary document.
#[derive(Debug, Default)]
pub struct DataLoader;

impl DataLoader {
    pub fn new() -> Self {
        Self
    }

    /// Writes the table to `output_path`. Signals failure via the returned
    /// boolean rather than an error: the orchestrator records a clean failed
    /// load status instead of aborting through the containment path.
    pub fn save(&self, table: &Table, output_path: &Path, format: OutputFormat) -> bool {
        match self.save_inner(table, output_path, format) {
            Ok(()) => {
                info!(path = %output_path.display(), format = %format, rows = table.row_count(), "table persisted");
                true
            }
            Err(e) => {
                error!(path = %output_path.display(), format = %format, "save failed: {e}");
                false
            }
        }
    }

    fn save_inner(&self, table: &Table, output_path: &Path, format: OutputFormat) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        match format {
            OutputFormat::Csv => save_csv(table, output_path),
            OutputFormat::Json => save_json(table, output_path),
            OutputFormat::Parquet => save_parquet(table, output_path),
        }
    }

    /// Writes the structured data summary (counts, inferred column types,
    /// basic aggregates) as JSON.
    pub fn create_summary(&self, table: &Table, summary_path: &Path) -> Result<()> {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(index, name)| summarise_column(table, index, name))
            .collect();
        let summary = DataSummary {
            generated_at: Utc::now(),
            row_count: table.row_count(),
            column_count: table.column_count(),
            columns,
        };
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(summary_path, json)?;
        info!(path = %summary_path.display(), "data summary written");
        Ok(())
    }
}

/// Convenience wrapper matching the loader contract.
pub fn save_to_destination(table: &Table, output_path: &Path, format: OutputFormat) -> bool {
    DataLoader::new().save(table, output_path, format)
}

/// Convenience wrapper matching the loader contract.
pub fn create_data_summary(table: &Table, summary_path: &Path) -> Result<()> {
    DataLoader::new().create_summary(table, summary_path)
}

fn summarise_column(table: &Table, index: usize, name: &str) -> ColumnSummary {
    let column_type = table.column_type(index);
    let mut null_count = 0;
    let mut distinct = std::collections::HashSet::new();
    let mut numeric: Vec<f64> = Vec::new();
    for row in table.rows() {
        match &row[index] {
            Value::Null => null_count += 1,
            cell => {
                distinct.insert(cell.to_string());
                if let Some(f) = cell.as_f64() {
                    numeric.push(f);
                }
            }
        }
    }
    let (min, max, mean) = if matches!(column_type, ColumnType::Integer | ColumnType::Float)
        && !numeric.is_empty()
    {
        let min = numeric.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = numeric.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = numeric.iter().sum::<f64>() / numeric.len() as f64;
        (Some(min), Some(max), Some(mean))
    } else {
        (None, None, None)
    };
    ColumnSummary {
        name: name.to_string(),
        column_type,
        null_count,
        distinct_count: distinct.len(),
        min,
        max,
        mean,
    }
}

fn save_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        let record: Vec<String> = row.iter().map(cell_to_csv_field).collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn cell_to_csv_field(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn save_json(table: &Table, path: &Path) -> Result<()> {
    let records = table.to_records();
    let json = serde_json::to_string_pretty(&records)?;
    fs::write(path, json)?;
    Ok(())
}

fn save_parquet(table: &Table, path: &Path) -> Result<()> {
    let mut fields = Vec::with_capacity(table.column_count());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.column_count());
    for (index, name) in table.columns().iter().enumerate() {
        let (data_type, array) = column_to_arrow(table, index);
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }
    let schema = Arc::new(Schema::new(fields));

    // Zero-column tables still need an explicit row count
    let options = RecordBatchOptions::new().with_row_count(Some(table.row_count()));
    let batch = RecordBatch::try_new_with_options(schema.clone(), arrays, &options)
        .map_err(|e| EtlError::Load(format!("arrow batch construction failed: {e}")))?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)
        .map_err(|e| EtlError::Load(format!("parquet writer init failed: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| EtlError::Load(format!("parquet write failed: {e}")))?;
    writer
        .close()
        .map_err(|e| EtlError::Load(format!("parquet close failed: {e}")))?;
    Ok(())
}

fn column_to_arrow(table: &Table, index: usize) -> (DataType, ArrayRef) {
    let cells = table.rows().iter().map(|row| &row[index]);
    match table.column_type(index) {
        ColumnType::Integer => {
            let values: Int64Array = cells.map(|c| c.as_i64()).collect();
            (DataType::Int64, Arc::new(values))
        }
        ColumnType::Float => {
            let values: Float64Array = cells.map(|c| c.as_f64()).collect();
            (DataType::Float64, Arc::new(values))
        }
        ColumnType::Boolean => {
            let values: BooleanArray = cells.map(|c| c.as_bool()).collect();
            (DataType::Boolean, Arc::new(values))
        }
        ColumnType::String | ColumnType::Empty => {
            let values: StringArray = cells
                .map(|c| match c {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect();
            (DataType::Utf8, Arc::new(values))
        }
    }
}
