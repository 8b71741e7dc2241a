use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EtlError, Result};

/// Inferred type of a column, derived from its non-null cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    String,
    /// Column contains only nulls (or the table has no rows)
    Empty,
}

/// An in-memory tabular dataset with named columns.
///
/// Invariants are enforced at construction and mutation time: column names
/// are unique and every row carries exactly one cell per column. Cells are
/// JSON values, which keeps the extract formats (CSV, XLSX, JSON) on a
/// common footing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(EtlError::Extraction(format!(
                    "duplicate column name: '{name}'"
                )));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::Extraction(format!(
                "row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Replaces the column names wholesale. Used by column normalisation;
    /// the uniqueness invariant still holds.
    pub fn rename_columns(&mut self, columns: Vec<String>) -> Result<()> {
        if columns.len() != self.columns.len() {
            return Err(EtlError::Transformation(format!(
                "rename expects {} names, got {}",
                self.columns.len(),
                columns.len()
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(EtlError::Transformation(format!(
                    "column name collision after normalisation: '{name}'"
                )));
            }
        }
        self.columns = columns;
        Ok(())
    }

    /// Appends a new column, filling one cell per existing row.
    pub fn add_column(&mut self, name: String, cells: Vec<Value>) -> Result<()> {
        if self.column_index(&name).is_some() {
            return Err(EtlError::Transformation(format!(
                "column '{name}' already exists"
            )));
        }
        if cells.len() != self.rows.len() {
            return Err(EtlError::Transformation(format!(
                "new column has {} cells, expected {}",
                cells.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name);
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
        Ok(())
    }

    pub fn map_cells<F>(&mut self, mut f: F)
    where
        F: FnMut(&str, &Value) -> Value,
    {
        let columns = self.columns.clone();
        for row in &mut self.rows {
            for (col, cell) in columns.iter().zip(row.iter_mut()) {
                *cell = f(col, cell);
            }
        }
    }

    pub fn retain_rows<F>(&mut self, mut f: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|row| f(row));
    }

    /// Infers a column's type from its non-null cells. Mixed numeric columns
    /// widen to Float; any non-numeric, non-boolean cell makes it String.
    pub fn column_type(&self, index: usize) -> ColumnType {
        let mut inferred: Option<ColumnType> = None;
        for row in &self.rows {
            let cell_type = match &row[index] {
                Value::Null => continue,
                Value::Bool(_) => ColumnType::Boolean,
                Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
                Value::Number(_) => ColumnType::Float,
                _ => ColumnType::String,
            };
            inferred = Some(match (inferred, cell_type) {
                (None, t) => t,
                (Some(t), u) if t == u => t,
                (Some(ColumnType::Integer), ColumnType::Float)
                | (Some(ColumnType::Float), ColumnType::Integer) => ColumnType::Float,
                _ => ColumnType::String,
            });
        }
        inferred.unwrap_or(ColumnType::Empty)
    }

    /// Rows as JSON objects keyed by column name, preserving row order.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}
