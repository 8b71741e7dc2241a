use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::table::Table;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Values treated as missing data by the `blank_to_null` rule.
const NULL_SENTINELS: [&str; 3] = ["na", "n/a", "null"];

/// Normalises a single column name: lowercase, runs of anything outside
/// `[a-z0-9]` collapse to one underscore, leading/trailing underscores
/// stripped. Idempotent by construction.
pub fn normalise_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    NON_ALNUM
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Pure column-name normalisation over a whole table. Fails if two columns
/// collapse to the same normalised name.
pub fn normalise_column_names(mut table: Table) -> Result<Table> {
    let normalised: Vec<String> = table.columns().iter().map(|c| normalise_name(c)).collect();
    table.rename_columns(normalised)?;
    Ok(table)
}

/// Applies the fixed business-rule set without tracking a summary.
pub fn apply_business_rules(table: Table) -> Result<Table> {
    let mut transformer = DataTransformer::new();
    transformer.apply_business_rules(table)
}

/// Applies column normalisation, the business-rule set, and optional row
/// filtering, remembering which transformations ran for summary reporting.
#[derive(Debug, Default)]
pub struct DataTransformer {
    applied: Vec<String>,
}

impl DataTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalise_column_names(&mut self, table: Table) -> Result<Table> {
        let table = normalise_column_names(table)?;
        self.applied.push("normalise_column_names".to_string());
        debug!(columns = ?table.columns(), "column names normalised");
        Ok(table)
    }

    /// Business rules run in a fixed, documented order:
    /// 1. `trim_whitespace` - strip surrounding whitespace from string cells
    /// 2. `blank_to_null`   - empty strings and the NULL_SENTINELS become nulls
    /// 3. `coerce_numeric`  - all-numeric string columns become number columns
    /// 4. `derive_row_id`   - append a 1-based `row_id` column when absent
    ///
    /// Order matters: trimming must precede the sentinel check, and both must
    /// precede numeric coercion so `" 42 "` coerces and `"NA"` does not.
    pub fn apply_business_rules(&mut self, mut table: Table) -> Result<Table> {
        if rule_trim_whitespace(&mut table) {
            self.applied.push("trim_whitespace".to_string());
        }
        if rule_blank_to_null(&mut table) {
            self.applied.push("blank_to_null".to_string());
        }
        if rule_coerce_numeric(&mut table) {
            self.applied.push("coerce_numeric".to_string());
        }
        if rule_derive_row_id(&mut table)? {
            self.applied.push("derive_row_id".to_string());
        }
        Ok(table)
    }

    /// Keeps only rows matching every criterion. String criteria compare
    /// case-insensitively against string cells; everything else compares by
    /// JSON equality.
    pub fn filter_data(
        &mut self,
        mut table: Table,
        criteria: &BTreeMap<String, Value>,
    ) -> Result<Table> {
        let mut indices = Vec::with_capacity(criteria.len());
        for (column, criterion) in criteria {
            let index = table.column_index(column).ok_or_else(|| {
                EtlError::Transformation(format!("filter references unknown column '{column}'"))
            })?;
            indices.push((index, criterion.clone()));
        }

        let before = table.row_count();
        table.retain_rows(|row| {
            indices
                .iter()
                .all(|(index, criterion)| cell_matches(&row[*index], criterion))
        });
        let after = table.row_count();
        info!(before, after, "filter applied");
        self.applied
            .push(format!("filter_data ({before} -> {after} rows)"));
        Ok(table)
    }

    /// Names of the transformations applied so far, in application order.
    pub fn transformation_summary(&self) -> Vec<String> {
        self.applied.clone()
    }
}

fn cell_matches(cell: &Value, criterion: &Value) -> bool {
    match (cell, criterion) {
        (Value::String(cell), Value::String(wanted)) => cell.eq_ignore_ascii_case(wanted),
        (cell, wanted) => cell == wanted,
    }
}

fn rule_trim_whitespace(table: &mut Table) -> bool {
    let mut changed = false;
    table.map_cells(|_, cell| match cell {
        Value::String(s) if s.trim() != s.as_str() => {
            changed = true;
            Value::String(s.trim().to_string())
        }
        other => other.clone(),
    });
    changed
}

fn rule_blank_to_null(table: &mut Table) -> bool {
    let mut changed = false;
    table.map_cells(|_, cell| match cell {
        Value::String(s)
            if s.is_empty() || NULL_SENTINELS.contains(&s.to_ascii_lowercase().as_str()) =>
        {
            changed = true;
            Value::Null
        }
        other => other.clone(),
    });
    changed
}

/// A column coerces only when every non-null cell is a string that parses as
/// a number; mixed columns are left alone.
fn rule_coerce_numeric(table: &mut Table) -> bool {
    let mut numeric_columns = Vec::new();
    for (index, column) in table.columns().iter().enumerate() {
        let mut saw_string = false;
        let coercible = table.rows().iter().all(|row| match &row[index] {
            Value::Null => true,
            Value::String(s) => {
                saw_string = true;
                s.parse::<f64>().is_ok()
            }
            _ => false,
        });
        if coercible && saw_string {
            numeric_columns.push(column.clone());
        }
    }
    if numeric_columns.is_empty() {
        return false;
    }

    table.map_cells(|column, cell| {
        if !numeric_columns.iter().any(|c| c == column) {
            return cell.clone();
        }
        match cell {
            Value::String(s) => {
                if let Ok(i) = s.parse::<i64>() {
                    Value::from(i)
                } else {
                    let f = s.parse::<f64>().expect("checked above");
                    serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
                }
            }
            other => other.clone(),
        }
    });
    true
}

fn rule_derive_row_id(table: &mut Table) -> Result<bool> {
    if table.column_index("row_id").is_some() {
        return Ok(false);
    }
    let ids = (1..=table.row_count()).map(Value::from).collect();
    table.add_column("row_id".to_string(), ids)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_table() -> Table {
        let mut table =
            Table::new(vec!["First Name".into(), "Unit-Price ($)".into(), "Note".into()]).unwrap();
        table
            .push_row(vec![json!(" alice "), json!("10"), json!("ok")])
            .unwrap();
        table
            .push_row(vec![json!("bob"), json!("2.5"), json!("NA")])
            .unwrap();
        table
            .push_row(vec![json!("carol"), json!("7"), json!("")])
            .unwrap();
        table
    }

    #[test]
    fn normalisation_is_idempotent() {
        let names = ["First Name", "Unit-Price ($)", "  Já Normal  "];
        for name in names {
            let once = normalise_name(name);
            assert_eq!(normalise_name(&once), once);
        }
        assert_eq!(normalise_name("First Name"), "first_name");
        assert_eq!(normalise_name("Unit-Price ($)"), "unit_price");
    }

    #[test]
    fn duplicate_names_after_normalisation_fail() {
        let table = Table::new(vec!["A B".into(), "a-b".into()]).unwrap();
        assert!(normalise_column_names(table).is_err());
    }

    #[test]
    fn business_rules_apply_in_order() {
        let mut transformer = DataTransformer::new();
        let table = transformer.normalise_column_names(sample_table()).unwrap();
        let table = transformer.apply_business_rules(table).unwrap();

        // whitespace trimmed, then sentinel/blank cells nulled
        assert_eq!(table.rows()[0][0], json!("alice"));
        assert_eq!(table.rows()[1][2], Value::Null);
        assert_eq!(table.rows()[2][2], Value::Null);
        // numeric strings coerced
        assert_eq!(table.rows()[0][1], json!(10));
        assert_eq!(table.rows()[1][1], json!(2.5));
        // derived column appended last
        assert_eq!(table.columns().last().map(String::as_str), Some("row_id"));
        assert_eq!(table.rows()[2][3], json!(3));

        assert_eq!(
            transformer.transformation_summary(),
            vec![
                "normalise_column_names",
                "trim_whitespace",
                "blank_to_null",
                "coerce_numeric",
                "derive_row_id",
            ]
        );
    }

    #[test]
    fn mixed_columns_are_not_coerced() {
        let mut table = Table::new(vec!["v".into()]).unwrap();
        table.push_row(vec![json!("12")]).unwrap();
        table.push_row(vec![json!("twelve")]).unwrap();
        let table = apply_business_rules(table).unwrap();
        assert_eq!(table.rows()[0][0], json!("12"));
    }

    #[test]
    fn filter_keeps_matching_rows() {
        let mut transformer = DataTransformer::new();
        let table = transformer.normalise_column_names(sample_table()).unwrap();
        let criteria = BTreeMap::from([("first_name".to_string(), json!("ALICE"))]);
        // trim runs before any filtering in the pipeline; trim here manually
        let table = transformer.apply_business_rules(table).unwrap();
        let table = transformer.filter_data(table, &criteria).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows()[0][0], json!("alice"));
    }

    #[test]
    fn filter_on_unknown_column_fails() {
        let mut transformer = DataTransformer::new();
        let criteria = BTreeMap::from([("ghost".to_string(), json!(1))]);
        let err = transformer
            .filter_data(sample_table(), &criteria)
            .unwrap_err();
        assert!(matches!(err, EtlError::Transformation(_)));
    }
}
