use handlebars::Handlebars;
use serde_json::{json, Value};

use crate::error::{EtlError, Result};
use crate::summary::RunSummary;
use crate::table::Table;

/// Rows shown in the report's data preview.
const PREVIEW_ROWS: usize = 50;

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{{project_name}} - ETL Report</title>
  <link rel="stylesheet" href="styles.css">
</head>
<body>
  <h1>{{project_name}}</h1>
  <p class="meta">Run {{run_id}} &middot; started {{started_at}}</p>

  <h2>Pipeline Summary</h2>
  <table class="summary">
    <tr><th>Phase</th><th>Details</th></tr>
    {{#each phases}}
    <tr><td>{{name}}</td><td><pre>{{details}}</pre></td></tr>
    {{/each}}
  </table>

  <h2>Data Preview ({{preview_rows}} of {{total_rows}} rows)</h2>
  <table class="data">
    <tr>{{#each columns}}<th>{{this}}</th>{{/each}}</tr>
    {{#each rows}}
    <tr>{{#each this}}<td>{{this}}</td>{{/each}}</tr>
    {{/each}}
  </table>

  <p class="footer">Artifacts: <a href="data.csv">data.csv</a> &middot; <a href="summary.json">summary.json</a></p>
</body>
</html>
"#;

pub const STYLES_CSS: &str = r#"body { font-family: sans-serif; margin: 2rem; color: #222; }
h1 { border-bottom: 2px solid #444; padding-bottom: 0.3rem; }
.meta, .footer { color: #666; font-size: 0.9rem; }
table { border-collapse: collapse; margin: 1rem 0; }
th, td { border: 1px solid #ccc; padding: 0.4rem 0.8rem; text-align: left; }
th { background: #f0f0f0; }
pre { margin: 0; white-space: pre-wrap; }
"#;

/// Renders the static HTML report for a pipeline run.
pub struct HtmlGenerator {
    registry: Handlebars<'static>,
}

impl HtmlGenerator {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry
            .register_template_string("report", REPORT_TEMPLATE)
            .map_err(|e| EtlError::Deploy(format!("bad report template: {e}")))?;
        Ok(Self { registry })
    }

    pub fn render_report(
        &self,
        table: &Table,
        summary: &RunSummary,
        project_name: &str,
    ) -> Result<String> {
        let preview: Vec<Vec<String>> = table
            .rows()
            .iter()
            .take(PREVIEW_ROWS)
            .map(|row| row.iter().map(cell_to_text).collect())
            .collect();

        let context = json!({
            "project_name": project_name,
            "run_id": summary.run_id.to_string(),
            "started_at": summary.started_at.to_rfc3339(),
            "phases": phase_entries(summary)?,
            "columns": table.columns(),
            "rows": preview,
            "preview_rows": table.row_count().min(PREVIEW_ROWS),
            "total_rows": table.row_count(),
        });

        self.registry
            .render("report", &context)
            .map_err(|e| EtlError::Deploy(format!("report rendering failed: {e}")))
    }
}

fn cell_to_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn phase_entries(summary: &RunSummary) -> Result<Vec<Value>> {
    let as_json = serde_json::to_value(summary)?;
    let mut entries = Vec::new();
    for phase in ["extract", "transform", "load", "deploy", "error"] {
        if let Some(details) = as_json.get(phase) {
            entries.push(json!({
                "name": phase,
                "details": serde_json::to_string_pretty(details)?,
            }));
        }
    }
    Ok(entries)
}
