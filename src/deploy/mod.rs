//! Deploy phase: renders an HTML report for a pipeline run and publishes it,
//! together with the data and summary artifacts, to object storage as a
//! static website. Deployment is best-effort; failure is reported by the
//! absence of a URL, never by an error reaching the orchestrator.

mod html;
mod object_store;

pub use html::{HtmlGenerator, STYLES_CSS};
pub use object_store::{InMemoryObjectStore, ObjectStore, S3Gateway};

use std::sync::Arc;

use tracing::{info, warn};

use crate::summary::RunSummary;
use crate::table::Table;
use crate::transform::normalise_name;

/// Publishes run artifacts to an object-storage bucket under a
/// project-scoped key prefix.
pub struct S3Deployer {
    store: Arc<dyn ObjectStore>,
}

impl S3Deployer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Returns the website URL on success, `None` on any failure.
    pub fn deploy(
        &self,
        table: &Table,
        summary: &RunSummary,
        bucket_name: &str,
        project_name: &str,
        region: &str,
    ) -> Option<String> {
        match self.deploy_inner(table, summary, bucket_name, project_name, region) {
            Ok(url) => {
                info!(url = %url, "deployment complete");
                Some(url)
            }
            Err(e) => {
                warn!(bucket = bucket_name, "deployment failed: {e}");
                None
            }
        }
    }

    fn deploy_inner(
        &self,
        table: &Table,
        summary: &RunSummary,
        bucket_name: &str,
        project_name: &str,
        region: &str,
    ) -> anyhow::Result<String> {
        let prefix = normalise_name(project_name);
        let report = HtmlGenerator::new()?.render_report(table, summary, project_name)?;
        let data_csv = table_to_csv_bytes(table)?;
        let summary_json = serde_json::to_vec_pretty(summary)?;

        let objects: [(&str, &[u8], &str); 4] = [
            ("index.html", report.as_bytes(), "text/html"),
            ("styles.css", STYLES_CSS.as_bytes(), "text/css"),
            ("data.csv", &data_csv, "text/csv"),
            ("summary.json", &summary_json, "application/json"),
        ];
        for (name, bytes, content_type) in objects {
            let key = format!("{prefix}/{name}");
            self.store
                .put_object(bucket_name, &key, bytes, content_type)?;
        }

        Ok(format!(
            "http://{bucket_name}.s3-website.{region}.amazonaws.com/{prefix}/index.html"
        ))
    }
}

/// Convenience wrapper matching the deployer contract.
pub fn deploy_etl_results(
    store: Arc<dyn ObjectStore>,
    table: &Table,
    summary: &RunSummary,
    bucket_name: &str,
    project_name: &str,
    region: &str,
) -> Option<String> {
    S3Deployer::new(store).deploy(table, summary, bucket_name, project_name, region)
}

fn table_to_csv_bytes(table: &Table) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        let record: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("csv buffer flush failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_table() -> Table {
        let mut table = Table::new(vec!["name".into()]).unwrap();
        table.push_row(vec![json!("alice")]).unwrap();
        table
    }

    #[test]
    fn deploy_uploads_all_artifacts_and_returns_url() {
        let store = Arc::new(InMemoryObjectStore::new());
        let url = deploy_etl_results(
            store.clone(),
            &sample_table(),
            &RunSummary::new(),
            "my-bucket",
            "Demo Project",
            "eu-west-2",
        );
        assert_eq!(
            url.as_deref(),
            Some("http://my-bucket.s3-website.eu-west-2.amazonaws.com/demo_project/index.html")
        );
        assert_eq!(store.object_count(), 4);
        let report = store.object("my-bucket", "demo_project/index.html").unwrap();
        assert!(String::from_utf8(report).unwrap().contains("Demo Project"));
    }

    #[test]
    fn deploy_failure_yields_no_url() {
        let store = Arc::new(InMemoryObjectStore::failing());
        let url = deploy_etl_results(
            store,
            &sample_table(),
            &RunSummary::new(),
            "unreachable",
            "Demo",
            "eu-west-2",
        );
        assert!(url.is_none());
    }
}
