use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tempfile::tempdir;

use tabular_etl::config::PipelineConfig;
use tabular_etl::deploy::InMemoryObjectStore;
use tabular_etl::extract::SourceType;
use tabular_etl::load::OutputFormat;
use tabular_etl::pipeline::{run_etl, EtlPipeline};
use tabular_etl::summary::{PhaseStatus, TRANSFORMS_SKIPPED};

fn write_sample_csv(path: &Path) -> Result<()> {
    fs::write(path, "First Name,Score\nalice,10\nbob,7\ncarol,9\n")?;
    Ok(())
}

#[test]
fn end_to_end_csv_run_normalises_and_loads() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("input.csv");
    let output = dir.path().join("out/result.csv");
    write_sample_csv(&source)?;

    let mut pipeline = EtlPipeline::new();
    let config = PipelineConfig::new(&source, &output);
    assert!(pipeline.run_pipeline(&config));

    let summary = pipeline.pipeline_summary();
    let extract = summary.extract.expect("extract entry");
    assert_eq!(extract.rows_extracted, 3);
    assert_eq!(extract.columns_extracted, 2);

    let transform = summary.transform.expect("transform entry");
    assert!(transform
        .transformations_applied
        .contains(&"normalise_column_names".to_string()));
    // derive_row_id added a column
    assert_eq!(transform.final_columns, Some(3));

    let load = summary.load.expect("load entry");
    assert_eq!(load.status, PhaseStatus::Success);
    assert_eq!(load.final_rows, Some(3));

    // Headers are lowercase snake_case in the persisted output
    let content = fs::read_to_string(&output)?;
    assert!(content.starts_with("first_name,score,row_id"));

    // Sibling summary document exists with matching row count
    let summary_doc: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("out/result_summary.json"))?)?;
    assert_eq!(summary_doc["row_count"], json!(3));

    // No deployment was requested
    assert!(summary.deploy.is_none());
    Ok(())
}

#[test]
fn disabled_transforms_pass_table_through() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("input.csv");
    let output = dir.path().join("result.csv");
    write_sample_csv(&source)?;

    let config = PipelineConfig::new(&source, &output).apply_transforms(false);
    let mut pipeline = EtlPipeline::new();
    assert!(pipeline.run_pipeline(&config));

    let transform = pipeline.pipeline_summary().transform.expect("entry");
    assert_eq!(
        transform.transformations_applied,
        vec![TRANSFORMS_SKIPPED.to_string()]
    );
    assert!(transform.final_rows.is_none());

    // Original headers and cells survive untouched
    let content = fs::read_to_string(&output)?;
    assert_eq!(content, fs::read_to_string(&source)?);
    Ok(())
}

#[test]
fn filters_reduce_rows_before_load() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("input.csv");
    let output = dir.path().join("result.json");
    write_sample_csv(&source)?;

    let filters = BTreeMap::from([("first_name".to_string(), json!("alice"))]);
    let config = PipelineConfig::new(&source, &output)
        .output_format(OutputFormat::Json)
        .filters(filters);
    let mut pipeline = EtlPipeline::new();
    assert!(pipeline.run_pipeline(&config));

    let records: Value = serde_json::from_str(&fs::read_to_string(&output)?)?;
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["first_name"], json!("alice"));
    Ok(())
}

#[test]
fn empty_filter_map_means_no_filtering() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("input.csv");
    let output = dir.path().join("result.csv");
    write_sample_csv(&source)?;

    let config = PipelineConfig::new(&source, &output).filters(BTreeMap::new());
    let mut pipeline = EtlPipeline::new();
    assert!(pipeline.run_pipeline(&config));

    let transform = pipeline.pipeline_summary().transform.expect("entry");
    // No filter step ran and every row survived
    assert!(!transform
        .transformations_applied
        .iter()
        .any(|t| t.starts_with("filter_data")));
    assert_eq!(transform.final_rows, Some(3));
    Ok(())
}

#[test]
fn load_failure_is_clean_and_skips_deploy() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("input.csv");
    write_sample_csv(&source)?;

    // Output under a path that cannot be created
    let output = Path::new("/proc/tabular_etl_test/result.csv");
    let store = Arc::new(InMemoryObjectStore::new());
    let config = PipelineConfig::new(&source, output).deployment("my-bucket", "eu-west-2");
    let mut pipeline = EtlPipeline::new().with_object_store(store.clone());

    assert!(!pipeline.run_pipeline(&config));

    let summary = pipeline.pipeline_summary();
    let load = summary.load.expect("load entry");
    assert_eq!(load.status, PhaseStatus::Failed);
    assert!(load.output_path.is_none());
    // Deploy never ran and nothing was uploaded
    assert!(summary.deploy.is_none());
    assert_eq!(store.object_count(), 0);
    // Load failure is signalled, not raised: no error entry
    assert!(summary.error.is_none());
    Ok(())
}

#[test]
fn deploy_failure_does_not_fail_the_pipeline() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("input.csv");
    let output = dir.path().join("result.csv");
    write_sample_csv(&source)?;

    let config = PipelineConfig::new(&source, &output).deployment("unreachable", "eu-west-2");
    let mut pipeline =
        EtlPipeline::new().with_object_store(Arc::new(InMemoryObjectStore::failing()));

    assert!(pipeline.run_pipeline(&config));

    let deploy = pipeline.pipeline_summary().deploy.expect("deploy entry");
    assert_eq!(deploy.status, PhaseStatus::Failed);
    assert!(deploy.website_url.is_none());
    Ok(())
}

#[test]
fn successful_deploy_records_website_url() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("input.csv");
    let output = dir.path().join("result.csv");
    write_sample_csv(&source)?;

    let store = Arc::new(InMemoryObjectStore::new());
    let config = PipelineConfig::new(&source, &output)
        .deployment("reports-bucket", "us-east-1")
        .project_name("Quarterly Numbers");
    let mut pipeline = EtlPipeline::new().with_object_store(store.clone());

    assert!(pipeline.run_pipeline(&config));

    let deploy = pipeline.pipeline_summary().deploy.expect("deploy entry");
    assert_eq!(deploy.status, PhaseStatus::Success);
    let url = deploy.website_url.expect("website url");
    assert!(url.contains("reports-bucket.s3-website.us-east-1"));
    assert!(url.ends_with("quarterly_numbers/index.html"));

    // Report, styles, data and summary all uploaded under the project prefix
    assert_eq!(store.object_count(), 4);
    assert!(store
        .object("reports-bucket", "quarterly_numbers/index.html")
        .is_some());
    Ok(())
}

#[test]
fn empty_source_is_a_valid_pass_through() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("empty.csv");
    let output = dir.path().join("result.csv");
    fs::write(&source, "")?;

    let mut pipeline = EtlPipeline::new();
    assert!(pipeline.run_pipeline(&PipelineConfig::new(&source, &output)));

    let summary = pipeline.pipeline_summary();
    assert_eq!(summary.extract.unwrap().rows_extracted, 0);
    assert_eq!(summary.load.unwrap().final_rows, Some(0));
    Ok(())
}

#[test]
fn extraction_error_is_contained_in_the_summary() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("result.csv");
    let config = PipelineConfig::new(dir.path().join("missing.csv"), &output);

    let mut pipeline = EtlPipeline::new();
    assert!(!pipeline.run_pipeline(&config));

    let summary = pipeline.pipeline_summary();
    assert!(summary.extract.is_none());
    assert!(summary.load.is_none());
    let error = summary.error.expect("error entry");
    assert!(error.contains("extraction failed"));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn malformed_filter_aborts_before_load() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("input.csv");
    let output = dir.path().join("result.csv");
    write_sample_csv(&source)?;

    let filters = BTreeMap::from([("no_such_column".to_string(), json!("x"))]);
    let config = PipelineConfig::new(&source, &output).filters(filters);

    let mut pipeline = EtlPipeline::new();
    assert!(!pipeline.run_pipeline(&config));

    let summary = pipeline.pipeline_summary();
    assert!(summary.error.expect("error entry").contains("transformation"));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn run_etl_convenience_function_runs_once() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("input.csv");
    let output = dir.path().join("result.parquet");
    write_sample_csv(&source)?;

    let config = PipelineConfig::new(&source, &output)
        .source_type(SourceType::Csv)
        .output_format(OutputFormat::Parquet);
    assert!(run_etl(&config));
    assert!(output.exists());
    assert!(dir.path().join("result_summary.json").exists());
    Ok(())
}
