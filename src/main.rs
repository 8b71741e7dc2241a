use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use tabular_etl::config::{Defaults, PipelineConfig, DEFAULT_AWS_REGION};
use tabular_etl::extract::{extract_from_source, SourceType};
use tabular_etl::load::OutputFormat;
use tabular_etl::logging;
use tabular_etl::pipeline::EtlPipeline;

#[derive(Parser)]
#[command(name = "tabular_etl")]
#[command(about = "Batch ETL pipeline for tabular data")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full extract-transform-load pipeline
    Run {
        /// Path to the source data file
        #[arg(long)]
        source: PathBuf,
        /// Path for the output data file
        #[arg(long)]
        output: PathBuf,
        /// Source format: csv, xlsx or json
        #[arg(long, default_value = "csv")]
        source_type: SourceType,
        /// Output format: csv, parquet or json
        #[arg(long, default_value = "csv")]
        output_format: OutputFormat,
        /// Skip column normalisation and business rules
        #[arg(long)]
        no_transforms: bool,
        /// Row filter as column=value (repeatable)
        #[arg(long = "filter", value_name = "COL=VALUE")]
        filters: Vec<String>,
        /// Deploy the results to object storage as a static website
        #[arg(long)]
        deploy: bool,
        /// Bucket name for deployment
        #[arg(long)]
        bucket: Option<String>,
        /// Project name for the website title and key prefix
        #[arg(long)]
        project: Option<String>,
        /// Region for the bucket website URL
        #[arg(long)]
        region: Option<String>,
    },
    /// Extract a source file and print its shape without running the pipeline
    Inspect {
        /// Path to the source data file
        #[arg(long)]
        source: PathBuf,
        /// Source format: csv, xlsx or json
        #[arg(long, default_value = "csv")]
        source_type: SourceType,
    },
}

fn parse_filters(raw: &[String]) -> Result<Option<BTreeMap<String, Value>>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut filters = BTreeMap::new();
    for entry in raw {
        let (column, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("invalid filter '{entry}', expected COL=VALUE"))?;
        filters.insert(column.trim().to_string(), Value::String(value.to_string()));
    }
    Ok(Some(filters))
}

fn main() {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            output,
            source_type,
            output_format,
            no_transforms,
            filters,
            deploy,
            bucket,
            project,
            region,
        } => {
            let filters = match parse_filters(&filters) {
                Ok(filters) => filters,
                Err(message) => {
                    eprintln!("⚠️  {message}");
                    std::process::exit(2);
                }
            };

            let defaults = Defaults::load().unwrap_or_default();
            let mut config = PipelineConfig::new(source, output)
                .source_type(source_type)
                .output_format(output_format)
                .apply_transforms(!no_transforms);
            if let Some(filters) = filters {
                config = config.filters(filters);
            }
            config.enable_deployment = deploy;
            config.s3_bucket_name = bucket.or(defaults.deployment.bucket);
            config.project_name = project.or(defaults.deployment.project);
            config.aws_region = region
                .or(defaults.deployment.region)
                .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());

            println!("🔄 Running ETL pipeline...");
            let mut pipeline = EtlPipeline::new();
            let success = pipeline.run_pipeline(&config);
            let summary = pipeline.pipeline_summary();

            println!("\n📊 Pipeline Results (run {}):", summary.run_id);
            if let Some(extract) = &summary.extract {
                println!(
                    "   Extracted: {} rows, {} columns from {}",
                    extract.rows_extracted, extract.columns_extracted, extract.source_path
                );
            }
            if let Some(transform) = &summary.transform {
                println!(
                    "   Transformations: {}",
                    transform.transformations_applied.join(", ")
                );
            }
            if let Some(load) = &summary.load {
                println!("   Load status: {:?}", load.status);
                if let Some(path) = &load.output_path {
                    println!("   Output file: {path}");
                }
                if let Some(path) = &load.summary_path {
                    println!("   Summary file: {path}");
                }
            }
            if let Some(deploy) = &summary.deploy {
                match &deploy.website_url {
                    Some(url) => println!("   Website: {url}"),
                    None => println!("   ⚠️  Deployment failed (pipeline still succeeded)"),
                }
            }
            if let Some(error) = &summary.error {
                println!("   ❌ Error: {error}");
            }

            if success {
                println!("\n✅ ETL pipeline completed successfully");
            } else {
                println!("\n❌ ETL pipeline failed");
                std::process::exit(1);
            }
        }
        Commands::Inspect {
            source,
            source_type,
        } => {
            info!(path = %source.display(), "inspecting source");
            match extract_from_source(&source, source_type) {
                Ok(table) => {
                    println!(
                        "📋 {}: {} rows, {} columns",
                        source.display(),
                        table.row_count(),
                        table.column_count()
                    );
                    for (index, column) in table.columns().iter().enumerate() {
                        let column_type = table.column_type(index);
                        println!("   - {column} ({column_type:?})");
                    }
                }
                Err(e) => {
                    eprintln!("❌ Inspection failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
