use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::deploy::{deploy_etl_results, ObjectStore, S3Gateway};
use crate::error::Result;
use crate::extract::DataExtractor;
use crate::load::{derive_summary_path, DataLoader};
use crate::summary::{
    DeploySummary, ExtractSummary, LoadSummary, PhaseStatus, RunSummary, TransformSummary,
};
use crate::table::Table;
use crate::transform::DataTransformer;

/// Default project name when deployment is enabled without one.
const DEFAULT_PROJECT_NAME: &str = "ETL Results";

/// Drives the four pipeline phases in sequence:
///
/// ```text
/// Extract -> Transform (optional) -> Load -> Deploy (optional, best-effort)
/// ```
///
/// A failure in Extract or Transform aborts the run through the single
/// containment point in [`run_pipeline`](EtlPipeline::run_pipeline); a failed
/// Load is signalled by boolean and ends the run cleanly before Deploy; a
/// failed Deploy is recorded but never flips the overall result.
pub struct EtlPipeline {
    extractor: DataExtractor,
    loader: DataLoader,
    object_store: Option<Arc<dyn ObjectStore>>,
    summary: RunSummary,
}

impl EtlPipeline {
    pub fn new() -> Self {
        Self {
            extractor: DataExtractor::new(),
            loader: DataLoader::new(),
            object_store: None,
            summary: RunSummary::new(),
        }
    }

    /// Overrides the object store used by the deploy phase. Without this the
    /// pipeline connects to the gateway configured in the environment.
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Runs the complete pipeline. Returns `true` only when Extract and
    /// Transform complete and Load reports success; no error ever escapes to
    /// the caller — failures are recorded in the run summary instead.
    pub fn run_pipeline(&mut self, config: &PipelineConfig) -> bool {
        self.summary = RunSummary::new();
        info!(run_id = %self.summary.run_id, "Starting ETL pipeline");

        match self.run_phases(config) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("ETL pipeline failed: {e}");
                self.summary.error = Some(e.to_string());
                false
            }
        }
    }

    /// Summary of the most recent run (or the phases it completed before
    /// failing). Returns a defensive copy.
    pub fn pipeline_summary(&self) -> RunSummary {
        self.summary.clone()
    }

    fn run_phases(&mut self, config: &PipelineConfig) -> Result<bool> {
        config.validate()?;

        // Phase 1: Extract
        info!("Phase 1: Extract");
        let table = self
            .extractor
            .extract(&config.source_path, config.source_type)?;
        self.summary.extract = Some(ExtractSummary {
            source_path: config.source_path.display().to_string(),
            rows_extracted: table.row_count(),
            columns_extracted: table.column_count(),
        });

        // Phase 2: Transform
        info!("Phase 2: Transform");
        let table = self.transform_phase(config, table)?;

        // Phase 3: Load
        info!("Phase 3: Load");
        let success = self
            .loader
            .save(&table, &config.output_path, config.output_format);
        if !success {
            self.summary.load = Some(LoadSummary {
                status: PhaseStatus::Failed,
                output_path: None,
                summary_path: None,
                final_rows: None,
            });
            error!("ETL pipeline failed during load phase");
            return Ok(false);
        }

        let summary_path = derive_summary_path(&config.output_path, config.output_format);
        self.loader.create_summary(&table, &summary_path)?;
        self.summary.load = Some(LoadSummary {
            status: PhaseStatus::Success,
            output_path: Some(config.output_path.display().to_string()),
            summary_path: Some(summary_path.display().to_string()),
            final_rows: Some(table.row_count()),
        });

        // Phase 4: Deploy (best-effort; never affects the overall result)
        if config.enable_deployment {
            if let Some(bucket) = &config.s3_bucket_name {
                info!("Phase 4: Deploy");
                self.deploy_phase(config, &table, bucket);
            }
        }

        info!("ETL pipeline completed successfully");
        Ok(true)
    }

    fn transform_phase(&mut self, config: &PipelineConfig, table: Table) -> Result<Table> {
        if !config.apply_transforms {
            self.summary.transform = Some(TransformSummary::skipped());
            return Ok(table);
        }

        // Fresh transformer per run so the applied list reports this run only
        let mut transformer = DataTransformer::new();
        let table = transformer.normalise_column_names(table)?;
        let mut table = transformer.apply_business_rules(table)?;
        // An empty criteria map is treated as no filtering
        if let Some(filters) = config.filters.as_ref().filter(|f| !f.is_empty()) {
            table = transformer.filter_data(table, filters)?;
        }

        self.summary.transform = Some(TransformSummary {
            transformations_applied: transformer.transformation_summary(),
            final_rows: Some(table.row_count()),
            final_columns: Some(table.column_count()),
        });
        Ok(table)
    }

    fn deploy_phase(&mut self, config: &PipelineConfig, table: &Table, bucket: &str) {
        let store = match &self.object_store {
            Some(store) => Some(store.clone()),
            None => match S3Gateway::from_env() {
                Ok(gateway) => Some(Arc::new(gateway) as Arc<dyn ObjectStore>),
                Err(e) => {
                    warn!("object storage gateway unavailable: {e}");
                    None
                }
            },
        };

        let project = config
            .project_name
            .as_deref()
            .unwrap_or(DEFAULT_PROJECT_NAME);
        let snapshot = self.summary.clone();
        let url = store.and_then(|store| {
            deploy_etl_results(store, table, &snapshot, bucket, project, &config.aws_region)
        });

        match url {
            Some(website_url) => {
                info!(url = %website_url, "Deployment successful");
                self.summary.deploy = Some(DeploySummary {
                    status: PhaseStatus::Success,
                    website_url: Some(website_url),
                });
            }
            None => {
                warn!("Deployment failed, but pipeline will continue");
                self.summary.deploy = Some(DeploySummary {
                    status: PhaseStatus::Failed,
                    website_url: None,
                });
            }
        }
    }
}

impl Default for EtlPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function for one-shot pipeline execution.
pub fn run_etl(config: &PipelineConfig) -> bool {
    EtlPipeline::new().run_pipeline(config)
}
