use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{EtlError, Result};
use crate::extract::SourceType;
use crate::load::OutputFormat;

pub const DEFAULT_AWS_REGION: &str = "eu-west-2";

/// Configuration for one pipeline run.
///
/// Every recognized option is an explicit field with a documented default;
/// validation happens once at construction so the phases can rely on a
/// well-formed config.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub source_type: SourceType,
    pub output_format: OutputFormat,
    pub apply_transforms: bool,
    pub filters: Option<BTreeMap<String, Value>>,
    pub enable_deployment: bool,
    pub s3_bucket_name: Option<String>,
    pub project_name: Option<String>,
    pub aws_region: String,
}

impl PipelineConfig {
    pub fn new(source_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            output_path: output_path.into(),
            source_type: SourceType::Csv,
            output_format: OutputFormat::Csv,
            apply_transforms: true,
            filters: None,
            enable_deployment: false,
            s3_bucket_name: None,
            project_name: None,
            aws_region: DEFAULT_AWS_REGION.to_string(),
        }
    }

    pub fn source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = output_format;
        self
    }

    pub fn apply_transforms(mut self, apply: bool) -> Self {
        self.apply_transforms = apply;
        self
    }

    /// An empty criteria map means no filtering, same as `None`.
    pub fn filters(mut self, filters: BTreeMap<String, Value>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn deployment(mut self, bucket: impl Into<String>, region: impl Into<String>) -> Self {
        self.enable_deployment = true;
        self.s3_bucket_name = Some(bucket.into());
        self.aws_region = region.into();
        self
    }

    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// Checks cross-field consistency. Called by the pipeline before the
    /// first phase runs.
    pub fn validate(&self) -> Result<()> {
        if self.enable_deployment && self.s3_bucket_name.is_none() {
            return Err(EtlError::Config(
                "deployment enabled but no bucket name supplied".to_string(),
            ));
        }
        if self.aws_region.trim().is_empty() {
            return Err(EtlError::Config("aws_region must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Optional CLI defaults loaded from `etl.toml` in the working directory.
#[derive(Debug, Default, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub deployment: DeploymentDefaults,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeploymentDefaults {
    pub bucket: Option<String>,
    pub project: Option<String>,
    pub region: Option<String>,
}

impl Defaults {
    pub fn load() -> Result<Self> {
        let config_path = "etl.toml";
        if !std::path::Path::new(config_path).exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(config_path).map_err(|e| {
            EtlError::Config(format!("failed to read config file '{config_path}': {e}"))
        })?;
        toml::from_str(&content)
            .map_err(|e| EtlError::Config(format!("invalid config file '{config_path}': {e}")))
    }
}
