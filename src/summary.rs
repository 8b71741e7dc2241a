use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel recorded in the transform summary when transforms are disabled.
pub const TRANSFORMS_SKIPPED: &str = "None - transformations skipped";

/// Accumulated record of one pipeline execution.
///
/// One optional entry per phase, appended in phase order and never mutated
/// once set. Serializes with absent phases omitted, so a failed run shows
/// exactly how far it got.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeploySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSummary {
    pub source_path: String,
    pub rows_extracted: usize,
    pub columns_extracted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSummary {
    pub transformations_applied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_columns: Option<usize>,
}

impl TransformSummary {
    /// The entry recorded when `apply_transforms` is off: no collaborator was
    /// invoked, so no row/column counts are reported.
    pub fn skipped() -> Self {
        Self {
            transformations_applied: vec![TRANSFORMS_SKIPPED.to_string()],
            final_rows: None,
            final_columns: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSummary {
    pub status: PhaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_rows: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySummary {
    pub status: PhaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Success,
    Failed,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            extract: None,
            transform: None,
            load: None,
            deploy: None,
            error: None,
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
