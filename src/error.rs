use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("transformation failed: {0}")]
    Transformation(String),

    #[error("load failed: {0}")]
    Load(String),

    #[error("deployment failed: {0}")]
    Deploy(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;
