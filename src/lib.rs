pub mod config;
pub mod deploy;
pub mod error;
pub mod extract;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod summary;
pub mod table;
pub mod transform;

pub use config::PipelineConfig;
pub use deploy::{deploy_etl_results, HtmlGenerator, ObjectStore, S3Deployer};
pub use error::{EtlError, Result};
pub use extract::{extract_from_source, DataExtractor, SourceType};
pub use load::{create_data_summary, save_to_destination, DataLoader, OutputFormat};
pub use pipeline::{run_etl, EtlPipeline};
pub use summary::RunSummary;
pub use table::Table;
pub use transform::{apply_business_rules, normalise_column_names, DataTransformer};
