#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod archive;
pub mod pipeline;
pub mod utils;

pub use archive::install_archive;
pub use pipeline::{
    ArtifactReader, DerivationServices, IngestCommand, IngestRequest, IngestionConfig,
    IngestionPipeline, IngestionTuning,
};
