use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::{ArtifactStore, WrittenArtifact},
    },
};
use tracing::error;

use super::{
    config::IngestionConfig, plan::DerivationPlan, request::IngestRequest,
    services::DerivationServices,
};

pub struct PipelineContext<'a> {
    pub request: &'a IngestRequest,
    /// `parent_dir/name`, used in logs and error messages.
    pub artifact: String,
    pub db: &'a SurrealDbClient,
    pub store: &'a ArtifactStore,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn DerivationServices,
    pub written: Option<WrittenArtifact>,
    pub plan: Option<DerivationPlan>,
    pub indexed_parts: u32,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        request: &'a IngestRequest,
        db: &'a SurrealDbClient,
        store: &'a ArtifactStore,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn DerivationServices,
    ) -> Self {
        Self {
            artifact: request.display_path(),
            request,
            db,
            store,
            pipeline_config,
            services,
            written: None,
            plan: None,
            indexed_parts: 0,
        }
    }

    pub fn written(&self) -> Result<&WrittenArtifact, AppError> {
        self.written
            .as_ref()
            .ok_or_else(|| AppError::InternalError("artifact expected to be written".into()))
    }

    pub fn plan(&self) -> Result<&DerivationPlan, AppError> {
        self.plan
            .as_ref()
            .ok_or_else(|| AppError::InternalError("derivation plan expected to be available".into()))
    }

    pub fn abort(&self, err: AppError) -> AppError {
        error!(
            artifact = %self.artifact,
            original = %self.request.original_name,
            error = %err,
            "ingestion aborted"
        );
        err
    }
}
