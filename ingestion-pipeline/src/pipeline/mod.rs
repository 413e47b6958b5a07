mod config;
mod context;
mod plan;
mod request;
mod services;
mod stages;
mod state;

pub use config::{IngestionConfig, IngestionTuning};
pub use plan::{
    Derivation, DerivationPlan, DerivationStep, FailurePolicy, EXTRACT_SUFFIX, LABELS_SUFFIX,
    THUMBNAIL_SUFFIX,
};
pub use request::{IngestCommand, IngestRequest};
#[allow(clippy::module_name_repetitions)]
pub use services::{ArtifactReader, DefaultDerivationServices, DerivationServices, ThumbnailVariant};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, store::ArtifactStore},
    utils::config::AppConfig,
};
use futures::future::BoxFuture;
use tracing::{debug, info};

use self::{
    context::PipelineContext,
    stages::{derive, index_text, store_artifact},
    state::ready,
};

/// Stores uploads and everything derived from them, indexing plain text along the way.
#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    store: ArtifactStore,
    pipeline_config: IngestionConfig,
    services: Arc<dyn DerivationServices>,
}

impl IngestionPipeline {
    pub fn new(db: Arc<SurrealDbClient>, store: ArtifactStore, config: &AppConfig) -> Self {
        Self::with_services(
            db,
            store,
            IngestionConfig::from_app_config(config),
            Arc::new(DefaultDerivationServices::new(config)),
        )
    }

    pub fn with_services(
        db: Arc<SurrealDbClient>,
        store: ArtifactStore,
        pipeline_config: IngestionConfig,
        services: Arc<dyn DerivationServices>,
    ) -> Self {
        Self {
            db,
            store,
            pipeline_config,
            services,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Ingests one artifact and, when it cascades, everything derived from it.
    ///
    /// Returns the first fatal error of the whole derivation tree. Bytes written before
    /// the failure stay in place.
    #[tracing::instrument(
        skip_all,
        fields(
            command = %request.command,
            artifact = %request.display_path(),
            original = %request.original_name
        )
    )]
    pub async fn ingest(
        &self,
        request: IngestRequest,
        reader: ArtifactReader,
    ) -> Result<(), AppError> {
        let started = Instant::now();
        self.ingest_artifact(request, reader).await?;

        info!(
            total_ms = Self::duration_millis(started.elapsed()),
            "ingestion finished"
        );
        Ok(())
    }

    /// Boxed so derivations can feed their output back through the same pipeline.
    pub(crate) fn ingest_artifact(
        &self,
        request: IngestRequest,
        reader: ArtifactReader,
    ) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(async move {
            let mut ctx = PipelineContext::new(
                &request,
                self.db.as_ref(),
                &self.store,
                &self.pipeline_config,
                self.services.as_ref(),
            );

            let machine = ready();
            let machine = store_artifact(machine, &mut ctx, reader)
                .await
                .map_err(|err| ctx.abort(err))?;
            let machine = derive(machine, &mut ctx, self).await?;
            let _machine = index_text(machine, &mut ctx)
                .await
                .map_err(|err| ctx.abort(err))?;

            debug!(
                artifact = %ctx.artifact,
                indexed_parts = ctx.indexed_parts,
                "artifact ingested"
            );
            Ok(())
        })
    }
}
