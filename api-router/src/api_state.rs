use std::sync::Arc;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, store::ArtifactStore},
    utils::config::AppConfig,
};
use ingestion_pipeline::IngestionPipeline;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub pipeline: Arc<IngestionPipeline>,
}

impl ApiState {
    /// Connects to SurrealDB, defines the search schema and prepares the data directory.
    pub async fn new(config: &AppConfig) -> Result<Self, AppError> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        surreal_db_client.ensure_initialized().await?;

        let store = ArtifactStore::new(config).await?;
        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&surreal_db_client),
            store,
            config,
        ));

        Ok(Self {
            db: surreal_db_client,
            config: config.clone(),
            pipeline,
        })
    }

    /// Data directory the static file route serves from.
    pub fn data_dir(&self) -> &std::path::Path {
        self.pipeline.store().base_path()
    }
}
