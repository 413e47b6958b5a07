use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use common::utils::config::{get_config, AppConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    log_config(&config);

    let api_state = ApiState::new(&config).await?;
    let app = build_app(api_state);

    let serve_address = format!("0.0.0.0:{}", config.http_port);
    info!("Starting server listening on {serve_address}");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn build_app(api_state: ApiState) -> Router {
    api_routes().with_state(api_state)
}

/// Logs the effective configuration; credentials are never printed.
fn log_config(config: &AppConfig) {
    info!(
        surrealdb_address = %config.surrealdb_address,
        surrealdb_namespace = %config.surrealdb_namespace,
        surrealdb_database = %config.surrealdb_database,
        data_dir = %config.data_dir,
        http_port = config.http_port,
        doc_extractor_url = %config.doc_extractor_url,
        thumbnail_command = %config.thumbnail_command,
        labels = config.labels_configured(),
        label_model = %config.label_model,
        derivation_timeout_secs = config.derivation_timeout_secs,
        index_chunk_bytes = config.index_chunk_bytes,
        "Configuration loaded"
    );

    if config.label_service_enabled && !config.labels_configured() {
        warn!("label_service_enabled is set but no openai_api_key is configured; image labels are off");
    }
}
