use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    listing::{browse, browse_root, redirect_to_root},
    liveness::live,
    readiness::ready,
    search::search_files,
    upload::upload,
};

pub mod api_state;
pub mod error;
mod routes;

/// Upload, search, browsing and health endpoints.
///
/// `GET /files/..` lists directories and serves stored artifacts from the data directory; the
/// same path pattern takes uploads via `POST`.
pub fn api_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let files = Router::new()
        .route("/search", get(search_files))
        .route("/files", get(redirect_to_root))
        .route("/files/", get(browse_root))
        .route(
            "/{command}/{*path}",
            post(upload)
                .layer(DefaultBodyLimit::disable())
                .get(browse),
        );

    public.merge(files)
}
