use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Ready once the database answers and the data directory is reachable; 503 otherwise.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let db_check = state
        .db
        .query("RETURN true")
        .await
        .and_then(|response| response.check())
        .map(|_| ())
        .map_err(|err| err.to_string());
    let storage_check = match tokio::fs::metadata(state.data_dir()).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err("data directory is not a directory".to_string()),
        Err(err) => Err(err.to_string()),
    };

    let label = |check: &Result<(), String>| if check.is_ok() { "ok" } else { "fail" };
    let checks = json!({ "db": label(&db_check), "storage": label(&storage_check) });

    match (db_check, storage_check) {
        (Ok(()), Ok(())) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "checks": checks })),
        ),
        (Err(reason), _) | (_, Err(reason)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "checks": checks, "reason": reason })),
        ),
    }
}
