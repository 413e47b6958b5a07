use axum::http::StatusCode;

/// Answers as long as the process serves requests.
pub async fn live() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
