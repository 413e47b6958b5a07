use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::AppError;
use thiserror::Error;

/// Errors surfaced to HTTP clients as plain text.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("{0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl ApiError {
    /// Converts an error that was already logged where it was detected.
    pub fn reported(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Validation(msg) => Self::ValidationError(msg),
            other => Self::InternalError(other.to_string()),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        if !matches!(err, AppError::NotFound(_) | AppError::Validation(_)) {
            tracing::error!(error = %err, "request failed");
        }
        Self::reported(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        };

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use tracing_test::traced_test;

    #[test]
    fn app_errors_map_to_api_errors() {
        let api_error = ApiError::from(AppError::NotFound("no such file".to_string()));
        assert!(matches!(api_error, ApiError::NotFound(msg) if msg == "no such file"));

        let api_error = ApiError::from(AppError::Validation("bad name".to_string()));
        assert!(matches!(api_error, ApiError::ValidationError(msg) if msg == "bad name"));

        let api_error = ApiError::from(AppError::derivation(
            "extract text",
            "/files/a.doc",
            "extractor answered 500",
        ));
        assert!(
            matches!(api_error, ApiError::InternalError(msg) if msg == "Could not extract text for /files/a.doc: extractor answered 500")
        );
    }

    #[test]
    #[traced_test]
    fn reported_errors_are_not_logged_again() {
        let api_error = ApiError::reported(AppError::derivation(
            "make thumbnail",
            "/files/clip.mp4",
            "convert exited with 1",
        ));
        assert!(matches!(api_error, ApiError::InternalError(_)));
        assert!(!logs_contain("request failed"));
    }

    #[test]
    #[traced_test]
    fn unreported_errors_are_logged_on_conversion() {
        let api_error = ApiError::from(AppError::ArchiveFormat("bad checksum".into()));
        assert!(matches!(api_error, ApiError::InternalError(_)));
        assert!(logs_contain("request failed"));
    }

    #[test]
    fn responses_carry_status_and_plain_text() {
        let cases = [
            (
                ApiError::InternalError("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                ApiError::NotImplemented("x".into()),
                StatusCode::NOT_IMPLEMENTED,
            ),
        ];

        for (error, expected) in cases {
            let response = error.into_response();
            assert_eq!(response.status(), expected);
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            assert!(content_type.starts_with("text/plain"));
        }
    }
}
