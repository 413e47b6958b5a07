use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Could not write artifact {path}: {source}")]
    StorageWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not {stage} for {path}: {message}")]
    Derivation {
        stage: String,
        path: String,
        message: String,
    },
    #[error("Index write error: {0}")]
    IndexWrite(String),
    #[error("Malformed archive: {0}")]
    ArchiveFormat(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn derivation(
        stage: impl Into<String>,
        path: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::Derivation {
            stage: stage.into(),
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn storage_write(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::StorageWrite {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_error_names_stage_and_path() {
        let err = AppError::derivation("make thumbnail", "/files/a.png", "convert exited with 1");
        assert_eq!(
            err.to_string(),
            "Could not make thumbnail for /files/a.png: convert exited with 1"
        );
    }

    #[test]
    fn storage_write_error_keeps_source() {
        let err = AppError::storage_write(
            "/files/a.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/files/a.txt"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
