use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
};
use futures::TryStreamExt;
use ingestion_pipeline::{install_archive, IngestCommand, IngestRequest};
use serde::Deserialize;
use tokio_util::io::StreamReader;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

/// Every upload lands under this root, whichever verb was used.
const FILES_ROOT: &str = "/files";

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    install: Option<String>,
}

impl UploadParams {
    fn install(&self) -> bool {
        self.install.as_deref() == Some("true")
    }
}

/// `POST /{command}/{*path}`: stores the body at `path`, or unpacks it there when it is a tar.
pub async fn upload(
    State(state): State<ApiState>,
    Path((command, path)): Path<(String, String)>,
    Query(params): Query<UploadParams>,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let command = IngestCommand::parse(&command)
        .ok_or_else(|| ApiError::NotImplemented(format!("unsupported command {command}")))?;
    let (parent_dir, name) = split_target(&path)?;

    info!(
        %command,
        %parent_dir,
        %name,
        install = params.install(),
        "Received upload"
    );

    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));

    if params.install() {
        install_archive(&state.pipeline, command, &parent_dir, &name, reader)
            .await
            .map_err(ApiError::reported)?;
    } else {
        state
            .pipeline
            .ingest(
                IngestRequest::upload(command, parent_dir, name),
                Box::new(reader),
            )
            .await
            .map_err(ApiError::reported)?;
    }

    Ok(StatusCode::OK)
}

/// Splits the wildcard path into the parent directory under `/files` and the file name.
fn split_target(path: &str) -> Result<(String, String), ApiError> {
    let (dirs, name) = path.rsplit_once('/').unwrap_or(("", path));
    if name.is_empty() {
        return Err(ApiError::ValidationError(format!(
            "missing file name in {path}"
        )));
    }

    let dirs = dirs.trim_matches('/');
    let parent_dir = if dirs.is_empty() {
        FILES_ROOT.to_string()
    } else {
        format!("{FILES_ROOT}/{dirs}")
    };

    Ok((parent_dir, name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_target_roots_everything_under_files() {
        assert_eq!(
            split_target("a/b/c.txt").expect("valid"),
            ("/files/a/b".to_string(), "c.txt".to_string())
        );
        assert_eq!(
            split_target("c.txt").expect("valid"),
            ("/files".to_string(), "c.txt".to_string())
        );
    }

    #[test]
    fn split_target_requires_a_name() {
        assert!(matches!(
            split_target("a/b/"),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn install_flag_must_be_literal_true() {
        let on = UploadParams {
            install: Some("true".into()),
        };
        let off = UploadParams {
            install: Some("1".into()),
        };
        assert!(on.install());
        assert!(!off.install());
        assert!(!UploadParams::default().install());
    }
}
