use std::path::Path;

use common::error::AppError;
use futures::TryStreamExt;
use reqwest::{header::ACCEPT, Body, StatusCode};
use tokio::fs::File;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::pipeline::ArtifactReader;

const STAGE: &str = "extract text";

/// Client for an Apache Tika compatible `PUT` endpoint that answers with plain text.
#[derive(Clone)]
pub struct TextExtractor {
    http: reqwest::Client,
    endpoint: String,
}

impl TextExtractor {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Streams `source` to the extractor and hands back the response body as a reader.
    pub async fn extract(&self, source: &Path, name: &str) -> Result<ArtifactReader, AppError> {
        let file = File::open(source).await?;
        let body = Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .http
            .put(&self.endpoint)
            .header(ACCEPT, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|err| AppError::derivation(STAGE, name, format!("request failed: {err}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::derivation(
                STAGE,
                name,
                format!("extractor answered {status}"),
            ));
        }

        let stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        Ok(Box::new(StreamReader::new(stream)))
    }
}
