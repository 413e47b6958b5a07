use std::path::Path;

use async_trait::async_trait;
use common::{error::AppError, utils::config::AppConfig};
use serde_json::Value;
use tokio::io::AsyncRead;

use crate::utils::{
    image_labels::ImageLabeler, text_extraction::TextExtractor, thumbnail::ThumbnailRenderer,
};

/// Byte source for a stored or derived artifact.
pub type ArtifactReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailVariant {
    Image,
    Video,
    Pdf,
}

/// External collaborators that turn a stored artifact into derived bytes.
#[async_trait]
pub trait DerivationServices: Send + Sync {
    async fn extract_text(&self, source: &Path, name: &str) -> Result<ArtifactReader, AppError>;

    async fn make_thumbnail(
        &self,
        source: &Path,
        variant: ThumbnailVariant,
    ) -> Result<ArtifactReader, AppError>;

    async fn detect_labels(&self, source: &Path) -> Result<Value, AppError>;

    fn labels_enabled(&self) -> bool;
}

pub struct DefaultDerivationServices {
    extractor: TextExtractor,
    thumbnails: ThumbnailRenderer,
    labeler: Option<ImageLabeler>,
}

impl DefaultDerivationServices {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            extractor: TextExtractor::new(reqwest::Client::new(), &config.doc_extractor_url),
            thumbnails: ThumbnailRenderer::new(&config.thumbnail_command),
            labeler: ImageLabeler::from_config(config),
        }
    }
}

#[async_trait]
impl DerivationServices for DefaultDerivationServices {
    async fn extract_text(&self, source: &Path, name: &str) -> Result<ArtifactReader, AppError> {
        self.extractor.extract(source, name).await
    }

    async fn make_thumbnail(
        &self,
        source: &Path,
        variant: ThumbnailVariant,
    ) -> Result<ArtifactReader, AppError> {
        self.thumbnails.render(source, variant).await
    }

    async fn detect_labels(&self, source: &Path) -> Result<Value, AppError> {
        match &self.labeler {
            Some(labeler) => labeler.detect(source).await,
            None => Err(AppError::derivation(
                "detect labels",
                source.display().to_string(),
                "label service is not configured",
            )),
        }
    }

    fn labels_enabled(&self) -> bool {
        self.labeler.is_some()
    }
}
