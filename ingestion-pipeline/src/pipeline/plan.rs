use std::path::Path;

use common::utils::file_kind::FileKind;

use super::services::ThumbnailVariant;

pub const EXTRACT_SUFFIX: &str = "--extract.txt";
pub const THUMBNAIL_SUFFIX: &str = "--thumbnail.png";
pub const LABELS_SUFFIX: &str = "--labels.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    ExtractText,
    Thumbnail(ThumbnailVariant),
    Labels,
}

impl Derivation {
    /// Verb phrase used in error messages and logs.
    pub fn stage(self) -> &'static str {
        match self {
            Self::ExtractText => "extract text",
            Self::Thumbnail(_) => "make thumbnail",
            Self::Labels => "detect labels",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::ExtractText => EXTRACT_SUFFIX,
            Self::Thumbnail(_) => THUMBNAIL_SUFFIX,
            Self::Labels => LABELS_SUFFIX,
        }
    }
}

/// What happens to the parent ingestion when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Abort,
    LogAndContinue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationStep {
    pub derivation: Derivation,
    /// Name of the child artifact, written next to its source.
    pub artifact_name: String,
    pub cascade: bool,
    pub on_failure: FailurePolicy,
}

impl DerivationStep {
    fn new(source: &str, derivation: Derivation, cascade: bool, on_failure: FailurePolicy) -> Self {
        Self {
            derivation,
            artifact_name: format!("{source}{}", derivation.suffix()),
            cascade,
            on_failure,
        }
    }
}

/// Everything that follows once an artifact is stored, decided up front from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPlan {
    pub kind: FileKind,
    pub steps: Vec<DerivationStep>,
    /// Whether the stored bytes go into the full-text index.
    pub index_text: bool,
}

impl DerivationPlan {
    pub fn for_artifact(name: &str, cascade: bool, labels_enabled: bool) -> Self {
        let kind = FileKind::classify(name);
        let mut steps = Vec::new();

        if !cascade {
            return Self {
                kind,
                steps,
                index_text: false,
            };
        }

        match kind {
            FileKind::Document => {
                steps.push(DerivationStep::new(
                    name,
                    Derivation::ExtractText,
                    true,
                    FailurePolicy::Abort,
                ));
                if has_pdf_extension(name) {
                    steps.push(DerivationStep::new(
                        name,
                        Derivation::Thumbnail(ThumbnailVariant::Pdf),
                        false,
                        FailurePolicy::Abort,
                    ));
                }
            }
            FileKind::Video => steps.push(DerivationStep::new(
                name,
                Derivation::Thumbnail(ThumbnailVariant::Video),
                false,
                FailurePolicy::Abort,
            )),
            FileKind::Image => {
                steps.push(DerivationStep::new(
                    name,
                    Derivation::Thumbnail(ThumbnailVariant::Image),
                    false,
                    FailurePolicy::Abort,
                ));
                if labels_enabled {
                    steps.push(DerivationStep::new(
                        name,
                        Derivation::Labels,
                        cascade,
                        FailurePolicy::LogAndContinue,
                    ));
                }
            }
            FileKind::PlainText | FileKind::Opaque => {}
        }

        Self {
            kind,
            steps,
            index_text: kind == FileKind::PlainText,
        }
    }
}

fn has_pdf_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
