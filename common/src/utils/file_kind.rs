use std::fmt;

/// Coarse artifact classification that decides which derivations run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Office documents and PDFs, handed to text extraction.
    Document,
    Video,
    Image,
    /// Content the full-text index can take as-is.
    PlainText,
    /// Stored only.
    Opaque,
}

const DOCUMENT_SUFFIXES: &[&str] = &[
    ".doc", ".ppt", ".xls", ".docx", ".pptx", ".xlsx", ".pdf", ".one",
];
const VIDEO_SUFFIXES: &[&str] = &[".mp4"];
const IMAGE_SUFFIXES: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];
const PLAIN_TEXT_SUFFIXES: &[&str] = &[".txt", ".json", ".html"];

impl FileKind {
    /// Classifies by case-sensitive suffix.
    pub fn classify(name: &str) -> Self {
        let has_suffix = |suffixes: &[&str]| suffixes.iter().any(|s| name.ends_with(s));

        if has_suffix(DOCUMENT_SUFFIXES) {
            Self::Document
        } else if has_suffix(VIDEO_SUFFIXES) {
            Self::Video
        } else if has_suffix(IMAGE_SUFFIXES) {
            Self::Image
        } else if has_suffix(PLAIN_TEXT_SUFFIXES) {
            Self::PlainText
        } else {
            Self::Opaque
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Video => "video",
            Self::Image => "image",
            Self::PlainText => "plain_text",
            Self::Opaque => "opaque",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
