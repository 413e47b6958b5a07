use std::fmt;

use common::storage::store::{artifact_display, WriteMode};

/// Ingestion verb carried by an upload and recorded on every indexed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestCommand {
    /// Overwrite the destination.
    Files,
    /// Append to the destination.
    Append,
}

impl IngestCommand {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "files" => Some(Self::Files),
            "append" => Some(Self::Append),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Append => "append",
        }
    }

    pub fn write_mode(self) -> WriteMode {
        match self {
            Self::Files => WriteMode::Truncate,
            Self::Append => WriteMode::Append,
        }
    }
}

impl fmt::Display for IngestCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call into the pipeline: where the bytes go, which root artifact they belong to,
/// and whether further derivation is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub command: IngestCommand,
    pub parent_dir: String,
    pub name: String,
    pub original_parent_dir: String,
    pub original_name: String,
    pub cascade: bool,
}

impl IngestRequest {
    /// A root upload: it is its own original and cascades.
    pub fn upload(
        command: IngestCommand,
        parent_dir: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let parent_dir = parent_dir.into();
        let name = name.into();
        Self {
            command,
            original_parent_dir: parent_dir.clone(),
            original_name: name.clone(),
            parent_dir,
            name,
            cascade: true,
        }
    }

    /// A derived artifact written next to this one, keeping the same original.
    pub fn derived(&self, name: String, cascade: bool) -> Self {
        Self {
            command: self.command,
            parent_dir: self.parent_dir.clone(),
            name,
            original_parent_dir: self.original_parent_dir.clone(),
            original_name: self.original_name.clone(),
            cascade,
        }
    }

    pub fn display_path(&self) -> String {
        artifact_display(&self.parent_dir, &self.name)
    }

    /// Directory as stored on index rows, always with a trailing slash.
    pub fn index_path(&self) -> String {
        with_trailing_slash(&self.parent_dir)
    }

    pub fn original_index_path(&self) -> String {
        with_trailing_slash(&self.original_parent_dir)
    }
}

fn with_trailing_slash(dir: &str) -> String {
    format!("{}/", dir.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_only_known_verbs() {
        assert_eq!(IngestCommand::parse("files"), Some(IngestCommand::Files));
        assert_eq!(IngestCommand::parse("append"), Some(IngestCommand::Append));
        assert_eq!(IngestCommand::parse("delete"), None);
        assert_eq!(IngestCommand::Append.write_mode(), WriteMode::Append);
    }

    #[test]
    fn derived_requests_keep_the_original() {
        let root = IngestRequest::upload(IngestCommand::Files, "/files/docs", "report.pdf");
        let child = root.derived("report.pdf--extract.txt".into(), true);

        assert_eq!(child.parent_dir, "/files/docs");
        assert_eq!(child.original_name, "report.pdf");
        assert_eq!(child.original_index_path(), "/files/docs/");
        assert_eq!(child.display_path(), "/files/docs/report.pdf--extract.txt");
    }

    #[test]
    fn index_path_has_exactly_one_trailing_slash() {
        let at_root = IngestRequest::upload(IngestCommand::Files, "/files/", "a.txt");
        assert_eq!(at_root.index_path(), "/files/");

        let nested = IngestRequest::upload(IngestCommand::Files, "/files/a/b", "c.txt");
        assert_eq!(nested.index_path(), "/files/a/b/");
    }
}
