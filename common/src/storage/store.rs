use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};

use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncRead, AsyncSeekExt, AsyncWriteExt},
};

use crate::{error::AppError, utils::config::AppConfig};

/// One child of a stored directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// How an ingestion write treats an artifact that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Truncate,
    Append,
}

/// Outcome of a completed artifact write.
#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    pub location: PathBuf,
    /// Size before this write; 0 when the artifact did not exist.
    pub existing_size: u64,
    pub bytes_written: u64,
}

/// Hierarchical byte store for uploads and derived artifacts, rooted at the data directory.
///
/// Artifacts are addressed by a slash-separated directory (e.g. `/files/docs`) and a file
/// name. Nothing here deletes artifacts.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    base: PathBuf,
}

impl ArtifactStore {
    /// Create the store, making sure the configured data directory exists.
    pub async fn new(cfg: &AppConfig) -> std::io::Result<Self> {
        let base = PathBuf::from(&cfg.data_dir);
        fs::create_dir_all(&base).await?;
        Ok(Self { base })
    }

    /// Create a store over an existing directory. Used by tests.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// Resolve a directory and name to a filesystem path under the base.
    ///
    /// Leading slashes are ignored. Parent traversals, platform prefixes and names that
    /// are not a single path component are rejected.
    pub fn resolve(&self, dir: &str, name: &str) -> Result<PathBuf, AppError> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(AppError::Validation(format!(
                "invalid artifact name '{name}'"
            )));
        }

        let mut location = self.resolve_dir(dir)?;
        location.push(name);

        Ok(location)
    }

    /// Resolve a slash-separated directory to a filesystem path under the base.
    pub fn resolve_dir(&self, dir: &str) -> Result<PathBuf, AppError> {
        let mut location = self.base.clone();
        for component in Path::new(dir).components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => location.push(part),
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(AppError::Validation(format!(
                        "invalid artifact directory '{dir}'"
                    )))
                }
            }
        }

        Ok(location)
    }

    /// Copy `reader` into the artifact at `dir/name`, creating missing directories.
    ///
    /// Any failure is a `StorageWrite` error. Bytes copied before the failure stay on disk.
    pub async fn write<R>(
        &self,
        dir: &str,
        name: &str,
        mode: WriteMode,
        reader: &mut R,
    ) -> Result<WrittenArtifact, AppError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let location = self.resolve(dir, name)?;
        let artifact = artifact_display(dir, name);

        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| AppError::storage_write(&artifact, err))?;
        }

        let existing_size = match fs::metadata(&location).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => 0,
            Err(err) => return Err(AppError::storage_write(&artifact, err)),
        };

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Append => options.append(true),
            WriteMode::Truncate => options.write(true).truncate(true),
        };

        let mut file = options
            .open(&location)
            .await
            .map_err(|err| AppError::storage_write(&artifact, err))?;

        let bytes_written = tokio::io::copy(reader, &mut file)
            .await
            .map_err(|err| AppError::storage_write(&artifact, err))?;
        file.flush()
            .await
            .map_err(|err| AppError::storage_write(&artifact, err))?;

        tracing::debug!(
            artifact = %artifact,
            existing_size,
            bytes_written,
            ?mode,
            "artifact written"
        );

        Ok(WrittenArtifact {
            location,
            existing_size,
            bytes_written,
        })
    }

    /// Open a written artifact for reading, positioned at `offset`.
    pub async fn open_from(&self, location: &Path, offset: u64) -> Result<File, AppError> {
        let mut file = File::open(location).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(file)
    }

    /// Entries of the directory `dir`, sorted by name.
    ///
    /// Returns `None` when `dir` does not exist or is not a directory.
    pub async fn list_dir(&self, dir: &str) -> Result<Option<Vec<ArtifactEntry>>, AppError> {
        let location = self.resolve_dir(dir)?;
        match fs::metadata(&location).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(None),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&location).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let meta = entry.metadata().await?;
            entries.push(ArtifactEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: meta.len(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Some(entries))
    }
}

/// `dir/name` as used in logs and error messages.
pub fn artifact_display(dir: &str, name: &str) -> String {
    format!("{}/{name}", dir.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn resolve_strips_root_and_rejects_traversal() {
        let store = ArtifactStore::with_base("/srv/data");

        let path = store.resolve("/files/a/b", "c.txt").expect("valid path");
        assert_eq!(path, PathBuf::from("/srv/data/files/a/b/c.txt"));

        assert!(store.resolve("/files/../etc", "passwd").is_err());
        assert!(store.resolve("/files", "..").is_err());
        assert!(store.resolve("/files", "a/b").is_err());
        assert!(store.resolve("/files", "").is_err());
    }

    #[tokio::test]
    async fn write_creates_directories_and_truncates() {
        let dir = TempDir::new().expect("temp dir");
        let store = ArtifactStore::with_base(dir.path());

        let first = store
            .write(
                "/files/nested/deeper",
                "note.txt",
                WriteMode::Truncate,
                &mut Cursor::new(b"first version".to_vec()),
            )
            .await
            .expect("first write");
        assert_eq!(first.existing_size, 0);
        assert_eq!(first.bytes_written, 13);

        let second = store
            .write(
                "/files/nested/deeper",
                "note.txt",
                WriteMode::Truncate,
                &mut Cursor::new(b"v2".to_vec()),
            )
            .await
            .expect("second write");
        assert_eq!(second.existing_size, 13);

        let content = fs::read(&second.location).await.expect("read back");
        assert_eq!(content, b"v2");
    }

    #[tokio::test]
    async fn append_keeps_prior_bytes_and_open_from_skips_them() {
        let dir = TempDir::new().expect("temp dir");
        let store = ArtifactStore::with_base(dir.path());

        store
            .write(
                "/files",
                "log.txt",
                WriteMode::Truncate,
                &mut Cursor::new(b"hello ".to_vec()),
            )
            .await
            .expect("initial write");
        let appended = store
            .write(
                "/files",
                "log.txt",
                WriteMode::Append,
                &mut Cursor::new(b"world".to_vec()),
            )
            .await
            .expect("append");
        assert_eq!(appended.existing_size, 6);

        let content = fs::read(&appended.location).await.expect("read back");
        assert_eq!(content, b"hello world");

        let mut tail = Vec::new();
        let mut file = store
            .open_from(&appended.location, appended.existing_size)
            .await
            .expect("open from offset");
        tokio::io::AsyncReadExt::read_to_end(&mut file, &mut tail)
            .await
            .expect("read tail");
        assert_eq!(tail, b"world");
    }

    #[tokio::test]
    async fn list_dir_sorts_entries_and_ignores_missing_directories() {
        let dir = TempDir::new().expect("temp dir");
        let store = ArtifactStore::with_base(dir.path());

        for name in ["b.txt", "a.pdf", "a.pdf--extract.txt"] {
            store
                .write(
                    "/files/docs",
                    name,
                    WriteMode::Truncate,
                    &mut Cursor::new(b"12345".to_vec()),
                )
                .await
                .expect("write");
        }
        fs::create_dir_all(dir.path().join("files/docs/nested"))
            .await
            .expect("nested dir");

        let entries = store
            .list_dir("/files/docs/")
            .await
            .expect("list")
            .expect("is a directory");
        let names: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "a.pdf--extract.txt", "b.txt", "nested"]);
        assert_eq!(entries[0].size, 5);
        assert!(!entries[0].is_dir);
        assert!(entries[3].is_dir);

        assert!(store.list_dir("/files/missing").await.expect("list").is_none());
        assert!(store.list_dir("/files/docs/b.txt").await.expect("list").is_none());
        assert!(store.list_dir("/files/../etc").await.is_err());
    }
}
