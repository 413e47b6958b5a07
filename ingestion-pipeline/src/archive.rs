use std::io::{self, Read};

use bytes::Bytes;
use common::error::AppError;
use futures::stream;
use tokio::{io::AsyncRead, sync::mpsc};
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, error, info};

use crate::pipeline::{ArtifactReader, IngestCommand, IngestRequest, IngestionPipeline};

/// Bytes handed from the tar reader to ingestion per message.
const ENTRY_CHUNK_BYTES: usize = 64 * 1024;
/// Chunks buffered per entry before the tar reader waits for ingestion.
const ENTRY_CHUNKS_IN_FLIGHT: usize = 4;

type EntryBody = mpsc::Receiver<io::Result<Bytes>>;

/// A regular file of the archive whose content is still being read.
struct TarEntry {
    path: String,
    body: EntryBody,
}

/// Unpacks a tar stream under `parent_dir/name`, ingesting each regular file in archive order.
///
/// Every entry becomes its own root artifact with cascade enabled. Entry content is streamed
/// into ingestion, so only a few chunks of the current entry are held in memory. Processing
/// stops at the first failing entry; entries after it are never read. Returns the number of
/// installed files.
#[tracing::instrument(skip_all, fields(command = %command, parent_dir = %parent_dir, name = %name))]
pub async fn install_archive<R>(
    pipeline: &IngestionPipeline,
    command: IngestCommand,
    parent_dir: &str,
    name: &str,
    archive: R,
) -> Result<usize, AppError>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (tx, mut rx) = mpsc::channel(1);
    let bridge = SyncIoBridge::new(archive);
    let reader = tokio::task::spawn_blocking(move || read_entries(bridge, &tx));

    let mut installed = 0_usize;
    while let Some(entry) = rx.recv().await {
        let entry = entry.inspect_err(|err| error!(error = %err, "archive could not be read"))?;
        let (dir, base) = entry_destination(parent_dir, name, &entry.path)
            .inspect_err(|err| error!(entry = %entry.path, error = %err, "archive entry rejected"))?;
        debug!(entry = %entry.path, destination = %dir, file = %base, "installing archive entry");

        let request = IngestRequest {
            command,
            parent_dir: dir.clone(),
            name: base.clone(),
            original_parent_dir: dir,
            original_name: base,
            cascade: true,
        };
        if let Err(err) = pipeline.ingest(request, entry_reader(entry.body)).await {
            // A read failure inside the entry surfaces as the archive error that caused it.
            return match rx.recv().await {
                Some(Err(archive_err)) => {
                    error!(error = %archive_err, "archive could not be read");
                    Err(archive_err)
                }
                _ => Err(err),
            };
        }
        installed = installed.saturating_add(1);
    }

    reader
        .await
        .inspect_err(|err| error!(error = %err, "archive reader task failed"))?;
    info!(installed, "archive installed");
    Ok(installed)
}

fn entry_reader(body: EntryBody) -> ArtifactReader {
    let chunks = stream::unfold(body, |mut body| async move {
        body.recv().await.map(|chunk| (chunk, body))
    });
    Box::new(StreamReader::new(Box::pin(chunks)))
}

/// Blocking side: walks the archive and streams regular files over until the receiver hangs up.
fn read_entries<R: Read>(source: R, tx: &mpsc::Sender<Result<TarEntry, AppError>>) {
    let mut archive = tar::Archive::new(source);
    let entries = match archive.entries() {
        Ok(entries) => entries,
        Err(err) => {
            let _ = tx.blocking_send(Err(malformed(&err)));
            return;
        }
    };

    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let _ = tx.blocking_send(Err(malformed(&err)));
                return;
            }
        };
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(err) => {
                let _ = tx.blocking_send(Err(malformed(&err)));
                return;
            }
        };

        let (body_tx, body) = mpsc::channel(ENTRY_CHUNKS_IN_FLIGHT);
        if tx.blocking_send(Ok(TarEntry { path, body })).is_err() {
            return;
        }

        match stream_entry(&mut entry, &body_tx) {
            EntryOutcome::Complete => {}
            EntryOutcome::Abandoned => return,
            EntryOutcome::Failed(err) => {
                let _ = body_tx.blocking_send(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    err.to_string(),
                )));
                drop(body_tx);
                let _ = tx.blocking_send(Err(malformed(&err)));
                return;
            }
        }
    }
}

enum EntryOutcome {
    Complete,
    /// Ingestion stopped reading the entry.
    Abandoned,
    Failed(io::Error),
}

fn stream_entry<R: Read>(entry: &mut R, body: &mpsc::Sender<io::Result<Bytes>>) -> EntryOutcome {
    let mut buffer = vec![0_u8; ENTRY_CHUNK_BYTES];
    loop {
        let read = match entry.read(&mut buffer) {
            Ok(0) => return EntryOutcome::Complete,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return EntryOutcome::Failed(err),
        };
        let chunk = Bytes::copy_from_slice(buffer.get(..read).unwrap_or_default());
        if body.blocking_send(Ok(chunk)).is_err() {
            return EntryOutcome::Abandoned;
        }
    }
}

fn malformed(err: &io::Error) -> AppError {
    AppError::ArchiveFormat(err.to_string())
}

/// Directory and file name an archive entry is installed to.
///
/// The first component of the entry path is dropped (archives are expected to carry a
/// leading `.` or top-level folder), the rest is placed under `parent_dir/name`.
pub fn entry_destination(
    parent_dir: &str,
    name: &str,
    entry_path: &str,
) -> Result<(String, String), AppError> {
    let tokens: Vec<&str> = entry_path.split('/').collect();
    if tokens.contains(&"..") {
        return Err(AppError::ArchiveFormat(format!(
            "entry {entry_path} escapes the install directory"
        )));
    }

    let base = tokens
        .last()
        .filter(|base| !base.is_empty() && **base != ".")
        .ok_or_else(|| AppError::ArchiveFormat(format!("entry {entry_path} has no file name")))?;

    let mut dir = format!("{}/{name}", parent_dir.trim_end_matches('/'));
    let inner = tokens
        .get(1..tokens.len().saturating_sub(1))
        .unwrap_or_default();
    for token in inner.iter().filter(|t| !t.is_empty() && **t != ".") {
        dir.push('/');
        dir.push_str(token);
    }

    Ok((dir, (*base).to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Yields `data` and then fails, like a tar stream cut off mid-entry.
    struct BrokenAfter {
        data: io::Cursor<Vec<u8>>,
    }

    impl Read for BrokenAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream cut")),
                read => Ok(read),
            }
        }
    }

    #[tokio::test]
    async fn entries_are_streamed_in_chunks() {
        let data = vec![7_u8; ENTRY_CHUNK_BYTES * 2 + 10];
        let (tx, mut rx) = mpsc::channel(ENTRY_CHUNKS_IN_FLIGHT);
        let source = data.clone();
        let writer = tokio::task::spawn_blocking(move || {
            matches!(
                stream_entry(&mut io::Cursor::new(source), &tx),
                EntryOutcome::Complete
            )
        });

        let mut sizes = Vec::new();
        while let Some(chunk) = rx.recv().await {
            sizes.push(chunk.expect("chunk").len());
        }
        assert!(writer.await.expect("reader task"));
        assert_eq!(sizes, vec![ENTRY_CHUNK_BYTES, ENTRY_CHUNK_BYTES, 10]);
    }

    #[tokio::test]
    async fn entry_read_failure_reaches_the_ingesting_reader() {
        let (tx, body) = mpsc::channel(ENTRY_CHUNKS_IN_FLIGHT);
        let (entries_tx, mut entries_rx) = mpsc::channel(1);
        let blocking = tokio::task::spawn_blocking(move || {
            let mut source = BrokenAfter {
                data: io::Cursor::new(b"partial".to_vec()),
            };
            if let EntryOutcome::Failed(err) = stream_entry(&mut source, &tx) {
                let _ = tx.blocking_send(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    err.to_string(),
                )));
                let _ = entries_tx.blocking_send(malformed(&err));
            }
        });

        let mut reader = entry_reader(body);
        let mut received = Vec::new();
        let err = tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut received)
            .await
            .expect_err("reader sees the failure");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(received, b"partial");

        blocking.await.expect("reader task");
        assert!(matches!(
            entries_rx.recv().await,
            Some(AppError::ArchiveFormat(_))
        ));
    }

    #[test]
    fn destination_strips_the_leading_component() {
        assert_eq!(
            entry_destination("/files/a", "pkg", "./docs/readme.txt").expect("valid"),
            ("/files/a/pkg/docs".to_string(), "readme.txt".to_string())
        );
        assert_eq!(
            entry_destination("/files/a", "pkg", "top/one/two/x.json").expect("valid"),
            ("/files/a/pkg/one/two".to_string(), "x.json".to_string())
        );
        assert_eq!(
            entry_destination("/files/", "pkg", "./x.txt").expect("valid"),
            ("/files/pkg".to_string(), "x.txt".to_string())
        );
        assert_eq!(
            entry_destination("/files", "pkg", "x.txt").expect("valid"),
            ("/files/pkg".to_string(), "x.txt".to_string())
        );
    }

    #[test]
    fn destination_rejects_traversal_and_empty_names() {
        assert!(matches!(
            entry_destination("/files", "pkg", "./../../etc/passwd"),
            Err(AppError::ArchiveFormat(_))
        ));
        assert!(matches!(
            entry_destination("/files", "pkg", "./dir/"),
            Err(AppError::ArchiveFormat(_))
        ));
    }
}
