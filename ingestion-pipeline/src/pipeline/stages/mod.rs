use std::io::Cursor;

use common::{error::AppError, storage::types::file_search::FileSearchRecord};
use state_machines::core::GuardError;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::timeout,
};
use tracing::{debug, info, instrument, warn};

use super::{
    context::PipelineContext,
    plan::{Derivation, DerivationPlan, DerivationStep, FailurePolicy},
    request::IngestCommand,
    services::ArtifactReader,
    state::{Derived, Indexed, IngestionMachine, Ready, Stored},
    IngestionPipeline,
};

#[instrument(level = "trace", skip_all, fields(artifact = %ctx.artifact))]
pub async fn store_artifact(
    machine: IngestionMachine<(), Ready>,
    ctx: &mut PipelineContext<'_>,
    mut reader: ArtifactReader,
) -> Result<IngestionMachine<(), Stored>, AppError> {
    let request = ctx.request;
    let written = ctx
        .store
        .write(
            &request.parent_dir,
            &request.name,
            request.command.write_mode(),
            &mut reader,
        )
        .await?;

    let plan = DerivationPlan::for_artifact(
        &request.name,
        request.cascade,
        ctx.services.labels_enabled(),
    );

    info!(
        artifact = %ctx.artifact,
        command = %request.command,
        kind = %plan.kind,
        cascade = request.cascade,
        bytes_written = written.bytes_written,
        existing_size = written.existing_size,
        derivations = plan.steps.len(),
        "artifact stored"
    );

    ctx.written = Some(written);
    ctx.plan = Some(plan);

    machine
        .store()
        .map_err(|(_, guard)| map_guard_error("store", &guard))
}

/// Failure of one derivation step, split by where it was first reported.
enum StepError {
    /// The service call itself failed; not logged yet.
    Service(AppError),
    /// Ingesting the derived bytes failed; the child already logged it.
    Child(AppError),
}

impl StepError {
    fn into_inner(self) -> AppError {
        match self {
            Self::Service(err) | Self::Child(err) => err,
        }
    }
}

/// Runs every planned derivation in order, ingesting each result as a sibling artifact.
#[instrument(level = "trace", skip_all, fields(artifact = %ctx.artifact))]
pub async fn derive(
    machine: IngestionMachine<(), Stored>,
    ctx: &mut PipelineContext<'_>,
    pipeline: &IngestionPipeline,
) -> Result<IngestionMachine<(), Derived>, AppError> {
    let steps = ctx.plan()?.steps.clone();

    for step in steps {
        let outcome = match run_service(ctx, &step).await {
            Ok(reader) => pipeline
                .ingest_artifact(
                    ctx.request
                        .derived(step.artifact_name.clone(), step.cascade),
                    reader,
                )
                .await
                .map_err(StepError::Child),
            Err(err) => Err(StepError::Service(err)),
        };

        match (outcome, step.on_failure) {
            (Ok(()), _) => debug!(
                artifact = %ctx.artifact,
                derived = %step.artifact_name,
                "derivation ingested"
            ),
            (Err(StepError::Service(err)), FailurePolicy::Abort) => return Err(ctx.abort(err)),
            (Err(StepError::Child(err)), FailurePolicy::Abort) => return Err(err),
            (Err(err), FailurePolicy::LogAndContinue) => warn!(
                artifact = %ctx.artifact,
                derived = %step.artifact_name,
                stage = step.derivation.stage(),
                error = %err.into_inner(),
                "derivation failed; continuing without it"
            ),
        }
    }

    machine
        .derive()
        .map_err(|(_, guard)| map_guard_error("derive", &guard))
}

async fn run_service(
    ctx: &PipelineContext<'_>,
    step: &DerivationStep,
) -> Result<ArtifactReader, AppError> {
    let source = ctx.written()?.location.clone();
    let deadline = ctx.pipeline_config.tuning.derivation_timeout;
    let stage = step.derivation.stage();

    let call = async {
        match step.derivation {
            Derivation::ExtractText => {
                ctx.services
                    .extract_text(&source, &ctx.request.name)
                    .await
            }
            Derivation::Thumbnail(variant) => ctx.services.make_thumbnail(&source, variant).await,
            Derivation::Labels => {
                ctx.services
                    .detect_labels(&source)
                    .await
                    .and_then(|labels| {
                        serde_json::to_vec_pretty(&labels)
                            .map(|bytes| Box::new(Cursor::new(bytes)) as ArtifactReader)
                            .map_err(|err| AppError::derivation(stage, &ctx.artifact, err))
                    })
            }
        }
    };

    match timeout(deadline, call).await {
        Ok(Ok(reader)) => Ok(reader),
        Ok(Err(AppError::Derivation { message, .. })) => {
            Err(AppError::derivation(stage, &ctx.artifact, message))
        }
        Ok(Err(err)) => Err(AppError::derivation(stage, &ctx.artifact, err)),
        Err(_) => Err(AppError::derivation(
            stage,
            &ctx.artifact,
            format!("timed out after {deadline:?}"),
        )),
    }
}

/// Splits the newly written bytes of a plain-text artifact into index rows.
///
/// Index write failures are logged per chunk and never fail the ingestion.
#[instrument(level = "trace", skip_all, fields(artifact = %ctx.artifact))]
pub async fn index_text(
    machine: IngestionMachine<(), Derived>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Indexed>, AppError> {
    if ctx.plan()?.index_text {
        ctx.indexed_parts = write_index(ctx).await?;
    }

    machine
        .index()
        .map_err(|(_, guard)| map_guard_error("index", &guard))
}

async fn write_index(ctx: &PipelineContext<'_>) -> Result<u32, AppError> {
    let request = ctx.request;
    let written = ctx.written()?;
    let path = request.index_path();
    let original_path = request.original_index_path();

    let appending = request.command == IngestCommand::Append && written.existing_size > 0;
    let (offset, first_part) = if appending {
        match FileSearchRecord::next_part(ctx.db, &path, &request.name).await {
            Ok(part) => (written.existing_size, part),
            Err(err) => {
                warn!(
                    artifact = %ctx.artifact,
                    error = %err,
                    "could not find the last indexed part; skipping index"
                );
                return Ok(0);
            }
        }
    } else {
        if let Err(err) = FileSearchRecord::delete_for_file(ctx.db, &path, &request.name).await {
            warn!(
                artifact = %ctx.artifact,
                error = %err,
                "could not drop previously indexed parts"
            );
        }
        (0, 0)
    };

    let mut file = ctx.store.open_from(&written.location, offset).await?;
    let mut buffer = vec![0_u8; ctx.pipeline_config.tuning.index_chunk_bytes];
    let mut carried = 0_usize;
    let mut part = first_part;
    let mut indexed = 0_u32;

    loop {
        let Some(free) = buffer.get_mut(carried..) else {
            break;
        };
        let read = read_chunk(&mut file, free).await?;
        let filled = carried.saturating_add(read);
        if filled == 0 {
            break;
        }

        // A short read means the file ended; flush everything that is left.
        let Some(window) = buffer.get(..filled) else {
            break;
        };
        let cut = if filled < buffer.len() {
            filled
        } else {
            complete_prefix_len(window)
        };
        let Some(chunk) = window.get(..cut) else {
            break;
        };

        let record = FileSearchRecord::new(
            request.command.as_str(),
            &path,
            &request.name,
            part,
            &original_path,
            &request.original_name,
            chunk,
        );
        match record.insert(ctx.db).await {
            Ok(()) => indexed = indexed.saturating_add(1),
            Err(err) => warn!(
                artifact = %ctx.artifact,
                part,
                error = %err,
                "failed to index chunk"
            ),
        }
        part = part.saturating_add(1);

        buffer.copy_within(cut..filled, 0);
        carried = filled.saturating_sub(cut);
    }

    info!(
        artifact = %ctx.artifact,
        first_part,
        indexed_parts = indexed,
        "artifact indexed"
    );

    Ok(indexed)
}

/// Fills `buffer` unless the reader ends first; returns the number of bytes read.
async fn read_chunk<R>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while let Some(rest) = buffer.get_mut(filled..).filter(|rest| !rest.is_empty()) {
        let read = reader.read(rest).await?;
        if read == 0 {
            break;
        }
        filled = filled.saturating_add(read);
    }
    Ok(filled)
}

/// Length of `bytes` without a UTF-8 sequence cut off at its end.
///
/// The trailing bytes of a split character are carried into the next chunk. Anything that is
/// not a truncated sequence (invalid data, or a chunk too small to hold one character) is kept.
fn complete_prefix_len(bytes: &[u8]) -> usize {
    let Some(back) = bytes
        .iter()
        .rev()
        .take(4)
        .position(|byte| byte & 0xC0 != 0x80)
    else {
        return bytes.len();
    };
    let start = bytes.len().saturating_sub(back).saturating_sub(1);

    match bytes.get(start..).map(std::str::from_utf8) {
        Some(Err(err)) if err.error_len().is_none() && start > 0 => start,
        _ => bytes.len(),
    }
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn read_chunk_fills_across_short_reads() {
        let (mut tx, mut rx) = tokio::io::duplex(3);
        let writer = tokio::spawn(async move {
            tx.write_all(b"abcdefgh").await.expect("write");
        });

        let mut buffer = [0_u8; 5];
        let first = read_chunk(&mut rx, &mut buffer).await.expect("first chunk");
        assert_eq!(&buffer[..first], b"abcde");

        let second = read_chunk(&mut rx, &mut buffer).await.expect("second chunk");
        assert_eq!(&buffer[..second], b"fgh");

        let third = read_chunk(&mut rx, &mut buffer).await.expect("end");
        assert_eq!(third, 0);

        writer.await.expect("writer task");
    }

    #[test]
    fn complete_prefix_stops_before_a_split_character() {
        // "abcdefg" followed by the first byte of a two-byte "é".
        assert_eq!(complete_prefix_len(b"abcdefg\xC3"), 7);
        // First two bytes of a three-byte "€".
        assert_eq!(complete_prefix_len(b"price \xE2\x82"), 6);
        assert_eq!(complete_prefix_len("caf\u{e9}".as_bytes()), 5);
        assert_eq!(complete_prefix_len(b"plain"), 5);
    }

    #[test]
    fn complete_prefix_keeps_invalid_and_undersized_chunks() {
        assert_eq!(complete_prefix_len(b"ab\xFF"), 3);
        assert_eq!(complete_prefix_len(b"\xC3"), 1);
        assert_eq!(complete_prefix_len(b""), 0);
    }
}
