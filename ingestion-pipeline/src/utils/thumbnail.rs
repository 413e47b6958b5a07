use std::{
    ffi::OsString,
    io::Cursor,
    path::Path,
    process::Stdio,
};

use common::error::AppError;
use tokio::process::Command;
use tracing::debug;

use crate::pipeline::{ArtifactReader, ThumbnailVariant};

const STAGE: &str = "make thumbnail";

/// Runs ImageMagick to render a 100px high PNG preview on stdout.
#[derive(Clone, Debug)]
pub struct ThumbnailRenderer {
    program: String,
}

impl ThumbnailRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub async fn render(
        &self,
        source: &Path,
        variant: ThumbnailVariant,
    ) -> Result<ArtifactReader, AppError> {
        let args = thumbnail_args(source, variant);
        debug!(program = %self.program, ?args, "rendering thumbnail");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                AppError::derivation(
                    STAGE,
                    source.display().to_string(),
                    format!("could not run {}: {err}", self.program),
                )
            })?;

        if !output.status.success() {
            return Err(AppError::derivation(
                STAGE,
                source.display().to_string(),
                format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        Ok(Box::new(Cursor::new(output.stdout)))
    }
}

fn thumbnail_args(source: &Path, variant: ThumbnailVariant) -> Vec<OsString> {
    let frame = |index: &str| {
        let mut selected = source.as_os_str().to_owned();
        selected.push(format!("[{index}]"));
        selected
    };

    match variant {
        ThumbnailVariant::Image => vec![
            "-thumbnail".into(),
            "x100".into(),
            "-background".into(),
            "white".into(),
            "-alpha".into(),
            "remove".into(),
            "-format".into(),
            "png".into(),
            source.as_os_str().to_owned(),
            "-".into(),
        ],
        // First page.
        ThumbnailVariant::Pdf => vec!["-resize".into(), "x100".into(), frame("0"), "png:-".into()],
        ThumbnailVariant::Video => vec![
            "-resize".into(),
            "x100".into(),
            frame("100"),
            "png:-".into(),
        ],
    }
}
