//! One transcode request, start to finish: unpack the source archive, stage
//! frames in manifest order, invoke the transcoder once, persist the output,
//! and clean all temporary state.
//!
//! The abort flag is checked once per frame, before staging it. An honored
//! abort discards every staged frame; no partial transcode is ever produced.

use anyhow::{Context, Result};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;
use zip::ZipArchive;

use wdm_core::control::AbortToken;

use crate::manifest::{self, CONCAT_ENTRY, MANIFEST_ENTRY};
use crate::transcode;

/// How a request ended when it did not fail.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Aborted,
}

/// Staging covers the first half of the progress range; the encode step has
/// no incremental signal from the transcoder, so the next message after
/// staging is terminal.
const STAGING_SHARE: f64 = 0.5;

pub async fn run(
    file: &Path,
    save_file: &Path,
    abort: &AbortToken,
    progress: UnboundedSender<f64>,
) -> Result<Outcome> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("cannot read source archive: {}", file.display()))?;
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("source archive is not a valid zip")?;

    let frames = manifest::parse(&read_entry(&mut archive, MANIFEST_ENTRY)?)?;
    let concat = read_entry(&mut archive, CONCAT_ENTRY)?;

    let staging = tempfile::Builder::new()
        .prefix("wdm-encode-")
        .tempdir()
        .context("cannot create staging area")?;
    tokio::fs::write(staging.path().join(CONCAT_ENTRY), &concat)
        .await
        .context("cannot stage concat directive")?;

    // Strict manifest order; the concatenation directive is order-sensitive.
    let total = frames.len();
    for (index, frame) in frames.iter().enumerate() {
        if abort.is_requested() {
            tracing::info!("abort honored before frame {} of {}", index, total);
            staging.close().context("discard staged frames")?;
            return Ok(Outcome::Aborted);
        }
        let data = read_entry(&mut archive, &frame.file)?;
        tokio::fs::write(staging.path().join(&frame.file), &data)
            .await
            .with_context(|| format!("cannot stage frame: {}", frame.file))?;
        let _ = progress.send((index + 1) as f64 / total as f64 * STAGING_SHARE);
    }

    let output = transcode::encode(staging.path(), CONCAT_ENTRY).await?;

    if let Some(parent) = save_file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("cannot create directory: {}", parent.display()))?;
    }
    tokio::fs::copy(&output, save_file)
        .await
        .with_context(|| format!("cannot persist output: {}", save_file.display()))?;

    // Leave no residue for the next request on this reused process: staged
    // frames, the directive, and the intermediate are all removed.
    for frame in &frames {
        remove_staged(&staging.path().join(&frame.file)).await;
    }
    remove_staged(&staging.path().join(CONCAT_ENTRY)).await;
    remove_staged(&output).await;
    staging.close().context("remove staging area")?;

    let _ = progress.send(1.0);
    Ok(Outcome::Finished)
}

async fn remove_staged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!("could not remove staged file {}: {}", path.display(), e);
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("archive entry missing: {}", name))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut buf)
        .with_context(|| format!("cannot read archive entry: {}", name))?;
    Ok(buf)
}
