//! Worker executable resolution.
//!
//! Two candidate locations, tried in order: the development path beside the
//! host executable, then the packaged resources directory. A configured
//! override wins over both.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::WorkerKind;

/// Directory packaged builds place worker binaries in, relative to the host
/// executable.
const PACKAGED_DIR: &str = "resources";

/// Platform binary name for `kind`.
pub fn binary_name(kind: WorkerKind) -> String {
    format!("{}{}", kind.binary_stem(), std::env::consts::EXE_SUFFIX)
}

/// Candidate paths in resolution order: development first, packaged second.
pub fn candidates(kind: WorkerKind) -> Result<Vec<PathBuf>> {
    let exe = std::env::current_exe().context("cannot locate host executable")?;
    let exe_dir = exe
        .parent()
        .context("host executable has no parent directory")?;
    let name = binary_name(kind);
    Ok(vec![
        exe_dir.join(&name),
        exe_dir.join(PACKAGED_DIR).join(&name),
    ])
}

/// Resolve the worker executable for `kind`.
pub fn locate(kind: WorkerKind, override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!(
            "configured worker path does not exist: {}",
            path.display()
        );
    }

    let candidates = candidates(kind)?;
    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.clone());
        }
    }
    anyhow::bail!(
        "worker executable {} not found (tried {})",
        binary_name(kind),
        candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
}
