//! Single-shot transcoder invocation.
//!
//! Frames are already staged in the working area; ffmpeg's concat demuxer
//! consumes the directive and produces one artifact at a fixed name.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Fixed intermediate output name inside the working area.
pub const OUTPUT_NAME: &str = "output.mp4";

const PIXEL_FORMAT: &str = "yuv420p";

/// Run the transcoder once over the staged frames. Returns the intermediate
/// artifact's path inside `work_dir`.
pub async fn encode(work_dir: &Path, concat_file: &str) -> Result<PathBuf> {
    let ffmpeg = which::which("ffmpeg").context("ffmpeg not found on PATH")?;

    let result = Command::new(&ffmpeg)
        .current_dir(work_dir)
        .args([
            "-f",
            "concat",
            "-i",
            concat_file,
            "-vsync",
            "vfr",
            "-pix_fmt",
            PIXEL_FORMAT,
            "-y",
            OUTPUT_NAME,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("failed to run ffmpeg")?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        anyhow::bail!(
            "ffmpeg exited with {}: {}",
            result.status,
            last_lines(&stderr, 5)
        );
    }

    Ok(work_dir.join(OUTPUT_NAME))
}

/// Tail of the transcoder's stderr, for error messages that fit on a
/// protocol line.
fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_lines_keeps_the_tail() {
        let text = "one\ntwo\nthree\nfour";
        assert_eq!(last_lines(text, 2), "three | four");
        assert_eq!(last_lines(text, 10), "one | two | three | four");
        assert_eq!(last_lines("", 3), "");
    }
}
