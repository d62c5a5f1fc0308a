//! Frame manifest and concatenation directive, read from well-known entries
//! inside the source archive.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Archive entry holding the ordered frame list.
pub const MANIFEST_ENTRY: &str = "animation.json";
/// Archive entry holding the transcoder's concatenation directive.
pub const CONCAT_ENTRY: &str = "inputs.txt";

/// One frame of the animation. Manifest order is playback order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Frame {
    /// Entry name of the frame image inside the archive.
    pub file: String,
    /// Display duration in milliseconds.
    #[serde(default)]
    pub delay: u64,
}

/// Parse the manifest. Empty or unparseable manifests are fatal for the
/// request.
pub fn parse(bytes: &[u8]) -> Result<Vec<Frame>> {
    let frames: Vec<Frame> =
        serde_json::from_slice(bytes).context("frame manifest is not valid JSON")?;
    if frames.is_empty() {
        anyhow::bail!("frame manifest is empty");
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordered_frames() {
        let body = br#"[
            {"file": "000000.jpg", "delay": 70},
            {"file": "000001.jpg", "delay": 70},
            {"file": "000002.jpg", "delay": 120}
        ]"#;
        let frames = parse(body).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].file, "000000.jpg");
        assert_eq!(frames[2].delay, 120);
    }

    #[test]
    fn missing_delay_defaults_to_zero() {
        let frames = parse(br#"[{"file": "f.jpg"}]"#).unwrap();
        assert_eq!(frames[0].delay, 0);
    }

    #[test]
    fn empty_manifest_is_fatal() {
        assert!(parse(b"[]").is_err());
    }

    #[test]
    fn garbage_is_fatal() {
        assert!(parse(b"{not json").is_err());
        assert!(parse(br#"{"file": "not-a-list.jpg"}"#).is_err());
    }
}
