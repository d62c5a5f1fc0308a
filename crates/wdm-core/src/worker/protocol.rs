//! Wire protocol crossing the worker process boundary.
//!
//! JSON, one message per line, in closed tagged unions shared by both ends.
//! Any line that does not match one of the enumerated shapes is rejected as
//! a protocol error.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::JobError;

/// Control verbs the host can send outside of new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Cancel the in-flight conversion at the next frame boundary.
    Abort,
}

/// Host -> worker messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerRequest {
    /// `{"action": "abort"}`
    Control { action: ControlAction },
    /// `{"file": ..., "saveFile": ...}`: convert `file` into `save_file`.
    Convert {
        file: PathBuf,
        #[serde(rename = "saveFile")]
        save_file: PathBuf,
    },
}

/// Worker -> host messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerResponse {
    /// Unit progress in [0, 1]; does not change job status.
    Progress { progress: f64 },
    /// The current payload completed.
    Finish,
    /// The current payload failed. The queue still advances past it.
    Error { message: String },
    /// The cooperative abort was honored; queue position is preserved.
    Abort,
}

/// Encode one message as a protocol line (no trailing newline).
pub fn encode<T: Serialize>(message: &T) -> Result<String, JobError> {
    serde_json::to_string(message).map_err(|e| JobError::Protocol(e.to_string()))
}

pub fn decode_request(line: &str) -> Result<WorkerRequest, JobError> {
    serde_json::from_str(line).map_err(|e| JobError::Protocol(format!("{}: {}", e, line)))
}

pub fn decode_response(line: &str) -> Result<WorkerResponse, JobError> {
    serde_json::from_str(line).map_err(|e| JobError::Protocol(format!("{}: {}", e, line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn convert_request_wire_shape() {
        let request = WorkerRequest::Convert {
            file: PathBuf::from("/dl/88391430.zip"),
            save_file: PathBuf::from("/dl/88391430.mp4"),
        };
        assert_eq!(
            encode(&request).unwrap(),
            r#"{"file":"/dl/88391430.zip","saveFile":"/dl/88391430.mp4"}"#
        );
    }

    #[test]
    fn abort_request_wire_shape() {
        let request = WorkerRequest::Control {
            action: ControlAction::Abort,
        };
        assert_eq!(encode(&request).unwrap(), r#"{"action":"abort"}"#);
    }

    #[test]
    fn requests_roundtrip() {
        let decoded = decode_request(r#"{"action":"abort"}"#).unwrap();
        assert_eq!(
            decoded,
            WorkerRequest::Control {
                action: ControlAction::Abort
            }
        );

        let decoded = decode_request(r#"{"file":"a.zip","saveFile":"b.mp4"}"#).unwrap();
        match decoded {
            WorkerRequest::Convert { file, save_file } => {
                assert_eq!(file, Path::new("a.zip"));
                assert_eq!(save_file, Path::new("b.mp4"));
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn responses_roundtrip() {
        assert_eq!(
            decode_response(r#"{"status":"progress","progress":0.25}"#).unwrap(),
            WorkerResponse::Progress { progress: 0.25 }
        );
        assert_eq!(
            decode_response(r#"{"status":"finish"}"#).unwrap(),
            WorkerResponse::Finish
        );
        assert_eq!(
            decode_response(r#"{"status":"error","message":"boom"}"#).unwrap(),
            WorkerResponse::Error {
                message: "boom".to_string()
            }
        );
        assert_eq!(
            decode_response(r#"{"status":"abort"}"#).unwrap(),
            WorkerResponse::Abort
        );
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert!(decode_request(r#"{"action":"explode"}"#).is_err());
        assert!(decode_request(r#"{"file":"only-half"}"#).is_err());
        assert!(decode_request("not json").is_err());
        assert!(decode_response(r#"{"status":"exploded"}"#).is_err());
        assert!(decode_response(r#"{"progress":0.5}"#).is_err());
    }

    #[test]
    fn response_encoding_matches_wire_shape() {
        assert_eq!(
            encode(&WorkerResponse::Finish).unwrap(),
            r#"{"status":"finish"}"#
        );
        assert_eq!(
            encode(&WorkerResponse::Error {
                message: "no frames".to_string()
            })
            .unwrap(),
            r#"{"status":"error","message":"no frames"}"#
        );
        assert_eq!(
            encode(&WorkerResponse::Abort).unwrap(),
            r#"{"status":"abort"}"#
        );
    }
}
