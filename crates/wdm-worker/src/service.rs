//! Request dispatch loop: protocol lines in, protocol lines out.
//!
//! A reader task consumes requests as they arrive so an abort can reach a
//! running pipeline; conversions themselves run one at a time, which the
//! host's single-outstanding contract already guarantees. Every failure is
//! shaped into an `error` response; nothing crosses the process boundary
//! unhandled.

use anyhow::Result;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use wdm_core::control::{AbortKind, AbortToken};
use wdm_core::worker::protocol::{self, ControlAction, WorkerRequest, WorkerResponse};

use crate::pipeline;

enum Incoming {
    Convert { file: PathBuf, save_file: PathBuf },
    Bad(String),
}

pub async fn run<R, W>(input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let abort = AbortToken::new();
    let (request_tx, mut requests) = mpsc::unbounded_channel::<Incoming>();

    let reader_abort = abort.clone();
    tokio::spawn(async move {
        let mut lines = input.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let incoming = match protocol::decode_request(line) {
                Ok(WorkerRequest::Control {
                    action: ControlAction::Abort,
                }) => {
                    reader_abort.request(AbortKind::Pause);
                    continue;
                }
                Ok(WorkerRequest::Convert { file, save_file }) => {
                    Incoming::Convert { file, save_file }
                }
                Err(e) => Incoming::Bad(e.to_string()),
            };
            if request_tx.send(incoming).is_err() {
                break;
            }
        }
    });

    while let Some(incoming) = requests.recv().await {
        match incoming {
            Incoming::Bad(message) => {
                tracing::warn!("rejected request: {}", message);
                write_response(&mut output, &WorkerResponse::Error { message }).await?;
            }
            Incoming::Convert { file, save_file } => {
                tracing::info!("converting {} -> {}", file.display(), save_file.display());
                let (progress_tx, mut progress) = mpsc::unbounded_channel();
                let mut job = Box::pin(pipeline::run(&file, &save_file, &abort, progress_tx));

                let outcome = loop {
                    tokio::select! {
                        Some(p) = progress.recv() => {
                            write_response(&mut output, &WorkerResponse::Progress { progress: p })
                                .await?;
                        }
                        result = &mut job => break result,
                    }
                };
                drop(job);
                while let Ok(p) = progress.try_recv() {
                    write_response(&mut output, &WorkerResponse::Progress { progress: p }).await?;
                }

                let response = match outcome {
                    Ok(pipeline::Outcome::Finished) => WorkerResponse::Finish,
                    Ok(pipeline::Outcome::Aborted) => {
                        // Consumed; the next request must not re-observe it.
                        abort.clear();
                        WorkerResponse::Abort
                    }
                    Err(e) => {
                        tracing::warn!("conversion failed: {:#}", e);
                        WorkerResponse::Error {
                            message: format!("{:#}", e),
                        }
                    }
                };
                write_response(&mut output, &response).await?;
            }
        }
    }

    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    output: &mut W,
    response: &WorkerResponse,
) -> Result<()> {
    let mut line = protocol::encode(response)?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
