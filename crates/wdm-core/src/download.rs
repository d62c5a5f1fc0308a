//! Resumable single-file download primitive.
//!
//! Writes to a `.part` temp file and resumes from its length with a Range
//! request; the final name appears only via atomic rename once the transfer
//! completes. Emits progress events and honors a cooperative abort token;
//! an abort leaves the `.part` in place for the next attempt.
//!
//! Runs in the current thread (libcurl); call from `spawn_blocking` when
//! used from async code.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;

use crate::control::AbortToken;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Progress snapshot for one transfer. `completed_bytes` includes bytes
/// carried over from an earlier interrupted attempt.
#[derive(Debug, Clone, Copy)]
pub struct DownloadProgress {
    pub completed_bytes: u64,
    pub total_bytes: Option<u64>,
}

/// Result of one attempt. `file` is None when the transfer was aborted
/// cooperatively; the `.part` remains on disk for resume. `attempt_bytes`
/// and `elapsed` cover this attempt only so callers can accumulate them
/// into continuous totals.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub file: Option<PathBuf>,
    pub attempt_bytes: u64,
    pub elapsed: Duration,
}

/// Transfer failure. Cooperative abort is not an error; see
/// [`DownloadOutcome::file`].
#[derive(Debug)]
pub enum DownloadError {
    Curl(curl::Error),
    Http(u32),
    Io(std::io::Error),
}

impl std::fmt::Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadError::Curl(e) => write!(f, "{}", e),
            DownloadError::Http(code) => write!(f, "HTTP {}", code),
            DownloadError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DownloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DownloadError::Curl(e) => Some(e),
            DownloadError::Io(e) => Some(e),
            DownloadError::Http(_) => None,
        }
    }
}

struct TransferState {
    file: File,
    /// Bytes already on disk from earlier attempts.
    base: u64,
    /// Bytes written during this attempt.
    written: u64,
    code: Option<u32>,
    content_length: Option<u64>,
    range_total: Option<u64>,
    truncated: bool,
    aborted: bool,
    io_error: Option<std::io::Error>,
}

impl TransferState {
    fn total(&self) -> Option<u64> {
        if let Some(total) = self.range_total {
            return Some(total);
        }
        self.content_length.map(|len| {
            if self.code == Some(206) {
                self.base + len
            } else {
                len
            }
        })
    }
}

/// One resumable download to a final target path.
pub struct FileDownload {
    url: String,
    target: PathBuf,
    abort: AbortToken,
}

impl FileDownload {
    pub fn new(url: impl Into<String>, target: impl Into<PathBuf>, abort: AbortToken) -> Self {
        FileDownload {
            url: url.into(),
            target: target.into(),
            abort,
        }
    }

    /// Run the transfer to completion, abort, or failure.
    pub fn run(
        &self,
        progress: Option<UnboundedSender<DownloadProgress>>,
    ) -> Result<DownloadOutcome, DownloadError> {
        let temp = temp_path(&self.target);
        if let Some(parent) = self.target.parent() {
            std::fs::create_dir_all(parent).map_err(DownloadError::Io)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&temp)
            .map_err(DownloadError::Io)?;
        let resume_from = file.metadata().map_err(DownloadError::Io)?.len();

        let started = Instant::now();
        let state = Mutex::new(TransferState {
            file,
            base: resume_from,
            written: 0,
            code: None,
            content_length: None,
            range_total: None,
            truncated: false,
            aborted: false,
            io_error: None,
        });

        let mut easy = curl::easy::Easy::new();
        easy.url(&self.url).map_err(DownloadError::Curl)?;
        easy.follow_location(true).map_err(DownloadError::Curl)?;
        easy.connect_timeout(Duration::from_secs(30))
            .map_err(DownloadError::Curl)?;
        // Abort when throughput drops below 1 KiB/s for 60s rather than
        // imposing a hard wall-clock limit on large files.
        easy.low_speed_limit(1024).map_err(DownloadError::Curl)?;
        easy.low_speed_time(Duration::from_secs(60))
            .map_err(DownloadError::Curl)?;
        if resume_from > 0 {
            easy.resume_from(resume_from).map_err(DownloadError::Curl)?;
        }

        let perform_result = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|line| {
                    if let Ok(line) = std::str::from_utf8(line) {
                        parse_header_line(line.trim(), &state);
                    }
                    true
                })
                .map_err(DownloadError::Curl)?;
            transfer
                .write_function(|data| {
                    let mut st = state.lock().unwrap();
                    if self.abort.is_requested() {
                        st.aborted = true;
                        return Ok(0);
                    }
                    match st.code {
                        // Server ignored the range request; restart from zero.
                        Some(200) if st.base > 0 && !st.truncated => {
                            if let Err(e) = st.file.set_len(0) {
                                st.io_error = Some(e);
                                return Ok(0);
                            }
                            st.base = 0;
                            st.truncated = true;
                        }
                        Some(200) | Some(206) => {}
                        // Redirect or error bodies are not file content.
                        _ => return Ok(data.len()),
                    }
                    if let Err(e) = st.file.write_all(data) {
                        st.io_error = Some(e);
                        return Ok(0);
                    }
                    st.written += data.len() as u64;
                    if let Some(tx) = &progress {
                        let _ = tx.send(DownloadProgress {
                            completed_bytes: st.base + st.written,
                            total_bytes: st.total(),
                        });
                    }
                    Ok(data.len())
                })
                .map_err(DownloadError::Curl)?;
            transfer.perform()
        };

        let mut st = state.into_inner().unwrap();
        let elapsed = started.elapsed();

        if st.aborted {
            tracing::debug!("download aborted, keeping {}", temp.display());
            return Ok(DownloadOutcome {
                file: None,
                attempt_bytes: st.written,
                elapsed,
            });
        }
        if let Some(e) = st.io_error.take() {
            return Err(DownloadError::Io(e));
        }
        if let Err(e) = perform_result {
            return Err(DownloadError::Curl(e));
        }

        let code = easy.response_code().map_err(DownloadError::Curl)? as u32;
        // 416 with a nonempty `.part` means the file was already complete.
        let already_complete = code == 416 && st.base > 0;
        if !(200..300).contains(&code) && !already_complete {
            return Err(DownloadError::Http(code));
        }

        st.file.sync_all().map_err(DownloadError::Io)?;
        let written = st.written;
        let completed = st.base + st.written;
        let total = st.total();
        drop(st);

        std::fs::rename(&temp, &self.target).map_err(DownloadError::Io)?;
        if let Some(tx) = &progress {
            let _ = tx.send(DownloadProgress {
                completed_bytes: completed,
                total_bytes: total.or(Some(completed)),
            });
        }

        Ok(DownloadOutcome {
            file: Some(self.target.clone()),
            attempt_bytes: written,
            elapsed,
        })
    }
}

fn parse_header_line(line: &str, state: &Mutex<TransferState>) {
    let mut st = state.lock().unwrap();
    if let Some(rest) = line.strip_prefix("HTTP/") {
        // New response block (redirects produce several); status code is the
        // second token.
        if let Some(code) = rest.split_whitespace().nth(1).and_then(|s| s.parse().ok()) {
            st.code = Some(code);
            st.content_length = None;
            st.range_total = None;
        }
        return;
    }
    if let Some((name, value)) = line.split_once(':') {
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            st.content_length = value.parse().ok();
        }
        if name.eq_ignore_ascii_case("content-range") {
            // "bytes 4000-9999/10000"
            if let Some((_, total)) = value.rsplit_once('/') {
                st.range_total = total.trim().parse().ok();
            }
        }
    }
}
