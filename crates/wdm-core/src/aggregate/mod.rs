//! Download aggregator: drives jobs backed by an ordered remote resource list.
//!
//! A work with one resource delegates to the resumable single-file download
//! primitive. A work with several resources is downloaded strictly
//! sequentially into the in-memory archive accumulator, which guarantees
//! deterministic entry order and predictable per-page naming; the archive is
//! serialized once when the last resource lands.

pub mod archive;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::aggregate::archive::ArchiveAccumulator;
use crate::control::{AbortKind, AbortToken};
use crate::download::FileDownload;
use crate::error::JobError;
use crate::fetch::Fetch;
use crate::job::Job;
use crate::provider::{RemoteResource, WorkProvider};
use crate::rename;

/// Archive container extension for assembled sequences.
const SEQUENCE_EXT: &str = "cbz";

/// Arguments for [`DownloadAggregator::create`], the factory bound to a
/// provider and fetch backend.
pub struct CreateDownload {
    pub url: String,
    pub save_to: PathBuf,
    pub options: HashMap<String, String>,
    pub provider: Arc<dyn WorkProvider>,
    pub fetch: Arc<dyn Fetch>,
    /// Rename template for single-resource save names.
    pub single_rename: String,
    /// Rename template for archive entry names in sequences.
    pub sequence_rename: String,
}

pub struct DownloadAggregator {
    job: Job,
    provider: Arc<dyn WorkProvider>,
    fetch: Arc<dyn Fetch>,
    resources: Vec<RemoteResource>,
    cursor: usize,
    archive: Option<ArchiveAccumulator>,
    abort: AbortToken,
    single_rename: String,
    sequence_rename: String,
}

impl DownloadAggregator {
    pub fn create(args: CreateDownload) -> Self {
        let mut job = Job::new(args.provider.work_id(), args.url, args.save_to);
        job.options = args.options;
        DownloadAggregator {
            job,
            provider: args.provider,
            fetch: args.fetch,
            resources: Vec::new(),
            cursor: 0,
            archive: None,
            abort: AbortToken::new(),
            single_rename: args.single_rename,
            sequence_rename: args.sequence_rename,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Zero-based index of the next resource to request. Only increases,
    /// except on a full reset.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Clone of the abort token, for requesting pause/stop while `start`
    /// is running in a task.
    pub fn abort_handle(&self) -> AbortToken {
        self.abort.clone()
    }

    pub fn pause(&mut self) {
        self.job.set_pausing();
        self.abort.request(AbortKind::Pause);
    }

    pub fn stop(&mut self) {
        self.job.set_stopping();
        self.abort.request(AbortKind::Stop);
    }

    /// Full reset: clears all derived state, keeps identity and config.
    pub fn reset(&mut self) {
        self.job.reset();
        self.resources.clear();
        self.cursor = 0;
        self.archive = None;
        self.abort.clear();
    }

    /// Run the job to its next resting state (Finished, Paused, Stopped, or
    /// Error). A no-op unless the job is Idle or Paused; resuming continues
    /// from the current cursor.
    pub async fn start(&mut self) -> Result<()> {
        if !self.job.can_start() {
            return Ok(());
        }
        self.abort.clear();
        self.job.set_starting();

        // Idempotent short-circuit: restart of a completed job touches
        // neither the network nor the worker.
        if let Some(target) = self.completed_target() {
            tracing::debug!(job = %self.job.id, "output already exists: {}", target.display());
            self.job.record_saved_target(&target);
            self.archive = None;
            self.job.set_finished();
            return Ok(());
        }

        if self.resources.is_empty() {
            self.job.set_message("fetching resource list");
            match self.request_resources().await {
                Ok(resources) => self.resources = resources,
                Err(e) => {
                    tracing::warn!(job = %self.job.id, "{}", e);
                    self.job.set_error(e);
                    return Ok(());
                }
            }
        }
        self.job.set_active();

        if self.resources.len() > 1 {
            self.download_sequence().await
        } else {
            self.download_single().await
        }
    }

    /// Final archive path for the sequence case; computable before the
    /// resource list is known.
    fn sequence_target(&self) -> PathBuf {
        self.job
            .save_to
            .join(format!("{}.{}", self.provider.work_id(), SEQUENCE_EXT))
    }

    fn completed_target(&self) -> Option<PathBuf> {
        if let Some(target) = self.job.saved_target() {
            if target.exists() {
                return Some(target.to_path_buf());
            }
        }
        let archive_path = self.sequence_target();
        if archive_path.exists() {
            return Some(archive_path);
        }
        None
    }

    async fn request_resources(&self) -> Result<Vec<RemoteResource>, JobError> {
        let url = self.provider.resource_list_url();
        let fetch = Arc::clone(&self.fetch);
        let body = tokio::task::spawn_blocking(move || fetch.fetch(&url))
            .await
            .map_err(|e| JobError::Transfer(e.to_string()))?
            .map_err(|e| JobError::Resolve(e.to_string()))?;
        let resources = self
            .provider
            .parse_resource_list(&body)
            .map_err(|e| JobError::Resolve(e.to_string()))?;
        if resources.is_empty() {
            return Err(JobError::Resolve("resource list is empty".to_string()));
        }
        Ok(resources)
    }

    /// Archive entry name for the resource at `index`.
    fn entry_name(&self, index: usize, url: &str) -> String {
        let ctx = self.provider.rename_context(Some(index));
        let stem = rename::render(&self.sequence_rename, &ctx);
        match rename::extension_from_url(url) {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        }
    }

    async fn download_sequence(&mut self) -> Result<()> {
        let final_path = self.sequence_target();
        self.job.record_saved_target(&final_path);
        if self.archive.is_none() {
            self.archive = Some(ArchiveAccumulator::new());
        }
        let total = self.resources.len();

        while self.cursor < total {
            // Checkpoint: a pause/stop between resources is honored here and
            // never resumed automatically.
            if let Some(kind) = self.abort.requested() {
                self.rest_on_abort(kind);
                return Ok(());
            }

            let resource = self.resources[self.cursor].clone();
            let entry_name = self.entry_name(self.cursor, &resource.url);
            let fetch = Arc::clone(&self.fetch);
            let url = resource.url.clone();
            let started = Instant::now();
            let fetched = tokio::task::spawn_blocking(move || fetch.fetch(&url)).await;
            let bytes = match fetched {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => {
                    self.fail_sequence(JobError::Transfer(e.to_string()));
                    return Ok(());
                }
                Err(e) => {
                    self.fail_sequence(JobError::Transfer(e.to_string()));
                    return Ok(());
                }
            };
            self.job
                .stats_mut()
                .accumulate(bytes.len() as u64, started.elapsed());

            let accumulator = self
                .archive
                .as_mut()
                .expect("accumulator exists while a sequence job is unfinished");
            if let Err(e) = accumulator.add_entry(&entry_name, &bytes) {
                self.fail_sequence(JobError::Transfer(e.to_string()));
                return Ok(());
            }

            self.cursor += 1;
            self.job.set_progress(self.cursor as f64 / total as f64);
            self.job.set_message(format!("{} / {}", self.cursor, total));
        }

        let accumulator = self
            .archive
            .take()
            .expect("accumulator exists until serialization");
        match accumulator.write_to(&final_path) {
            Ok(()) => {
                tracing::info!(job = %self.job.id, "archive written: {}", final_path.display());
                self.job.set_finished();
            }
            Err(e) => self.job.set_error(e),
        }
        Ok(())
    }

    async fn download_single(&mut self) -> Result<()> {
        let resource = self.resources[0].clone();
        let ctx = self.provider.rename_context(Some(0));
        let stem = rename::render(&self.single_rename, &ctx);
        let file_name = match rename::extension_from_url(&resource.url) {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        };
        let target = self.job.save_to.join(file_name);
        if target.exists() {
            self.job.record_saved_target(&target);
            self.job.set_finished();
            return Ok(());
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let download = FileDownload::new(resource.url.clone(), target, self.abort.clone());
        let handle = tokio::task::spawn_blocking(move || download.run(Some(tx)));

        while let Some(p) = rx.recv().await {
            if let Some(total) = p.total_bytes {
                if total > 0 {
                    self.job
                        .set_progress(p.completed_bytes as f64 / total as f64);
                }
            }
            self.job.set_message(format!("{} / 1", self.cursor));
        }

        let result = handle.await.context("download task join")?;
        match result {
            Ok(outcome) => {
                self.job
                    .stats_mut()
                    .accumulate(outcome.attempt_bytes, outcome.elapsed);
                match outcome.file {
                    Some(file) => {
                        self.job.record_saved_target(&file);
                        self.cursor = 1;
                        self.job.set_finished();
                    }
                    None => {
                        let kind = self.abort.requested().unwrap_or(AbortKind::Pause);
                        self.rest_on_abort(kind);
                    }
                }
            }
            Err(e) => {
                let err = JobError::Transfer(e.to_string());
                tracing::warn!(job = %self.job.id, "{}", err);
                self.job.set_error(err);
            }
        }
        Ok(())
    }

    /// A transfer failure is job-fatal and discards buffered accumulation;
    /// restarting begins from scratch.
    fn fail_sequence(&mut self, err: JobError) {
        tracing::warn!(job = %self.job.id, "{}", err);
        self.archive = None;
        self.cursor = 0;
        self.job.set_error(err);
    }

    fn rest_on_abort(&mut self, kind: AbortKind) {
        match kind {
            AbortKind::Pause => {
                self.job.set_pausing();
                self.job.set_paused();
            }
            AbortKind::Stop => {
                self.job.set_stopping();
                self.job.set_stopped();
            }
        }
    }
}
