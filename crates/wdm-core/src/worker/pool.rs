//! Spawn-on-first-use worker pool with an explicit shutdown hook.
//!
//! Process reuse across jobs is deliberate: all transcodes of one kind
//! share a single external process, which serializes them and keeps spawn
//! cost off the per-payload path. The embedding shell calls `shutdown` from
//! its process-exit path; channels also kill their child on drop, so an
//! abandoned pool cannot leak one.

use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;

use super::{locate, WorkerChannel, WorkerKind};

#[derive(Default)]
pub struct WorkerPool {
    override_path: Option<PathBuf>,
    channels: HashMap<WorkerKind, WorkerChannel>,
}

impl WorkerPool {
    /// `override_path` (from config) replaces executable discovery when set.
    pub fn new(override_path: Option<PathBuf>) -> Self {
        WorkerPool {
            override_path,
            channels: HashMap::new(),
        }
    }

    /// The live channel for `kind`, spawning the process on first use.
    pub fn channel(&mut self, kind: WorkerKind) -> Result<&mut WorkerChannel> {
        if !self.channels.contains_key(&kind) {
            let executable = locate::locate(kind, self.override_path.as_deref())?;
            let channel = WorkerChannel::spawn(kind, &executable)?;
            self.channels.insert(kind, channel);
        }
        Ok(self
            .channels
            .get_mut(&kind)
            .expect("channel inserted above"))
    }

    /// Forget a channel whose process died so the next payload respawns it.
    pub fn discard(&mut self, kind: WorkerKind) {
        self.channels.remove(&kind);
    }

    pub fn is_spawned(&self, kind: WorkerKind) -> bool {
        self.channels.contains_key(&kind)
    }

    /// Explicit teardown for process shutdown. Idempotent.
    pub async fn shutdown(&mut self) -> Result<()> {
        for (_, channel) in self.channels.drain() {
            channel.shutdown().await?;
        }
        Ok(())
    }
}
