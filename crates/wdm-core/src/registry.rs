//! Persistent job registry (SQLite via sqlx).
//!
//! Restores the job list across host restarts. In-flight archive
//! accumulation is memory-only by design: jobs interrupted by a crash
//! recover to Paused, an unfinished sequence download restarts from index 0
//! on its next start, and the idempotent output check keeps completed jobs
//! free.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::job::{Job, JobStatus};

/// Registry row for one job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub url: String,
    pub save_to: PathBuf,
    pub state: JobStatus,
    pub saved_target: Option<PathBuf>,
}

/// Handle to the SQLite-backed job registry.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/wdm/jobs.db`.
#[derive(Clone)]
pub struct JobRegistry {
    pool: Pool<Sqlite>,
}

impl JobRegistry {
    /// Open (or create) the default registry and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("wdm")?;
        let state_dir = xdg_dirs.get_state_home();
        tokio::fs::create_dir_all(&state_dir).await?;
        Self::open_at(state_dir.join("jobs.db")).await
    }

    /// Open (or create) the registry at a specific path. Creates parent
    /// directories if needed; intended for tests and custom state dirs.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let registry = JobRegistry { pool };
        registry.migrate().await?;
        Ok(registry)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                save_to TEXT NOT NULL,
                state TEXT NOT NULL,
                saved_target TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or update the row for `job`. `created_at` is preserved on
    /// update.
    pub async fn upsert_job(&self, job: &Job) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO jobs (id, url, save_to, state, saved_target, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                save_to = excluded.save_to,
                state = excluded.state,
                saved_target = excluded.saved_target,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&job.id)
        .bind(&job.url)
        .bind(job.save_to.to_string_lossy().to_string())
        .bind(job.status().as_str())
        .bind(
            job.saved_target()
                .map(|p| p.to_string_lossy().to_string()),
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List all jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, url, save_to, state, saved_target
            FROM jobs
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(record_from_row(&row));
        }
        Ok(out)
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, url, save_to, state, saved_target
            FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| record_from_row(&r)))
    }

    /// Permanently remove a job row. File cleanup is handled by higher
    /// layers.
    pub async fn remove_job(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Recover jobs a previous host left mid-flight: transitional states
    /// land on Paused (resumable), an interrupted stop lands on Stopped.
    /// Returns the number of rows touched.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let now = unix_timestamp();
        let stopped = sqlx::query(
            "UPDATE jobs SET state = 'stopped', updated_at = ?1 WHERE state = 'stopping'",
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let paused = sqlx::query(
            r#"
            UPDATE jobs SET state = 'paused', updated_at = ?1
            WHERE state IN ('starting', 'active', 'pausing')
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(stopped + paused)
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> JobRecord {
    let id: String = row.get("id");
    let url: String = row.get("url");
    let save_to: String = row.get("save_to");
    let state: String = row.get("state");
    let saved_target: Option<String> = row.get("saved_target");
    JobRecord {
        id,
        url,
        save_to: PathBuf::from(save_to),
        state: JobStatus::from_str(&state),
        saved_target: saved_target.map(PathBuf::from),
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
