//! Integration tests for the work queue against a scripted stand-in worker
//! process speaking the wire protocol over stdin/stdout.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use wdm_core::job::{Job, JobStatus};
use wdm_core::queue::{Payload, WorkQueue};
use wdm_core::worker::pool::WorkerPool;
use wdm_core::worker::WorkerKind;

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-worker.sh");
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Responds to every conversion request with a progress message and a
/// finish, except sources containing "fail", which error.
const OBEDIENT_WORKER: &str = r#"#!/bin/sh
while read line; do
  case "$line" in
    *fail.zip*) echo '{"status":"error","message":"synthetic transcoder failure"}' ;;
    *) echo '{"status":"progress","progress":0.5}'; echo '{"status":"finish"}' ;;
  esac
done
"#;

fn queue_with_worker(dir: &Path, script: &str) -> WorkQueue {
    let worker = write_script(dir, script);
    let job = Job::new("convert", "", dir);
    WorkQueue::new(job, WorkerPool::new(Some(worker)))
}

#[tokio::test]
async fn queue_drains_through_worker_process() {
    let dir = tempfile::tempdir().unwrap();
    let mut queue = queue_with_worker(dir.path(), OBEDIENT_WORKER);
    queue
        .add_payload(Payload::new(
            dir.path().join("a.zip"),
            dir.path().join("a.mp4"),
        ))
        .add_payload(Payload::new(
            dir.path().join("b.zip"),
            dir.path().join("b.mp4"),
        ));

    queue.start().await.unwrap();

    assert_eq!(queue.job().status(), JobStatus::Finished);
    assert_eq!(queue.job().progress(), 1.0);
    assert_eq!(queue.jobs_left(), 0);
    // One process served both payloads.
    assert!(queue.pool_mut().is_spawned(WorkerKind::AnimEncode));

    queue.pool_mut().shutdown().await.unwrap();
    assert!(!queue.pool_mut().is_spawned(WorkerKind::AnimEncode));
}

#[tokio::test]
async fn worker_error_does_not_halt_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let mut queue = queue_with_worker(dir.path(), OBEDIENT_WORKER);
    queue
        .add_payload(Payload::new(
            dir.path().join("a.zip"),
            dir.path().join("a.mp4"),
        ))
        .add_payload(Payload::new(
            dir.path().join("fail.zip"),
            dir.path().join("fail.mp4"),
        ))
        .add_payload(Payload::new(
            dir.path().join("c.zip"),
            dir.path().join("c.mp4"),
        ));

    queue.start().await.unwrap();

    // The failing payload was logged and skipped, the rest completed.
    assert_eq!(queue.job().status(), JobStatus::Finished);
    assert_eq!(queue.jobs_left(), 0);
    assert_eq!(queue.job().progress(), 1.0);

    queue.pool_mut().shutdown().await.unwrap();
}

#[tokio::test]
async fn existing_destination_skips_the_worker() {
    let dir = tempfile::tempdir().unwrap();
    // The "worker" kills itself on first contact; if the queue ever talks to
    // it, the test fails loudly.
    let mut queue = queue_with_worker(dir.path(), "#!/bin/sh\nexit 7\n");

    let destination = dir.path().join("done.mp4");
    std::fs::write(&destination, b"already produced").unwrap();
    queue.add_payload(Payload::new(dir.path().join("done.zip"), &destination));

    queue.start().await.unwrap();

    assert_eq!(queue.job().status(), JobStatus::Finished);
    assert!(
        !queue.pool_mut().is_spawned(WorkerKind::AnimEncode),
        "no worker may be spawned for an already-produced payload"
    );
}

#[tokio::test]
async fn dead_worker_counts_as_unit_failure_and_respawns() {
    let dir = tempfile::tempdir().unwrap();
    // Exits immediately: every payload sees EOF instead of a response.
    let mut queue = queue_with_worker(dir.path(), "#!/bin/sh\nexit 0\n");
    queue
        .add_payload(Payload::new(
            dir.path().join("a.zip"),
            dir.path().join("a.mp4"),
        ))
        .add_payload(Payload::new(
            dir.path().join("b.zip"),
            dir.path().join("b.mp4"),
        ));

    queue.start().await.unwrap();

    // Both units were counted as failures; the queue still drained.
    assert_eq!(queue.job().status(), JobStatus::Finished);
    assert_eq!(queue.jobs_left(), 0);
}
