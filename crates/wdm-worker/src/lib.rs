//! WDM transcoding worker.
//!
//! Spawned by the host as a long-lived process; serves one transcode
//! request at a time over the stdin/stdout line protocol defined in
//! `wdm_core::worker::protocol`.

pub mod manifest;
pub mod pipeline;
pub mod service;
pub mod transcode;
