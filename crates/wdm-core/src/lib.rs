//! WDM core engine: job lifecycle, work queues, download aggregation, and
//! worker orchestration.
//!
//! The embedding shell (UI, IPC bridge) and the content-provider adapter
//! live outside this crate and plug in at the `provider` and `fetch` seams.

pub mod config;
pub mod logging;

pub mod aggregate;
pub mod control;
pub mod download;
pub mod error;
pub mod fetch;
pub mod job;
pub mod provider;
pub mod queue;
pub mod registry;
pub mod rename;
pub mod worker;
