//! Seam to the content-provider adapter.
//!
//! The adapter that knows the remote service (endpoints, response bodies,
//! naming metadata) lives outside this crate; the aggregator only depends on
//! this interface.

use anyhow::Result;

use crate::rename::RenameContext;

/// One remote resource in a work's ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    pub url: String,
}

impl RemoteResource {
    pub fn new(url: impl Into<String>) -> Self {
        RemoteResource { url: url.into() }
    }
}

/// Adapter for one remote work: where its resource list lives, how to parse
/// it, and the naming context for rename templates.
pub trait WorkProvider: Send + Sync {
    /// Stable identity of the work; used for archive naming and job identity.
    fn work_id(&self) -> &str;

    /// Endpoint returning the ordered resource list for this work.
    fn resource_list_url(&self) -> String;

    /// Parse the endpoint's body into the ordered resource list. Order is
    /// preserved downstream; an error here is fatal for the job.
    fn parse_resource_list(&self, body: &[u8]) -> Result<Vec<RemoteResource>>;

    /// Naming context for rename templates. `page_num` is the zero-based
    /// cursor of the resource being named.
    fn rename_context(&self, page_num: Option<usize>) -> RenameContext;
}
