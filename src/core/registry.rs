//! # Admission interface (consumed).
//!
//! The surrounding RPC server keeps a registry of outstanding handlers so
//! that status/list/kill operations can find them. The handler core does not
//! implement that bookkeeping; it only calls [`RequestRegistry::add_request`]
//! once per inbound call, before `handle` runs.
//!
//! Eviction of finished handlers is the registry's job and out of scope
//! here.

use super::handler::RequestTaskHandler;

/// Registry of outstanding request handlers, owned by the RPC server.
pub trait RequestRegistry: Send + Sync {
    /// Records a newly admitted handler. Called exactly once per call,
    /// before the handler starts processing parameters.
    fn add_request(&self, handler: &RequestTaskHandler);
}
