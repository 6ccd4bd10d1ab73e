//! Handler core: bootstrap, supervision, and admission.
//!
//! This module contains the per-call runtime of callvisor. The main public
//! API is [`RequestTaskHandler`], which orchestrates one inbound call:
//! execution-unit creation, the supervising unit, the dispatcher, and the
//! lifecycle state machine.
//!
//! Internal modules:
//! - [`bootstrap`]: entry point that runs inside the execution unit —
//!   channel-bound logging, kill conversion, failure classification, the
//!   single terminal message;
//! - [`handler`]: admission, supervision, result retrieval, cancellation;
//! - [`registry`]: the consumed admission interface (`add_request`).

mod bootstrap;
mod handler;
mod registry;

pub use handler::{HandleOutcome, RemoteResult, RequestId, RequestMeta, RequestTaskHandler};
pub use registry::RequestRegistry;
