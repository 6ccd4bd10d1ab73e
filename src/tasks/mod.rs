//! # Task body abstractions.
//!
//! - [`RpcTask`] - trait every RPC method's business logic implements
//! - [`TaskRef`] - shared reference to a task body (`Arc<dyn RpcTask>`)
//! - [`params_from_map`] - serde helper for typed parameter validation

mod task;

pub use task::{params_from_map, RpcTask, TaskRef};
