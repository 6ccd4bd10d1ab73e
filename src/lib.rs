//! # callvisor
//!
//! **Callvisor** is the per-request task handler of a local JSON-RPC server:
//! given one inbound call, it runs the call's work in an isolated execution
//! unit, observes its progress over an ordered message channel, enforces a
//! deadline, and produces a structured result or structured error back to
//! the protocol layer.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   RPC dispatch (external)
//!        │  one call
//!        ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  RequestTaskHandler (one per call)                            │
//! │  - StateCell: NotStarted → Initializing → Running → Success   │
//! │                                                  └──► Error   │
//! │  - kill token (cancellation)                                  │
//! │  - shared logs / outcome (read by status & kill paths)        │
//! └──────┬─────────────────────────────┬──────────────────────────┘
//!        ▼ spawn                       ▼ spawn
//! ┌────────────────────┐      ┌─────────────────────────────┐
//! │  execution unit    │      │  supervising unit           │
//! │  task_bootstrap()  │      │  CallSupervisor::run()      │
//! │  - channel logging │      │  - dispatch_until_exit()    │
//! │  - kill → Killed   │      │  - deadline → Timeout       │
//! │  - classification  │      │  - abort + join on timeout  │
//! │  - ONE terminal    │      │  - records ended/outcome,   │
//! │    message         │      │    advances state           │
//! └─────────┬──────────┘      └──────────────▲──────────────┘
//!           │   Log* then Result|Error       │
//!           └───────── ordered channel ──────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! handle(params)
//!   ├─► Initializing: strip `timeout`, validate via RpcTask::parse_params
//!   │     └─ invalid ─► state Error, InvalidParameters (no unit spawned)
//!   ├─► bypass mode ─► bootstrap + supervision run in place, result returned
//!   └─► isolated mode ─► cleanup hook, spawn both units, state Running,
//!                        return Accepted { request_token }
//!
//! get_result()
//!   └─► join supervising unit
//!         ├─ Success ─► RemoteResult { payload, logs }
//!         └─ Error   ─► FailedCall  { error,   logs }
//! ```
//!
//! ## Guarantees
//! - Exactly one terminal message per call (`Result`, `Error`, or a
//!   dispatcher-synthesized `Timeout`); log records arrive in emission order
//!   and are visible to status readers while the call is still running.
//! - A crash, hang, or kill inside the task body never leaves the handler's
//!   state machine unfinished: panics are contained at the unit boundary,
//!   kills become structured `Killed` errors, deadlines abort the unit.
//! - Bypass-isolation mode (per-call flag or the process-wide
//!   [`SINGLE_THREADED_ENV`] override) goes through the same
//!   terminal-message and state-transition path; only the isolation itself
//!   (and therefore timeout enforcement) is skipped.
//!
//! ## Features
//! | Area          | Description                                              | Key types                                  |
//! |---------------|----------------------------------------------------------|--------------------------------------------|
//! | **Handling**  | Admission, supervision, result retrieval, kill.          | [`RequestTaskHandler`], [`HandleOutcome`]   |
//! | **Task API**  | Pluggable per-method business logic.                     | [`RpcTask`], [`TaskRef`]                    |
//! | **Protocol**  | Channel messages and the caller-visible log stream.      | [`Message`], [`Terminal`], [`LogRecord`], [`ChannelLogger`] |
//! | **Lifecycle** | Ordered call states with the finished-collapse relation. | [`TaskHandlerState`], [`StateCell`]         |
//! | **Errors**    | Structured caller-facing taxonomy with stable codes.     | [`RpcError`], [`TaskError`], [`FailedCall`] |
//! | **Config**    | Bypass mode and the pre-spawn cleanup hook.              | [`HandlerConfig`]                           |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::{json, Map, Value};
//! use callvisor::{
//!     ChannelLogger, HandleOutcome, HandlerConfig, RequestMeta, RequestTaskHandler,
//!     RpcError, RpcTask, TaskError,
//! };
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl RpcTask for Ping {
//!     fn method_name(&self) -> &str {
//!         "ping"
//!     }
//!
//!     fn parse_params(&self, params: Map<String, Value>) -> Result<Value, RpcError> {
//!         Ok(Value::Object(params))
//!     }
//!
//!     async fn handle_request(
//!         &self,
//!         _params: Value,
//!         log: ChannelLogger,
//!     ) -> Result<Value, TaskError> {
//!         log.info("pong incoming");
//!         Ok(json!({ "pong": true }))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut handler = RequestTaskHandler::new(
//!         Arc::new(Ping),
//!         RequestMeta::new("127.0.0.1", 1),
//!         HandlerConfig::from_env(),
//!     );
//!
//!     match handler.handle(Map::new()).await? {
//!         HandleOutcome::Accepted { request_token } => {
//!             println!("admitted call {request_token}");
//!             let result = handler.get_result().await?;
//!             assert_eq!(result.payload["pong"], true);
//!         }
//!         HandleOutcome::Completed(result) => {
//!             // bypass-isolation mode returns the result synchronously
//!             assert_eq!(result.payload["pong"], true);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod messages;
mod state;
mod tasks;

// ---- Public re-exports ----

pub use config::{CleanupHook, HandlerConfig, SINGLE_THREADED_ENV};
pub use self::core::{
    HandleOutcome, RemoteResult, RequestId, RequestMeta, RequestRegistry, RequestTaskHandler,
};
pub use error::{FailedCall, RpcError, TaskError};
pub use messages::{ChannelLogger, LogLevel, LogRecord, Message, QueueSubscriber, Terminal};
pub use state::{StateCell, TaskHandlerState};
pub use tasks::{params_from_map, RpcTask, TaskRef};
