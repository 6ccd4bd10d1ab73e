//! # RequestTaskHandler: supervises one inbound call end to end.
//!
//! One handler exists per call. It validates parameters, spawns the isolated
//! execution unit and a supervising unit, and tracks the call through the
//! lifecycle state machine:
//!
//! ```text
//! handle(params)
//!   ├─► record started, advance Initializing
//!   ├─► strip optional `timeout` from params
//!   ├─► task.parse_params()          ── invalid ──► state Error, reject
//!   ├─► build channel + subscriber
//!   ├─► bypass mode? ──► run bootstrap + supervision in place, return result
//!   └─► isolated mode:
//!         ├─► pre-spawn cleanup hook
//!         ├─► spawn task_bootstrap()          (execution unit)
//!         ├─► advance Running
//!         ├─► spawn CallSupervisor::run()     (supervising unit)
//!         └─► return Accepted { request_token }
//!
//! CallSupervisor::run
//!   ├─► dispatch_until_exit          (sole suspension point)
//!   │      ├─ Result(v)  ──► join unit, outcome Ok(v)
//!   │      ├─ Error(e)   ──► outcome Err(e)
//!   │      └─ Timeout    ──► abort unit + cancel token, Err(Timeout)
//!   └─► record ended, publish outcome, advance Success/Error
//!
//! get_result()
//!   └─► join supervising unit, return payload+logs or FailedCall
//! ```
//!
//! ## Shared-state rules
//! - `state`, `logs`, `outcome`, `ended` live in an `Arc`ed publication
//!   surface ([`HandlerShared`]): single writer (the supervising path), any
//!   number of lock-free / read-locked readers (status, list, kill). Nothing
//!   is ever observed torn.
//! - The handler exclusively owns its unit handles; the subscriber moves
//!   into the supervising unit when it starts.
//! - Timeouts are enforceable in isolated mode only; bypass mode has no
//!   separate unit to terminate.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::HandlerConfig;
use crate::error::{FailedCall, RpcError};
use crate::messages::{LogRecord, LogSink, QueueSubscriber, Terminal};
use crate::state::{StateCell, TaskHandlerState};
use crate::tasks::TaskRef;

use super::bootstrap::task_bootstrap;
use super::registry::RequestRegistry;

/// JSON-RPC request id as received from the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Where the call came from, as reported by the protocol layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMeta {
    /// Remote address or equivalent source tag.
    pub source: String,
    /// Caller-assigned request id.
    pub id: RequestId,
}

impl RequestMeta {
    pub fn new(source: impl Into<String>, id: impl Into<RequestId>) -> Self {
        RequestMeta {
            source: source.into(),
            id: id.into(),
        }
    }
}

/// Successful call outcome: the payload plus the ordered log sequence
/// accumulated while the call ran.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteResult {
    pub payload: Value,
    pub logs: Vec<LogRecord>,
}

/// What `handle()` returns to the protocol layer.
#[derive(Debug)]
pub enum HandleOutcome {
    /// Isolated mode: async admission. The caller polls completion
    /// separately, keyed by the request token.
    Accepted {
        /// The call's unique identifier.
        request_token: Uuid,
    },
    /// Bypass mode: the call ran synchronously to completion.
    Completed(RemoteResult),
}

/// Publication surface shared between the supervising path and concurrent
/// status/kill readers.
struct HandlerShared {
    state: StateCell,
    logs: LogSink,
    outcome: RwLock<Option<Result<Value, RpcError>>>,
    ended: RwLock<Option<SystemTime>>,
}

impl HandlerShared {
    fn new() -> Arc<Self> {
        Arc::new(HandlerShared {
            state: StateCell::new(),
            logs: Arc::new(RwLock::new(Vec::new())),
            outcome: RwLock::new(None),
            ended: RwLock::new(None),
        })
    }

    /// Publishes the terminal outcome. `ended` is recorded before the state
    /// flips, so a finished state always implies a populated outcome and
    /// end timestamp.
    fn record_outcome(&self, outcome: Result<Value, RpcError>) {
        let next = if outcome.is_ok() {
            TaskHandlerState::Success
        } else {
            TaskHandlerState::Error
        };
        *write(&self.ended) = Some(SystemTime::now());
        *write(&self.outcome) = Some(outcome);
        self.state.advance(next);
    }

    /// Publishes an error outcome only if none was recorded yet. Used when
    /// the supervising unit itself dies unexpectedly.
    fn record_fallback_error(&self, error: RpcError) {
        let mut slot = write(&self.outcome);
        if slot.is_none() {
            *write(&self.ended) = Some(SystemTime::now());
            *slot = Some(Err(error));
            self.state.advance(TaskHandlerState::Error);
        }
    }

    fn outcome_clone(&self) -> Option<Result<Value, RpcError>> {
        read(&self.outcome).clone()
    }

    fn logs_snapshot(&self) -> Vec<LogRecord> {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Body of the supervising unit for one call.
struct CallSupervisor {
    shared: Arc<HandlerShared>,
    subscriber: QueueSubscriber,
    /// Execution unit handle; `None` in bypass mode.
    process: Option<JoinHandle<()>>,
    kill_token: CancellationToken,
    started: Instant,
    timeout: Option<Duration>,
}

impl CallSupervisor {
    /// Runs to a recorded outcome in all cases: success, structured failure,
    /// or an internal dispatch error.
    async fn run(mut self) {
        let outcome = self.collect_result().await;
        self.shared.record_outcome(outcome);
    }

    async fn collect_result(&mut self) -> Result<Value, RpcError> {
        let result = self.wait_for_results().await;
        // Join the execution unit whatever happened, so no detached unit
        // outlives its call. An aborted unit yields a JoinError, which is
        // exactly what we asked for.
        if let Some(process) = self.process.take() {
            let _ = process.await;
        }
        result
    }

    /// Waits on the dispatcher for the terminal message. Terminates the
    /// execution unit on timeout (isolated mode only).
    async fn wait_for_results(&mut self) -> Result<Value, RpcError> {
        let terminal = self
            .subscriber
            .dispatch_until_exit(self.started, self.timeout)
            .await?;
        match terminal {
            Terminal::Result(payload) => Ok(payload),
            Terminal::Error(error) => Err(error),
            Terminal::Timeout => {
                if let Some(process) = &self.process {
                    process.abort();
                    self.kill_token.cancel();
                }
                Err(RpcError::Timeout {
                    timeout: self.timeout.unwrap_or(Duration::ZERO),
                })
            }
        }
    }
}

/// Handler for the single task triggered by one JSON-RPC request.
pub struct RequestTaskHandler {
    task: TaskRef,
    request: RequestMeta,
    cfg: HandlerConfig,
    task_id: Uuid,
    kill_token: CancellationToken,
    shared: Arc<HandlerShared>,
    /// Abort handle to the execution unit (status/diagnostics); the
    /// `JoinHandle` itself moves into the supervising unit.
    process: Option<AbortHandle>,
    /// Supervising unit handle, joined by `get_result`.
    thread: Option<JoinHandle<()>>,
    timeout: Option<Duration>,
    started: Option<SystemTime>,
}

impl RequestTaskHandler {
    /// Creates a handler for one admitted call. Nothing runs until
    /// [`handle`](RequestTaskHandler::handle) is invoked.
    ///
    /// The [`SINGLE_THREADED_ENV`](crate::SINGLE_THREADED_ENV) override is
    /// folded into the config here: when it is set, this handler runs in
    /// bypass-isolation mode whatever its per-call flag says.
    pub fn new(task: TaskRef, request: RequestMeta, mut cfg: HandlerConfig) -> Self {
        cfg.single_threaded = cfg.single_threaded || crate::config::env_forces_single_threaded();
        RequestTaskHandler {
            task,
            request,
            cfg,
            task_id: Uuid::new_v4(),
            kill_token: CancellationToken::new(),
            shared: HandlerShared::new(),
            process: None,
            thread: None,
            timeout: None,
            started: None,
        }
    }

    /// Registers with the admission registry, then handles the call.
    pub async fn admit(
        &mut self,
        registry: &dyn RequestRegistry,
        params: Map<String, Value>,
    ) -> Result<HandleOutcome, RpcError> {
        registry.add_request(self);
        self.handle(params).await
    }

    /// Admits one call: validates parameters, then either runs it in place
    /// (bypass mode) or spawns the execution and supervising units and
    /// returns an acknowledgement immediately.
    ///
    /// `InvalidParameters` and `InternalMisuse` are returned directly from
    /// here; runtime failures surface later via
    /// [`get_result`](RequestTaskHandler::get_result).
    pub async fn handle(
        &mut self,
        mut params: Map<String, Value>,
    ) -> Result<HandleOutcome, RpcError> {
        if self.started.is_some() {
            return Err(RpcError::misuse("handle() called twice on one handler"));
        }
        let started = Instant::now();
        self.started = Some(SystemTime::now());
        self.shared.state.advance(TaskHandlerState::Initializing);

        self.timeout = match take_timeout(&mut params) {
            Ok(timeout) => timeout,
            Err(err) => {
                self.shared.state.advance(TaskHandlerState::Error);
                return Err(err);
            }
        };

        let parsed = match self.task.parse_params(params) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.shared.state.advance(TaskHandlerState::Error);
                return Err(ensure_invalid_params(err));
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = QueueSubscriber::new(rx, Arc::clone(&self.shared.logs));
        let bootstrap = task_bootstrap(
            Arc::clone(&self.task),
            tx,
            parsed,
            self.kill_token.clone(),
        );

        if self.cfg.single_threaded {
            return self.handle_singlethreaded(bootstrap, subscriber, started).await;
        }

        // Shared resources (pooled connections etc.) must be reset before a
        // new execution unit exists, never inherited across the boundary.
        if let Some(cleanup) = &self.cfg.cleanup {
            cleanup();
        }
        let process = tokio::spawn(bootstrap);
        self.process = Some(process.abort_handle());
        self.shared.state.advance(TaskHandlerState::Running);

        let supervisor = CallSupervisor {
            shared: Arc::clone(&self.shared),
            subscriber,
            process: Some(process),
            kill_token: self.kill_token.clone(),
            started,
            timeout: self.timeout,
        };
        self.thread = Some(tokio::spawn(supervisor.run()));

        Ok(HandleOutcome::Accepted {
            request_token: self.task_id,
        })
    }

    /// Bypass-isolation mode: the bootstrap and the supervising body run in
    /// place, synchronously, through the same terminal-message and
    /// state-transition path as isolated mode. Structured failures are
    /// re-raised to the synchronous caller (and also recorded on the
    /// handler). Timeouts cannot be enforced here.
    async fn handle_singlethreaded(
        &mut self,
        bootstrap: impl Future<Output = ()>,
        subscriber: QueueSubscriber,
        started: Instant,
    ) -> Result<HandleOutcome, RpcError> {
        bootstrap.await;
        let supervisor = CallSupervisor {
            shared: Arc::clone(&self.shared),
            subscriber,
            process: None,
            kill_token: self.kill_token.clone(),
            started,
            timeout: self.timeout,
        };
        supervisor.run().await;

        match self.shared.outcome_clone() {
            Some(Ok(payload)) => Ok(HandleOutcome::Completed(RemoteResult {
                payload,
                logs: self.logs(),
            })),
            Some(Err(error)) => Err(error),
            None => Err(RpcError::server_error(
                "call finished without recording an outcome",
            )),
        }
    }

    /// Joins the supervising unit and returns the call's outcome, with the
    /// accumulated ordered log sequence attached to both the success and the
    /// failure shape.
    ///
    /// Calling this before [`handle`](RequestTaskHandler::handle) has run to
    /// admission is internal misuse.
    pub async fn get_result(&mut self) -> Result<RemoteResult, FailedCall> {
        if let Some(thread) = self.thread.take() {
            if let Err(join_err) = thread.await {
                self.shared.record_fallback_error(RpcError::server_error(format!(
                    "supervising unit failed: {join_err}"
                )));
            }
        }
        match self.shared.outcome_clone() {
            Some(Ok(payload)) => Ok(RemoteResult {
                payload,
                logs: self.logs(),
            }),
            Some(Err(error)) => Err(FailedCall::new(error, self.logs())),
            None => Err(FailedCall::bare(RpcError::misuse(
                "get_result() called before handle()",
            ))),
        }
    }

    /// Requests termination of the call's execution unit. The bootstrap
    /// converts this into a structured `Killed` error, so the supervising
    /// unit still observes exactly one terminal message and finishes its
    /// state transition.
    pub fn kill(&self) {
        self.kill_token.cancel();
    }

    /// Current lifecycle state (lock-free read).
    pub fn state(&self) -> TaskHandlerState {
        self.shared.state.load()
    }

    /// The RPC method this handler serves.
    pub fn method(&self) -> &str {
        self.task.method_name()
    }

    /// Unique call identifier; also the request token in the ack.
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Caller-provided request metadata.
    pub fn request(&self) -> &RequestMeta {
        &self.request
    }

    /// Configured deadline, if the call carried one.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// When `handle()` admitted the call.
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started
    }

    /// When the call reached a terminal state.
    pub fn ended_at(&self) -> Option<SystemTime> {
        *read(&self.shared.ended)
    }

    /// Snapshot of the logs accumulated so far, in emission order.
    pub fn logs(&self) -> Vec<LogRecord> {
        self.shared.logs_snapshot()
    }

    /// The recorded structured error, once the call failed.
    pub fn error(&self) -> Option<RpcError> {
        match self.shared.outcome_clone() {
            Some(Err(error)) => Some(error),
            _ => None,
        }
    }

    /// The recorded payload, once the call succeeded.
    pub fn result(&self) -> Option<Value> {
        match self.shared.outcome_clone() {
            Some(Ok(payload)) => Some(payload),
            _ => None,
        }
    }
}

/// Strips the optional numeric `timeout` (seconds) from the parameter set
/// before schema validation sees it.
fn take_timeout(params: &mut Map<String, Value>) -> Result<Option<Duration>, RpcError> {
    match params.remove("timeout") {
        None | Some(Value::Null) => Ok(None),
        // try_from: a finite but astronomically large value must be
        // rejected, not panic the handler.
        Some(value) => match value.as_f64().map(Duration::try_from_secs_f64) {
            Some(Ok(timeout)) => Ok(Some(timeout)),
            _ => Err(RpcError::invalid_params(format!(
                "timeout must be a representable non-negative number of seconds, got {value}"
            ))),
        },
    }
}

/// Validation failures always surface as `InvalidParameters`, whatever shape
/// the task body reported them in.
fn ensure_invalid_params(err: RpcError) -> RpcError {
    match err {
        err @ RpcError::InvalidParameters { .. } => err,
        other => RpcError::invalid_params(other.as_message()),
    }
}
