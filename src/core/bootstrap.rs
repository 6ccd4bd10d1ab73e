//! # Bootstrap: first thing that runs inside an execution unit.
//!
//! The bootstrap owns the execution side of the call contract:
//!
//! 1. bind logging to the channel (a [`ChannelLogger`] over the call's
//!    sender — there is no local sink inside the unit);
//! 2. race the task body against the kill token, behind a panic boundary;
//! 3. classify whatever came out into the structured error taxonomy;
//! 4. emit **exactly one** terminal message.
//!
//! ```text
//! body returns payload        ──► Result(payload)
//! body fails TaskError::Rpc   ──► Error(err)            (forwarded unchanged)
//! kill token cancelled        ──► Error(Killed)         (never logged)
//! body fails TaskError::Domain──► Error(Domain)         (+ debug log)
//! body fails/panics otherwise ──► Error(ServerError)    (+ debug log)
//! ```
//!
//! ## Rules
//! - The killed path must not touch the logger: the supervisor may already
//!   have torn the channel down, and logging there risks a deadlock.
//! - A panic in the body is contained by `catch_unwind` and reported as a
//!   server error; it never crosses the isolation boundary raw.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::error::{RpcError, TaskError};
use crate::messages::{ChannelLogger, Message};
use crate::tasks::TaskRef;

/// Runs one call inside its execution unit and emits the terminal message.
pub(crate) async fn task_bootstrap(
    task: TaskRef,
    tx: UnboundedSender<Message>,
    params: Value,
    kill_token: CancellationToken,
) {
    let logger = ChannelLogger::new(tx);

    let body = AssertUnwindSafe(task.handle_request(params, logger.clone())).catch_unwind();
    tokio::pin!(body);

    let body_result = tokio::select! {
        res = &mut body => Some(res),
        _ = kill_token.cancelled() => None,
    };

    let terminal = match body_result {
        // Killed: convert to a structured error, do NOT log (see Rules).
        None => Err(RpcError::Killed),
        Some(Err(panic_payload)) => {
            let detail = panic_message(panic_payload.as_ref());
            logger.debug(format!("uncaught panic in task body: {detail}"));
            Err(RpcError::server_error(detail))
        }
        Some(Ok(Ok(payload))) => Ok(payload),
        Some(Ok(Err(err))) => Err(classify(err, &logger)),
    };

    match terminal {
        Ok(payload) => logger.emit_result(payload),
        Err(error) => logger.emit_error(error),
    }
}

/// Maps a task-body failure into the caller-facing taxonomy, logging
/// diagnostic detail for the classified kinds.
fn classify(err: TaskError, logger: &ChannelLogger) -> RpcError {
    match err {
        TaskError::Rpc(rpc) => rpc,
        TaskError::Domain { message } => {
            logger.debug(format!("domain error during request handling: {message}"));
            RpcError::Domain { message }
        }
        TaskError::Internal { message } => {
            logger.debug(format!("unclassified failure during request handling: {message}"));
            RpcError::server_error(message)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct Body<F>(F);

    #[async_trait]
    impl<F> crate::tasks::RpcTask for Body<F>
    where
        F: Fn() -> Result<Value, TaskError> + Send + Sync + 'static,
    {
        fn method_name(&self) -> &str {
            "test_body"
        }

        fn parse_params(&self, params: Map<String, Value>) -> Result<Value, RpcError> {
            Ok(Value::Object(params))
        }

        async fn handle_request(
            &self,
            _params: Value,
            log: ChannelLogger,
        ) -> Result<Value, TaskError> {
            log.info("working");
            (self.0)()
        }
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(msg) = rx.recv().await {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_success_emits_logs_then_single_result() {
        let (tx, rx) = mpsc::unbounded_channel();
        let task: TaskRef = Arc::new(Body(|| Ok(json!({"n": 1}))));
        task_bootstrap(task, tx, Value::Null, CancellationToken::new()).await;

        let messages = drain(rx).await;
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], Message::Log(_)));
        assert!(matches!(messages[1], Message::Result(_)));
    }

    #[tokio::test]
    async fn test_domain_error_is_classified_and_logged() {
        let (tx, rx) = mpsc::unbounded_channel();
        let task: TaskRef = Arc::new(Body(|| Err(TaskError::domain("table not found"))));
        task_bootstrap(task, tx, Value::Null, CancellationToken::new()).await;

        let messages = drain(rx).await;
        // info log, debug classification log, terminal error
        assert_eq!(messages.len(), 3);
        match &messages[2] {
            Message::Error(err) => {
                assert_eq!(err.as_label(), "domain_error");
                assert!(err.as_message().contains("table not found"));
            }
            other => panic!("expected error terminal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_preshaped_rpc_error_forwarded_unchanged() {
        let (tx, rx) = mpsc::unbounded_channel();
        let task: TaskRef = Arc::new(Body(|| {
            Err(TaskError::Rpc(RpcError::server_error("custom")))
        }));
        task_bootstrap(task, tx, Value::Null, CancellationToken::new()).await;

        let messages = drain(rx).await;
        // no extra classification log for pre-shaped errors
        assert_eq!(messages.len(), 2);
        match &messages[1] {
            Message::Error(err) => assert_eq!(err, &RpcError::server_error("custom")),
            other => panic!("expected error terminal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_killed_before_start_emits_only_killed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        token.cancel();

        struct Hang;
        #[async_trait]
        impl crate::tasks::RpcTask for Hang {
            fn method_name(&self) -> &str {
                "hang"
            }
            fn parse_params(&self, params: Map<String, Value>) -> Result<Value, RpcError> {
                Ok(Value::Object(params))
            }
            async fn handle_request(
                &self,
                _params: Value,
                _log: ChannelLogger,
            ) -> Result<Value, TaskError> {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(Value::Null)
            }
        }

        task_bootstrap(Arc::new(Hang), tx, Value::Null, token).await;
        let messages = drain(rx).await;
        assert_eq!(messages.len(), 1, "killed path must not log");
        assert!(matches!(&messages[0], Message::Error(RpcError::Killed)));
    }

    #[tokio::test]
    async fn test_body_panic_becomes_server_error() {
        struct Boom;
        #[async_trait]
        impl crate::tasks::RpcTask for Boom {
            fn method_name(&self) -> &str {
                "boom"
            }
            fn parse_params(&self, params: Map<String, Value>) -> Result<Value, RpcError> {
                Ok(Value::Object(params))
            }
            async fn handle_request(
                &self,
                _params: Value,
                _log: ChannelLogger,
            ) -> Result<Value, TaskError> {
                panic!("boom: {}", 42);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        task_bootstrap(Arc::new(Boom), tx, Value::Null, CancellationToken::new()).await;

        let messages = drain(rx).await;
        let terminal = messages.last().unwrap();
        match terminal {
            Message::Error(err) => {
                assert_eq!(err.as_label(), "server_error");
                assert!(err.as_message().contains("boom: 42"));
            }
            other => panic!("expected error terminal, got {other:?}"),
        }
    }
}
