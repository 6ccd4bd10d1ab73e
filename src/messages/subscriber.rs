//! # QueueSubscriber — supervisor side of the message channel.
//!
//! Drains one call's channel until a terminal message arrives or the call's
//! deadline expires.
//!
//! ## Rules
//! - Each `Log` message is appended to the caller-visible sink **immediately**
//!   (live progress, not buffered until the terminal message).
//! - The first terminal message is returned as a [`Terminal`], a type that
//!   cannot carry log traffic.
//! - With a configured timeout, deadline expiry synthesizes
//!   [`Terminal::Timeout`]; the execution unit never sends one itself.
//! - A channel that closes without a terminal message means the execution
//!   unit died un-observably; that is reported as a server error so the
//!   supervising unit can still finish its state transition.
//!
//! This receive loop is the sole suspension point of the supervising unit
//! while a call is in flight.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{self, Instant};

use crate::error::RpcError;

use super::message::{LogRecord, Message};

/// Shared, ordered log sink for one call. Written by the dispatcher,
/// read concurrently by status paths.
pub(crate) type LogSink = Arc<RwLock<Vec<LogRecord>>>;

/// How one call's dispatch loop ended. Unlike [`Message`] this can only be
/// terminal; `Log` traffic is consumed inside the loop.
#[derive(Debug, Clone)]
pub enum Terminal {
    /// The task body returned a payload.
    Result(Value),
    /// The task body failed with a structured error.
    Error(RpcError),
    /// The deadline expired before a terminal message arrived.
    Timeout,
}

/// Receiving half of a call's message channel, bound to its log sink.
pub struct QueueSubscriber {
    rx: UnboundedReceiver<Message>,
    sink: LogSink,
}

impl QueueSubscriber {
    pub(crate) fn new(rx: UnboundedReceiver<Message>, sink: LogSink) -> Self {
        QueueSubscriber { rx, sink }
    }

    /// Receives until a terminal message or deadline expiry.
    ///
    /// `started` is the call's admission instant; the deadline is
    /// `started + timeout` when a timeout is configured. Returns the
    /// [`Terminal`] outcome; `Log` messages never escape the loop.
    ///
    /// Queued messages are always drained before the deadline is considered,
    /// so a terminal message that arrived in time is never misreported as a
    /// timeout.
    pub async fn dispatch_until_exit(
        &mut self,
        started: Instant,
        timeout: Option<Duration>,
    ) -> Result<Terminal, RpcError> {
        let deadline = timeout.map(|t| started + t);
        loop {
            let received = match deadline {
                Some(deadline) => match time::timeout_at(deadline, self.rx.recv()).await {
                    Ok(msg) => msg,
                    Err(_elapsed) => return Ok(Terminal::Timeout),
                },
                None => self.rx.recv().await,
            };

            match received {
                Some(Message::Log(record)) => self.push_log(record),
                Some(Message::Result(payload)) => return Ok(Terminal::Result(payload)),
                Some(Message::Error(error)) => return Ok(Terminal::Error(error)),
                None => {
                    return Err(RpcError::server_error(
                        "execution unit exited without a terminal message",
                    ))
                }
            }
        }
    }

    fn push_log(&self, record: LogRecord) {
        self.sink
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}
