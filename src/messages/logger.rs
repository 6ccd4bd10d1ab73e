//! # ChannelLogger — execution-unit side of the message channel.
//!
//! Inside an execution unit there is no local log sink: every record a task
//! body emits goes straight onto the channel, so the supervisor can forward
//! it to the caller-visible log while the call is still in flight. The same
//! handle emits the single terminal message when the body finishes.
//!
//! Sends are fire-and-forget: if the supervisor side is gone (handler torn
//! down), records are silently dropped rather than failing the body.

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::RpcError;

use super::message::{LogLevel, LogRecord, Message};

/// Cloneable handle for a task body to log through, bound to the call's
/// message channel.
#[derive(Clone, Debug)]
pub struct ChannelLogger {
    tx: UnboundedSender<Message>,
}

impl ChannelLogger {
    /// Wraps the sending half of a call's message channel.
    pub fn new(tx: UnboundedSender<Message>) -> Self {
        ChannelLogger { tx }
    }

    /// Forwards one record onto the channel.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let _ = self.tx.send(Message::Log(LogRecord::now(level, message)));
    }

    /// Logs at debug level.
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    /// Logs at info level.
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Logs at warn level.
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    /// Logs at error level.
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Emits the terminal success message.
    pub(crate) fn emit_result(&self, payload: Value) {
        let _ = self.tx.send(Message::Result(payload));
    }

    /// Emits the terminal error message.
    pub(crate) fn emit_error(&self, error: RpcError) {
        let _ = self.tx.send(Message::Error(error));
    }
}
