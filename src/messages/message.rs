//! # Messages exchanged execution-unit → supervisor.
//!
//! One ordered channel carries the whole conversation for a call:
//!
//! ```text
//! Log(record)*  ──►  Result(payload) | Error(error)
//! ```
//!
//! ## Rules
//! - A well-behaved execution unit emits any number of `Log` messages and
//!   then **exactly one** of `Result` / `Error`.
//! - Timeouts never travel over the channel; the dispatcher synthesizes
//!   them on its side when the deadline expires (see
//!   [`Terminal`](super::Terminal)).
//! - The terminal message is always the last message observed for a call;
//!   traffic after it is undefined and never relied upon.

use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;

use crate::error::RpcError;

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Short stable label (lowercase) for rendering.
    pub fn as_label(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// One log line emitted by a task body, forwarded over the channel and
/// attached to the call's final result or error.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Wall-clock timestamp at emission.
    pub at: SystemTime,
    /// Severity.
    pub level: LogLevel,
    /// Rendered message text.
    pub message: String,
}

impl LogRecord {
    /// Creates a record stamped with the current wall-clock time.
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        LogRecord {
            at: SystemTime::now(),
            level,
            message: message.into(),
        }
    }
}

/// A message on the execution-unit → supervisor channel.
#[derive(Debug, Clone)]
pub enum Message {
    /// A forwarded log record; zero or more before the terminal message.
    Log(LogRecord),
    /// Terminal: the task body returned a payload.
    Result(Value),
    /// Terminal: the task body failed with a structured error.
    Error(RpcError),
}

impl Message {
    /// True for the two terminal variants.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Message::Log(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_predicate() {
        assert!(!Message::Log(LogRecord::now(LogLevel::Info, "x")).is_terminal());
        assert!(Message::Result(Value::Null).is_terminal());
        assert!(Message::Error(RpcError::Killed).is_terminal());
    }

    #[test]
    fn test_log_record_serializes_level_lowercase() {
        let rec = LogRecord::now(LogLevel::Warn, "careful");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["level"], "warn");
        assert_eq!(json["message"], "careful");
    }
}
