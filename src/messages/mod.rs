//! Cross-unit message protocol: types, channel-bound logger, dispatcher.
//!
//! This module groups everything that travels over the ordered channel
//! between an execution unit and its supervising unit.
//!
//! ## Contents
//! - [`Message`], [`LogRecord`], [`LogLevel`] — the wire data model
//! - [`ChannelLogger`] — execution-unit side: forwards log records and emits
//!   the single terminal message
//! - [`QueueSubscriber`] — supervisor side: drains the channel, forwards
//!   logs immediately, returns the first terminal message or synthesizes a
//!   timeout
//!
//! ```text
//! execution unit                              supervising unit
//!   ChannelLogger ── Log* ── terminal ──►  QueueSubscriber::dispatch_until_exit
//! ```

mod logger;
mod message;
mod subscriber;

pub use logger::ChannelLogger;
pub use message::{LogLevel, LogRecord, Message};
pub use subscriber::{QueueSubscriber, Terminal};

pub(crate) use subscriber::LogSink;
