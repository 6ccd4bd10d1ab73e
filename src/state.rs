//! # Call lifecycle state machine.
//!
//! [`TaskHandlerState`] tags the phase of one inbound call:
//!
//! ```text
//! NotStarted ──► Initializing ──► Running ──► Success
//!                     │                  └──► Error
//!                     └────────────────────► Error   (invalid parameters)
//! ```
//!
//! ## Ordering
//! States carry a logical total order for status-merging logic:
//!
//! ```text
//! NotStarted < Initializing < Running < {Success, Error}
//! ```
//!
//! `Success` and `Error` are **strictly incomparable** (`partial_cmp` returns
//! `None`, so `<` and `>` are both false between them), but both satisfy
//! [`finished`](TaskHandlerState::finished), and `<=`/`>=` treat any two
//! finished states as equal. This finished-collapse relation is deliberate:
//! downstream status merging relies on `Success <= Error` and
//! `Error <= Success` both holding.
//!
//! ## Rules
//! - Transitions are **monotonic**: a state never moves backwards.
//! - Only the supervising path advances state; everyone else reads through
//!   [`StateCell`], which is lock-free and never observes a torn value.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU8, Ordering as AtomicOrdering};

/// Lifecycle phase of a single request task handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskHandlerState {
    /// Handler constructed, `handle()` not yet called.
    NotStarted = 0,
    /// Parameters being extracted and validated.
    Initializing = 1,
    /// Execution unit spawned, supervising unit watching the channel.
    Running = 2,
    /// Terminal: the call produced a payload.
    Success = 3,
    /// Terminal: the call produced a structured error.
    Error = 4,
}

impl TaskHandlerState {
    /// True for the two terminal states.
    #[inline]
    pub fn finished(self) -> bool {
        matches!(self, TaskHandlerState::Success | TaskHandlerState::Error)
    }

    /// Position in the lifecycle order. Both finished states share a rank,
    /// which is what makes them strictly incomparable to each other.
    #[inline]
    fn rank(self) -> u8 {
        match self {
            TaskHandlerState::NotStarted => 0,
            TaskHandlerState::Initializing => 1,
            TaskHandlerState::Running => 2,
            TaskHandlerState::Success | TaskHandlerState::Error => 3,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> TaskHandlerState {
        match raw {
            0 => TaskHandlerState::NotStarted,
            1 => TaskHandlerState::Initializing,
            2 => TaskHandlerState::Running,
            3 => TaskHandlerState::Success,
            _ => TaskHandlerState::Error,
        }
    }

    /// Short stable label (snake_case) for logs and status listings.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskHandlerState::NotStarted => "not_started",
            TaskHandlerState::Initializing => "initializing",
            TaskHandlerState::Running => "running",
            TaskHandlerState::Success => "success",
            TaskHandlerState::Error => "error",
        }
    }
}

impl PartialOrd for TaskHandlerState {
    /// Strict lifecycle comparison. `Success` vs `Error` is `None`.
    fn partial_cmp(&self, other: &TaskHandlerState) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        if self.finished() && other.finished() {
            // Distinct terminal states: no strict order between them.
            return None;
        }
        Some(self.rank().cmp(&other.rank()))
    }

    #[inline]
    fn lt(&self, other: &TaskHandlerState) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Less))
    }

    #[inline]
    fn gt(&self, other: &TaskHandlerState) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Greater))
    }

    /// Finished-collapse: any two finished states satisfy `<=`.
    #[inline]
    fn le(&self, other: &TaskHandlerState) -> bool {
        self.lt(other) || self == other || (self.finished() && other.finished())
    }

    /// Finished-collapse: any two finished states satisfy `>=`.
    #[inline]
    fn ge(&self, other: &TaskHandlerState) -> bool {
        self.gt(other) || self == other || (self.finished() && other.finished())
    }
}

/// Atomic, monotonically advancing holder of a [`TaskHandlerState`].
///
/// The supervising path is the only writer; status and kill paths read
/// concurrently without a lock. Backward transitions are ignored, so a
/// finished state can never be un-finished by a late writer.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Creates a cell in [`TaskHandlerState::NotStarted`].
    pub fn new() -> Self {
        StateCell(AtomicU8::new(TaskHandlerState::NotStarted as u8))
    }

    /// Returns the current state.
    #[inline]
    pub fn load(&self) -> TaskHandlerState {
        TaskHandlerState::from_u8(self.0.load(AtomicOrdering::Acquire))
    }

    /// Advances to `to` if that is a forward move; returns whether the
    /// transition was applied.
    pub fn advance(&self, to: TaskHandlerState) -> bool {
        self.0
            .fetch_update(AtomicOrdering::AcqRel, AtomicOrdering::Acquire, |raw| {
                let current = TaskHandlerState::from_u8(raw);
                if to.rank() > current.rank() {
                    Some(to as u8)
                } else {
                    None
                }
            })
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        StateCell::new()
    }
}
