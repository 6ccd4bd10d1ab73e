//! # Handler configuration.
//!
//! [`HandlerConfig`] controls the two knobs the handler core honors:
//!
//! - **bypass-isolation mode** (`single_threaded`): run the call's bootstrap
//!   synchronously in the caller's own context instead of spawning an
//!   execution unit. Driven per call, or process-wide via the
//!   [`SINGLE_THREADED_ENV`] environment override.
//! - **pre-spawn cleanup hook**: a zero-argument callback invoked immediately
//!   before an execution unit is spawned, for resetting shared resources
//!   (pooled connections and the like) that must not be aliased across the
//!   isolation boundary. Not invoked in bypass mode, where nothing is
//!   spawned.
//!
//! # Example
//! ```
//! use callvisor::HandlerConfig;
//!
//! let cfg = HandlerConfig::from_env().with_single_threaded(true);
//! assert!(cfg.single_threaded);
//! ```

use std::fmt;
use std::sync::Arc;

/// Zero-argument callback run before spawning an execution unit.
pub type CleanupHook = Arc<dyn Fn() + Send + Sync>;

/// Process-wide override: when set to a truthy value, every handler runs in
/// bypass-isolation mode regardless of its per-call flag. Every handler
/// folds it into its config at construction; no config path can opt out.
pub const SINGLE_THREADED_ENV: &str = "CALLVISOR_SINGLE_THREADED_HANDLER";

/// Per-handler configuration.
#[derive(Clone, Default)]
pub struct HandlerConfig {
    /// Bypass-isolation mode: run calls synchronously, no execution unit.
    ///
    /// Timeouts are not enforceable in this mode; there is no separate unit
    /// to terminate.
    pub single_threaded: bool,
    /// Optional pre-spawn cleanup of inheritable shared resources.
    pub cleanup: Option<CleanupHook>,
}

impl HandlerConfig {
    /// A default configuration: isolated mode, no cleanup hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`HandlerConfig::new`], but honors the [`SINGLE_THREADED_ENV`]
    /// process-wide override.
    pub fn from_env() -> Self {
        HandlerConfig {
            single_threaded: env_set_truthy(SINGLE_THREADED_ENV),
            cleanup: None,
        }
    }

    /// Sets bypass-isolation mode for this handler.
    #[must_use]
    pub fn with_single_threaded(mut self, single_threaded: bool) -> Self {
        self.single_threaded = single_threaded;
        self
    }

    /// Installs the pre-spawn cleanup hook.
    #[must_use]
    pub fn with_cleanup(mut self, hook: CleanupHook) -> Self {
        self.cleanup = Some(hook);
        self
    }
}

impl fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("single_threaded", &self.single_threaded)
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// True when [`SINGLE_THREADED_ENV`] currently forces bypass mode. The
/// handler consults this for every call it is constructed for, so the
/// override wins over any per-handler flag.
pub(crate) fn env_forces_single_threaded() -> bool {
    env_set_truthy(SINGLE_THREADED_ENV)
}

/// True when the variable is set to anything other than an empty or
/// conventional "off" value.
fn env_set_truthy(name: &str) -> bool {
    match std::env::var(name) {
        Ok(value) => is_truthy(&value),
        Err(_) => false,
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}
