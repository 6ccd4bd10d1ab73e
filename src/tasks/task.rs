//! # RpcTask: the pluggable unit of work behind one RPC method.
//!
//! A task body is stateless with respect to the handler: it receives its
//! validated parameters and a [`ChannelLogger`], does its work, and returns a
//! JSON payload or a [`TaskError`]. Everything else (isolation, deadlines,
//! cancellation, state tracking) is the handler's job.
//!
//! Parameter validation happens **before** any execution unit exists:
//! [`RpcTask::parse_params`] is the declared-schema boundary, typically a
//! typed serde deserialization via [`params_from_map`].
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use serde::Deserialize;
//! use serde_json::{json, Map, Value};
//! use callvisor::{params_from_map, ChannelLogger, RpcError, RpcTask, TaskError};
//!
//! #[derive(Deserialize)]
//! struct CompileParams {
//!     target: String,
//! }
//!
//! struct CompileTask;
//!
//! #[async_trait]
//! impl RpcTask for CompileTask {
//!     fn method_name(&self) -> &str {
//!         "compile"
//!     }
//!
//!     fn parse_params(&self, params: Map<String, Value>) -> Result<Value, RpcError> {
//!         let parsed: CompileParams = params_from_map(params)?;
//!         Ok(json!({ "target": parsed.target }))
//!     }
//!
//!     async fn handle_request(
//!         &self,
//!         params: Value,
//!         log: ChannelLogger,
//!     ) -> Result<Value, TaskError> {
//!         log.info(format!("compiling {}", params["target"]));
//!         Ok(json!({ "compiled": true }))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{RpcError, TaskError};
use crate::messages::ChannelLogger;

/// Shared handle to a task body.
pub type TaskRef = Arc<dyn RpcTask>;

/// Business logic executed inside one call's execution unit.
#[async_trait]
pub trait RpcTask: Send + Sync + 'static {
    /// The RPC method name this body serves.
    fn method_name(&self) -> &str;

    /// Validates and normalizes the raw parameter map against the body's
    /// declared schema. Runs on the caller's side, before the execution unit
    /// is created; a failure here rejects the call as invalid parameters.
    fn parse_params(&self, params: Map<String, Value>) -> Result<Value, RpcError>;

    /// Executes the call with validated parameters.
    ///
    /// All logging must go through `log`; records are forwarded to the
    /// supervisor while the call is in flight. Fail with
    /// [`TaskError::Domain`] for known bad input/state, a pre-shaped
    /// [`TaskError::Rpc`] to bypass classification, or
    /// [`TaskError::Internal`] for anything else.
    async fn handle_request(&self, params: Value, log: ChannelLogger) -> Result<Value, TaskError>;
}

/// Deserializes a raw parameter map into a typed parameter struct, mapping
/// serde failures into [`RpcError::InvalidParameters`].
pub fn params_from_map<T: DeserializeOwned>(params: Map<String, Value>) -> Result<T, RpcError> {
    serde_json::from_value(Value::Object(params)).map_err(|err| RpcError::invalid_params(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Params {
        name: String,
        #[serde(default)]
        count: u32,
    }

    #[test]
    fn test_params_from_map_accepts_valid_input() {
        let mut map = Map::new();
        map.insert("name".into(), json!("users"));
        map.insert("count".into(), json!(7));

        let parsed: Params = params_from_map(map).unwrap();
        assert_eq!(parsed.name, "users");
        assert_eq!(parsed.count, 7);
    }

    #[test]
    fn test_params_from_map_rejects_missing_field() {
        let map = Map::new();
        let err = params_from_map::<Params>(map).unwrap_err();
        assert_eq!(err.as_label(), "invalid_parameters");
        assert!(err.as_message().contains("name"));
    }

    #[test]
    fn test_params_from_map_rejects_wrong_type() {
        let mut map = Map::new();
        map.insert("name".into(), json!(13));
        let err = params_from_map::<Params>(map).unwrap_err();
        assert_eq!(err.as_label(), "invalid_parameters");
    }
}
