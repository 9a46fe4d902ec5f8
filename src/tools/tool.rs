//! The `Tool` trait and the values that flow through it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{JobError, StoreError};

/// Error returned by a tool invocation. Rendered to the caller as
/// `Error: <message>` with the error flag set.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidParameters(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ExecutionFailed(String),
}

impl From<JobError> for ToolError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound { .. } => Self::NotFound(err.to_string()),
            JobError::InvalidRequest(message) => Self::InvalidParameters(message),
        }
    }
}

impl From<StoreError> for ToolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidKey { .. } => Self::InvalidParameters(err.to_string()),
            other => Self::ExecutionFailed(other.to_string()),
        }
    }
}

/// Successful tool result.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub result: Value,
    pub duration: Duration,
}

impl ToolOutput {
    /// A structured (JSON) result.
    pub fn success(result: Value, duration: Duration) -> Self {
        Self { result, duration }
    }

    /// A plain text result.
    pub fn text(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            result: Value::String(text.into()),
            duration,
        }
    }

    /// Serialize any value as the result.
    pub fn json<T: Serialize>(value: &T, duration: Duration) -> Result<Self, ToolError> {
        let result = serde_json::to_value(value)
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to encode result: {e}")))?;
        Ok(Self { result, duration })
    }

    /// Text shown to the caller: strings verbatim, everything else as
    /// pretty-printed JSON.
    pub fn render(&self) -> String {
        match &self.result {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

/// Name, description and argument schema of a tool, as advertised to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A capability exposed to MCP clients.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema (an object schema) for the arguments.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError>;
}

/// A non-empty string argument, or `None`.
pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// A required non-empty string argument.
pub fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    optional_str(params, key)
        .ok_or_else(|| ToolError::InvalidParameters(format!("{key} is required.")))
}

/// An object argument, or `None`.
pub fn optional_object<'a>(params: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    params.get(key).and_then(Value::as_object)
}

/// A boolean flag; anything but `true` counts as false.
pub fn flag(params: &Value, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}
