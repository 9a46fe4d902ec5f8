//! Workflow mode state tools.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::store::StateStore;
use crate::tools::tool::{Tool, ToolError, ToolOutput, flag, optional_object, optional_str, require_str};

// ── omx_state_read ──────────────────────────────────────────────────

pub struct StateReadTool {
    store: Arc<StateStore>,
}

impl StateReadTool {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for StateReadTool {
    fn name(&self) -> &str {
        "omx_state_read"
    }

    fn description(&self) -> &str {
        "Read the state for a workflow mode (autopilot, plan, research, tdd, etc.). \
         Returns the JSON state, or exists: false if no state is stored."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": {
                    "type": "string",
                    "description": "Mode name: autopilot, plan, research, tdd, review, analyze, or any custom name."
                }
            },
            "required": ["mode"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let mode = require_str(&params, "mode")?;
        let state = self
            .store
            .read(mode)
            .await?
            .unwrap_or_else(|| json!({ "exists": false, "mode": mode }));
        Ok(ToolOutput::success(state, start.elapsed()))
    }
}

// ── omx_state_write ─────────────────────────────────────────────────

pub struct StateWriteTool {
    store: Arc<StateStore>,
}

impl StateWriteTool {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for StateWriteTool {
    fn name(&self) -> &str {
        "omx_state_write"
    }

    fn description(&self) -> &str {
        "Write or update state for a workflow mode. Pass a JSON object with the state data. \
         Merges with existing state by default."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "description": "Mode name." },
                "data": {
                    "type": "object",
                    "description": "State data to write/merge.",
                    "additionalProperties": true
                },
                "replace": {
                    "type": "boolean",
                    "description": "If true, replaces state entirely instead of merging. Default: false."
                }
            },
            "required": ["mode", "data"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let (Some(mode), Some(data)) = (
            optional_str(&params, "mode"),
            optional_object(&params, "data"),
        ) else {
            return Err(ToolError::InvalidParameters(
                "mode and data are required.".into(),
            ));
        };

        let state = self
            .store
            .write(mode, data.clone(), flag(&params, "replace"))
            .await?;
        Ok(ToolOutput::success(
            json!({ "ok": true, "mode": mode, "state": state }),
            start.elapsed(),
        ))
    }
}

// ── omx_state_clear ─────────────────────────────────────────────────

pub struct StateClearTool {
    store: Arc<StateStore>,
}

impl StateClearTool {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for StateClearTool {
    fn name(&self) -> &str {
        "omx_state_clear"
    }

    fn description(&self) -> &str {
        "Clear/delete state for a workflow mode."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "description": "Mode name to clear." }
            },
            "required": ["mode"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let mode = require_str(&params, "mode")?;
        self.store.clear(mode).await?;
        Ok(ToolOutput::success(
            json!({ "ok": true, "mode": mode, "cleared": true }),
            start.elapsed(),
        ))
    }
}

// ── omx_state_list ──────────────────────────────────────────────────

pub struct StateListTool {
    store: Arc<StateStore>,
}

impl StateListTool {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for StateListTool {
    fn name(&self) -> &str {
        "omx_state_list"
    }

    fn description(&self) -> &str {
        "List all active workflow modes with their state summaries."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let modes = self.store.list().await?;
        if modes.is_empty() {
            return Ok(ToolOutput::text("No active modes.", start.elapsed()));
        }
        ToolOutput::json(&modes, start.elapsed())
    }
}
