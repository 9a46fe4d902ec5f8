//! Project memory tools.
//!
//! Memory lives inside the project itself (`<workFolder>/.omx/memory.json`)
//! and holds things like the tech stack, build commands and conventions.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::store::MemoryStore;
use crate::tools::tool::{Tool, ToolError, ToolOutput, flag, optional_object, optional_str, require_str};

// ── omx_memory_read ─────────────────────────────────────────────────

pub struct MemoryReadTool {
    store: MemoryStore,
}

impl MemoryReadTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryReadTool {
    fn name(&self) -> &str {
        "omx_memory_read"
    }

    fn description(&self) -> &str {
        "Read project memory for a given work folder. Stores tech stack, conventions, \
         build commands, notes: anything that should persist across sessions for this project."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "workFolder": {
                    "type": "string",
                    "description": "Project root directory. Required."
                }
            },
            "required": ["workFolder"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let work_folder = require_str(&params, "workFolder")?;
        let memory = self
            .store
            .read(work_folder)
            .await?
            .unwrap_or_else(|| json!({ "exists": false, "workFolder": work_folder }));
        Ok(ToolOutput::success(memory, start.elapsed()))
    }
}

// ── omx_memory_write ────────────────────────────────────────────────

pub struct MemoryWriteTool {
    store: MemoryStore,
}

impl MemoryWriteTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryWriteTool {
    fn name(&self) -> &str {
        "omx_memory_write"
    }

    fn description(&self) -> &str {
        "Write/update project memory for a given work folder. Merges with existing memory."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "workFolder": {
                    "type": "string",
                    "description": "Project root directory."
                },
                "data": {
                    "type": "object",
                    "description": "Memory data to merge. Common keys: techStack, buildCommand, \
                                    testCommand, conventions, structure, notes.",
                    "additionalProperties": true
                },
                "replace": {
                    "type": "boolean",
                    "description": "If true, replaces memory entirely. Default: false."
                }
            },
            "required": ["workFolder", "data"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let (Some(work_folder), Some(data)) = (
            optional_str(&params, "workFolder"),
            optional_object(&params, "data"),
        ) else {
            return Err(ToolError::InvalidParameters(
                "workFolder and data required.".into(),
            ));
        };

        self.store
            .write(work_folder, data.clone(), flag(&params, "replace"))
            .await?;
        Ok(ToolOutput::success(
            json!({ "ok": true, "workFolder": work_folder }),
            start.elapsed(),
        ))
    }
}
