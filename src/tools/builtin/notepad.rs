//! Session notepad tools.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::store::{NoteSection, NoteSelector, NotepadStore};
use crate::tools::tool::{Tool, ToolError, ToolOutput, optional_str};

// ── omx_note_read ───────────────────────────────────────────────────

pub struct NoteReadTool {
    store: Arc<NotepadStore>,
}

impl NoteReadTool {
    pub fn new(store: Arc<NotepadStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NoteReadTool {
    fn name(&self) -> &str {
        "omx_note_read"
    }

    fn description(&self) -> &str {
        "Read the session notepad. Sections: 'priority' (always-loaded context, max 500 chars), \
         'working' (timestamped entries, auto-pruned after 7 days), 'manual' (permanent entries), \
         or 'all' for everything."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "section": {
                    "type": "string",
                    "enum": ["all", "priority", "working", "manual"],
                    "description": "Section to read. Default: 'all'."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let selector = match optional_str(&params, "section") {
            Some(raw) => raw.parse::<NoteSelector>().map_err(ToolError::InvalidParameters)?,
            None => NoteSelector::All,
        };
        let notes = self.store.read(selector).await;
        Ok(ToolOutput::success(notes, start.elapsed()))
    }
}

// ── omx_note_write ──────────────────────────────────────────────────

pub struct NoteWriteTool {
    store: Arc<NotepadStore>,
}

impl NoteWriteTool {
    pub fn new(store: Arc<NotepadStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NoteWriteTool {
    fn name(&self) -> &str {
        "omx_note_write"
    }

    fn description(&self) -> &str {
        "Write to the session notepad. For 'priority': replaces content (max 500 chars). \
         For 'working': adds a timestamped entry. For 'manual': adds a permanent entry."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "section": {
                    "type": "string",
                    "enum": ["priority", "working", "manual"],
                    "description": "Section to write to."
                },
                "content": { "type": "string", "description": "Content to write." }
            },
            "required": ["section", "content"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let (Some(raw_section), Some(content)) = (
            optional_str(&params, "section"),
            optional_str(&params, "content"),
        ) else {
            return Err(ToolError::InvalidParameters(
                "section and content required.".into(),
            ));
        };
        let section: NoteSection = raw_section.parse().map_err(ToolError::InvalidParameters)?;

        self.store.write(section, content).await?;
        Ok(ToolOutput::success(
            json!({ "ok": true, "section": section.as_str() }),
            start.elapsed(),
        ))
    }
}
