//! Asynchronous Claude Code delegation: start, poll, cancel, list.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::jobs::{JobOrchestrator, StatusFilter};
use crate::tools::tool::{Tool, ToolError, ToolOutput, optional_str, require_str};

// ── claude_code ─────────────────────────────────────────────────────

/// Starts a job and returns its id immediately.
pub struct ClaudeCodeTool {
    jobs: JobOrchestrator,
}

impl ClaudeCodeTool {
    pub fn new(jobs: JobOrchestrator) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Tool for ClaudeCodeTool {
    fn name(&self) -> &str {
        "claude_code"
    }

    fn description(&self) -> &str {
        "Start a Claude Code task asynchronously. Returns a job ID immediately, so the call \
         never times out. Claude Code has full filesystem access: it can read, write and edit \
         files, run shell commands, search codebases, and perform multi-step coding tasks. \
         Use claude_code_status to wait for results. Use claude_code_cancel to abort."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Task instructions for Claude Code. ALWAYS include \
                                    'Your work folder is /absolute/path' at the start."
                },
                "workFolder": {
                    "type": "string",
                    "description": "Absolute path to working directory. Defaults to $HOME."
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let prompt = require_str(&params, "prompt")?;
        let work_folder = optional_str(&params, "workFolder");

        let job_id = self.jobs.create_job(prompt, work_folder).await?;

        Ok(ToolOutput::success(
            json!({
                "jobId": job_id,
                "status": "running",
                "message": format!(
                    "Job started. Call claude_code_status(jobId: \"{job_id}\") to wait for results."
                ),
            }),
            start.elapsed(),
        ))
    }
}

// ── claude_code_status ──────────────────────────────────────────────

/// Long-polls a job until it finishes or the wait runs out.
pub struct ClaudeCodeStatusTool {
    jobs: JobOrchestrator,
}

impl ClaudeCodeStatusTool {
    pub fn new(jobs: JobOrchestrator) -> Self {
        Self { jobs }
    }
}

/// `waitSeconds` as sent by the client. Numeric strings are accepted; any
/// other non-number means "don't wait".
fn wait_seconds(params: &Value) -> Option<f64> {
    match params.get("waitSeconds")? {
        Value::Null => None,
        Value::Number(n) => Some(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => Some(s.trim().parse().unwrap_or(f64::NAN)),
        _ => Some(f64::NAN),
    }
}

#[async_trait]
impl Tool for ClaudeCodeStatusTool {
    fn name(&self) -> &str {
        "claude_code_status"
    }

    fn description(&self) -> &str {
        "Wait for a Claude Code job to finish (long-polling). Waits up to waitSeconds \
         (default 25, max 25) for completion. If done, returns full output. If still running, \
         returns partial output and a hint to call again. Keep calling this in a loop until \
         status is 'completed' or 'failed'. Never times out."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "jobId": { "type": "string", "description": "Job ID from claude_code." },
                "waitSeconds": {
                    "type": "number",
                    "description": "Max seconds to wait (default 25, max 25). 0 for instant check."
                }
            },
            "required": ["jobId"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let job_id = require_str(&params, "jobId")?;
        let snapshot = self.jobs.get_status(job_id, wait_seconds(&params)).await?;
        ToolOutput::json(&snapshot, start.elapsed())
    }
}

// ── claude_code_cancel ──────────────────────────────────────────────

pub struct ClaudeCodeCancelTool {
    jobs: JobOrchestrator,
}

impl ClaudeCodeCancelTool {
    pub fn new(jobs: JobOrchestrator) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Tool for ClaudeCodeCancelTool {
    fn name(&self) -> &str {
        "claude_code_cancel"
    }

    fn description(&self) -> &str {
        "Cancel a running Claude Code job."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "jobId": { "type": "string", "description": "Job ID to cancel." }
            },
            "required": ["jobId"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let job_id = require_str(&params, "jobId")?;
        let outcome = self.jobs.cancel_job(job_id).await?;
        Ok(ToolOutput::text(outcome.message(), start.elapsed()))
    }
}

// ── claude_code_list ────────────────────────────────────────────────

pub struct ClaudeCodeListTool {
    jobs: JobOrchestrator,
}

impl ClaudeCodeListTool {
    pub fn new(jobs: JobOrchestrator) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Tool for ClaudeCodeListTool {
    fn name(&self) -> &str {
        "claude_code_list"
    }

    fn description(&self) -> &str {
        "List all Claude Code jobs with status. Newest first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["all", "running", "completed", "failed", "cancelled"],
                    "description": "Filter by status. Default: 'all'."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let filter = match optional_str(&params, "status") {
            Some(raw) => raw.parse::<StatusFilter>().map_err(|_| {
                ToolError::InvalidParameters(
                    "status must be one of all, running, completed, failed, cancelled.".into(),
                )
            })?,
            None => StatusFilter::All,
        };

        let jobs = self.jobs.list_jobs(filter).await;
        if jobs.is_empty() {
            return Ok(ToolOutput::text("No jobs found.", start.elapsed()));
        }
        ToolOutput::json(&jobs, start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_seconds_parsing() {
        assert_eq!(wait_seconds(&json!({})), None);
        assert_eq!(wait_seconds(&json!({"waitSeconds": null})), None);
        assert_eq!(wait_seconds(&json!({"waitSeconds": 3})), Some(3.0));
        assert_eq!(wait_seconds(&json!({"waitSeconds": "2.5"})), Some(2.5));
        assert!(wait_seconds(&json!({"waitSeconds": "soon"})).unwrap().is_nan());
        assert!(wait_seconds(&json!({"waitSeconds": true})).unwrap().is_nan());
    }
}
