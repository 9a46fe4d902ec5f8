//! Drives the built-in tool catalogue end to end, the way an MCP client would.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

use omx::config::OrchestratorConfig;
use omx::jobs::JobOrchestrator;
use omx::store::{NotepadStore, StateStore};
use omx::tools::{ToolError, ToolRegistry};

/// Stand-in for the Claude CLI: runs the `-p` argument as a shell script.
const FAKE_CLI: &str = r#"
while [ $# -gt 0 ]; do
  if [ "$1" = "-p" ]; then
    shift
    eval "$1"
    exit $?
  fi
  shift
done
exit 64
"#;

struct Harness {
    tools: ToolRegistry,
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let jobs = JobOrchestrator::new(OrchestratorConfig {
            program: PathBuf::from("sh"),
            program_args: vec!["-c".into(), FAKE_CLI.into(), "fake-cli".into()],
            home: dir.path().to_path_buf(),
            kill_grace: Duration::from_millis(500),
            ..OrchestratorConfig::default()
        });
        let omx_dir = dir.path().join(".omx-home");
        let tools = ToolRegistry::with_builtins(
            &jobs,
            Arc::new(StateStore::new(omx_dir.join("state"))),
            Arc::new(NotepadStore::new(omx_dir.join("notepad.json"))),
        );
        Self { tools, dir }
    }

    async fn call(&self, name: &str, params: Value) -> Result<String, ToolError> {
        self.tools
            .execute(name, params)
            .await
            .map(|output| output.render())
    }

    async fn call_json(&self, name: &str, params: Value) -> Value {
        let text = self.call(name, params).await.unwrap();
        serde_json::from_str(&text).unwrap_or_else(|_| panic!("not JSON: {text}"))
    }
}

#[tokio::test]
async fn catalogue_lists_every_tool_sorted() {
    let h = Harness::new();
    let names: Vec<String> = h
        .tools
        .tool_definitions()
        .await
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(
        names,
        vec![
            "claude_code",
            "claude_code_cancel",
            "claude_code_list",
            "claude_code_status",
            "omx_memory_read",
            "omx_memory_write",
            "omx_note_read",
            "omx_note_write",
            "omx_state_clear",
            "omx_state_list",
            "omx_state_read",
            "omx_state_write",
        ]
    );
    for def in h.tools.tool_definitions().await {
        assert_eq!(def.parameters["type"], "object", "{}", def.name);
    }
}

#[tokio::test]
async fn job_lifecycle_through_tools() {
    let h = Harness::new();
    assert_eq!(
        h.call("claude_code_list", json!({})).await.unwrap(),
        "No jobs found."
    );

    let started = h
        .call_json("claude_code", json!({"prompt": "echo delegated"}))
        .await;
    assert_eq!(started["status"], "running");
    let job_id = started["jobId"].as_str().unwrap().to_string();
    assert_eq!(job_id.len(), 8);
    assert!(started["message"].as_str().unwrap().contains(&job_id));

    let status = h
        .call_json(
            "claude_code_status",
            json!({"jobId": job_id, "waitSeconds": 10}),
        )
        .await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["output"], "delegated\n");
    assert_eq!(status["exitCode"], 0);
    assert_eq!(
        PathBuf::from(status["workFolder"].as_str().unwrap()),
        h.dir.path()
    );

    let cancel = h
        .call("claude_code_cancel", json!({"jobId": job_id}))
        .await
        .unwrap();
    assert_eq!(cancel, format!("Job {job_id} already completed."));

    let listed = h
        .call_json("claude_code_list", json!({"status": "completed"}))
        .await;
    assert_eq!(listed[0]["jobId"], job_id.as_str());
    assert_eq!(listed[0]["promptPreview"], "echo delegated");
}

#[tokio::test]
async fn running_job_can_be_cancelled() {
    let h = Harness::new();
    let started = h
        .call_json("claude_code", json!({"prompt": "echo partial; sleep 30"}))
        .await;
    let job_id = started["jobId"].as_str().unwrap().to_string();

    let status = h
        .call_json(
            "claude_code_status",
            json!({"jobId": job_id, "waitSeconds": 1}),
        )
        .await;
    assert_eq!(status["status"], "running");
    assert_eq!(status["outputTail"], "partial\n");
    assert_eq!(status["hint"], "Still running. Call claude_code_status again.");

    let cancel = h
        .call("claude_code_cancel", json!({"jobId": job_id}))
        .await
        .unwrap();
    assert_eq!(cancel, format!("Job {job_id} cancelled."));

    let status = h
        .call_json(
            "claude_code_status",
            json!({"jobId": job_id, "waitSeconds": 0}),
        )
        .await;
    assert_eq!(status["status"], "cancelled");
}

#[tokio::test]
async fn job_tool_argument_errors() {
    let h = Harness::new();
    let err = h.call("claude_code", json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "prompt is required.");

    let err = h
        .call("claude_code_status", json!({"jobId": "ffffffff"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::NotFound(_)));

    let err = h
        .call("claude_code_list", json!({"status": "stuck"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidParameters(_)));

    let err = h.call("no_such_tool", json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "Unknown tool: no_such_tool");
}

#[tokio::test]
async fn state_tools_round_trip() {
    let h = Harness::new();
    assert_eq!(
        h.call("omx_state_list", json!({})).await.unwrap(),
        "No active modes."
    );
    assert_eq!(
        h.call_json("omx_state_read", json!({"mode": "autopilot"}))
            .await,
        json!({"exists": false, "mode": "autopilot"})
    );

    let written = h
        .call_json(
            "omx_state_write",
            json!({"mode": "autopilot", "data": {"phase": "plan", "active": true}}),
        )
        .await;
    assert_eq!(written["ok"], true);
    assert_eq!(written["state"]["_mode"], "autopilot");

    let read = h
        .call_json("omx_state_read", json!({"mode": "autopilot"}))
        .await;
    assert_eq!(read["phase"], "plan");

    let listed = h.call_json("omx_state_list", json!({})).await;
    assert_eq!(listed[0]["mode"], "autopilot");
    assert_eq!(listed[0]["active"], true);
    assert_eq!(listed[0]["phase"], "plan");

    let cleared = h
        .call_json("omx_state_clear", json!({"mode": "autopilot"}))
        .await;
    assert_eq!(cleared, json!({"ok": true, "mode": "autopilot", "cleared": true}));

    let err = h
        .call("omx_state_write", json!({"mode": "x", "data": "not an object"}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "mode and data are required.");
}

#[tokio::test]
async fn notepad_tools_round_trip() {
    let h = Harness::new();
    let ok = h
        .call_json(
            "omx_note_write",
            json!({"section": "working", "content": "investigating flaky test"}),
        )
        .await;
    assert_eq!(ok, json!({"ok": true, "section": "working"}));

    let working = h
        .call_json("omx_note_read", json!({"section": "working"}))
        .await;
    assert_eq!(working["working"][0]["content"], "investigating flaky test");

    let all = h.call_json("omx_note_read", json!({})).await;
    assert_eq!(all["priority"], "");
    assert_eq!(all["manual"], json!([]));

    let err = h
        .call("omx_note_write", json!({"section": "scratch", "content": "x"}))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "section must be priority, working, or manual."
    );
    let err = h
        .call("omx_note_read", json!({"section": "scratch"}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid section.");
}

#[tokio::test]
async fn memory_tools_round_trip() {
    let h = Harness::new();
    let project = h.dir.path().join("project");
    let wf = project.to_string_lossy().into_owned();

    assert_eq!(
        h.call_json("omx_memory_read", json!({"workFolder": wf}))
            .await,
        json!({"exists": false, "workFolder": wf})
    );

    h.call_json(
        "omx_memory_write",
        json!({"workFolder": wf, "data": {"notes": ["uses tokio"]}}),
    )
    .await;
    let ok = h
        .call_json(
            "omx_memory_write",
            json!({"workFolder": wf, "data": {"notes": ["no unwrap"], "buildCommand": "make"}}),
        )
        .await;
    assert_eq!(ok, json!({"ok": true, "workFolder": wf}));

    let memory = h
        .call_json("omx_memory_read", json!({"workFolder": wf}))
        .await;
    assert_eq!(memory["notes"], json!(["uses tokio", "no unwrap"]));
    assert_eq!(memory["buildCommand"], "make");
    assert!(project.join(".omx").join("memory.json").exists());

    let err = h
        .call("omx_memory_write", json!({"workFolder": wf}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "workFolder and data required.");
}
