//! Job records and the views handed back to callers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state::JobStatus;

/// Hint attached to snapshots of jobs that are still running.
pub const STILL_RUNNING_HINT: &str = "Still running. Call claude_code_status again.";

/// Caller-facing job identifier: eight lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub const LEN: usize = 8;

    /// Draw a fresh random identifier. Uniqueness is enforced by the orchestrator.
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(Self::LEN);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One unit of delegated work tracked by the orchestrator.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Accumulated standard output; append-only while running.
    pub stdout: String,
    /// Accumulated standard error; append-only while running.
    pub stderr: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub prompt_preview: String,
    pub work_folder: PathBuf,
    /// Creation order, used to break timestamp ties.
    pub(crate) seq: u64,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        seq: u64,
        prompt_preview: String,
        work_folder: PathBuf,
    ) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            stdout: String::new(),
            stderr: String::new(),
            created_at: Utc::now(),
            completed_at: None,
            exit_code: None,
            prompt_preview,
            work_folder,
            seq,
        }
    }

    /// Move to a terminal state, stamping the completion time.
    pub(crate) fn transition_to(&mut self, target: JobStatus) -> Result<(), String> {
        if !self.status.can_transition_to(target) {
            return Err(format!(
                "Cannot transition job {} from {} to {}",
                self.id, self.status, target
            ));
        }
        self.status = target;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Whole seconds from creation to completion (or to `now` while running).
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let end = self.completed_at.unwrap_or(now);
        let millis = end.signed_duration_since(self.created_at).num_milliseconds();
        ((millis.max(0) as f64) / 1000.0).round() as i64
    }

    pub fn summary(&self, now: DateTime<Utc>) -> JobSummary {
        JobSummary {
            job_id: self.id.clone(),
            status: self.status,
            elapsed_seconds: self.elapsed_seconds(now),
            prompt_preview: self.prompt_preview.clone(),
            work_folder: self.work_folder.display().to_string(),
        }
    }

    /// Build the status view. Running jobs get a bounded stdout tail, finished jobs the
    /// full output; stderr is only exposed for failures.
    pub fn snapshot(
        &self,
        now: DateTime<Utc>,
        running_tail_chars: usize,
        error_tail_chars: usize,
    ) -> JobSnapshot {
        let mut snapshot = JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            elapsed_seconds: self.elapsed_seconds(now),
            work_folder: self.work_folder.display().to_string(),
            exit_code: self.exit_code,
            output_tail: None,
            hint: None,
            output: None,
            error: None,
        };

        if self.status == JobStatus::Running {
            let tail = tail_chars(&self.stdout, running_tail_chars);
            let output_tail = if tail.len() < self.stdout.len() {
                format!("...({} chars)...\n{}", self.stdout.chars().count(), tail)
            } else if tail.is_empty() {
                "(no output yet)".to_string()
            } else {
                tail.to_string()
            };
            snapshot.output_tail = Some(output_tail);
            snapshot.hint = Some(STILL_RUNNING_HINT.to_string());
        } else if self.stdout.is_empty() {
            snapshot.output = Some("(no output)".to_string());
        } else {
            snapshot.output = Some(self.stdout.clone());
        }

        if self.status == JobStatus::Failed && !self.stderr.is_empty() {
            snapshot.error = Some(tail_chars(&self.stderr, error_tail_chars).to_string());
        }

        snapshot
    }
}

/// Status query result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub elapsed_seconds: i64,
    pub work_folder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lightweight listing entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    pub elapsed_seconds: i64,
    pub prompt_preview: String,
    pub work_folder: String,
}

/// Last `n` characters of `s` (UTF-8 safe).
pub(crate) fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// First `n` characters of `s`.
pub(crate) fn head_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job() -> Job {
        Job::new(JobId::generate(), 0, "echo hi".into(), PathBuf::from("/tmp"))
    }

    #[test]
    fn generated_ids_are_short_hex() {
        let id = JobId::generate();
        assert_eq!(id.as_str().len(), JobId::LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tail_and_head_respect_char_boundaries() {
        assert_eq!(tail_chars("café", 2), "fé");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
        assert_eq!(head_chars("héllo", 2), "hé");
    }

    #[test]
    fn transition_stamps_completion_once() {
        let mut job = job();
        job.transition_to(JobStatus::Completed).unwrap();
        assert!(job.completed_at.is_some());
        assert!(job.transition_to(JobStatus::Cancelled).is_err());
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn elapsed_rounds_to_whole_seconds() {
        let mut job = job();
        let now = job.created_at + Duration::milliseconds(2_600);
        assert_eq!(job.elapsed_seconds(now), 3);

        job.completed_at = Some(job.created_at + Duration::milliseconds(1_400));
        assert_eq!(job.elapsed_seconds(now), 1);
    }

    #[test]
    fn running_snapshot_marks_truncation() {
        let mut job = job();
        job.stdout = "x".repeat(3500);
        let snap = job.snapshot(Utc::now(), 3000, 2000);
        let tail = snap.output_tail.unwrap();
        assert!(tail.starts_with("...(3500 chars)...\n"));
        assert_eq!(tail.len(), "...(3500 chars)...\n".len() + 3000);
        assert_eq!(snap.hint.as_deref(), Some(STILL_RUNNING_HINT));
        assert!(snap.output.is_none());
    }

    #[test]
    fn running_snapshot_without_output() {
        let snap = job().snapshot(Utc::now(), 3000, 2000);
        assert_eq!(snap.output_tail.as_deref(), Some("(no output yet)"));
    }

    #[test]
    fn failed_snapshot_exposes_stderr_tail() {
        let mut job = job();
        job.stderr = "e".repeat(2500);
        job.exit_code = Some(2);
        job.transition_to(JobStatus::Failed).unwrap();
        let snap = job.snapshot(Utc::now(), 3000, 2000);
        assert_eq!(snap.error.unwrap().len(), 2000);
        assert_eq!(snap.output.as_deref(), Some("(no output)"));
        assert_eq!(snap.exit_code, Some(2));
        assert!(snap.hint.is_none());
    }

    #[test]
    fn completed_snapshot_hides_stderr() {
        let mut job = job();
        job.stdout = "hi\n".into();
        job.stderr = "warning".into();
        job.exit_code = Some(0);
        job.transition_to(JobStatus::Completed).unwrap();
        let snap = job.snapshot(Utc::now(), 3000, 2000);
        assert_eq!(snap.output.as_deref(), Some("hi\n"));
        assert!(snap.error.is_none());

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["exitCode"], 0);
        assert!(json.get("outputTail").is_none());
    }
}
