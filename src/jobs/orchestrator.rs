//! Job orchestrator: registry, lifecycle, long-poll status, cancellation.
//!
//! The registry is one map behind a `RwLock`. Every mutation (insert, output
//! append, terminal transition, eviction) happens under the write guard, so
//! those steps are atomic with respect to each other. Each job also owns a
//! `watch` channel carrying its status; status waits subscribe to it instead
//! of polling.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::{RwLock, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::OrchestratorConfig;
use crate::error::JobError;

use super::job::{Job, JobId, JobSnapshot, JobSummary, head_chars};
use super::process::{
    GroupSignal, ProcessExit, ProcessHandle, Utf8Chunker, cli_command, signal_group,
};
use super::retention::{RetentionCandidate, eviction_set};
use super::state::{JobStatus, StatusFilter};

const READ_CHUNK: usize = 8 * 1024;

/// Registry slot for one job.
struct JobEntry {
    job: Job,
    /// Present exactly while the job is running.
    process: Option<ProcessHandle>,
    status_tx: watch::Sender<JobStatus>,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<JobId, JobEntry>,
    /// Every identifier ever handed out, evicted or not.
    issued: HashSet<JobId>,
    next_seq: u64,
}

impl Registry {
    fn allocate_id(&mut self) -> JobId {
        self.allocate_id_with(JobId::generate)
    }

    /// Draw ids until one has never been issued. Evicted ids stay issued.
    fn allocate_id_with(&mut self, mut draw: impl FnMut() -> JobId) -> JobId {
        loop {
            let id = draw();
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }

    /// Apply the retention policy; called after every terminal transition.
    fn prune(&mut self, cap: usize) {
        let candidates: Vec<RetentionCandidate> = self
            .entries
            .values()
            .map(|entry| RetentionCandidate::from(&entry.job))
            .collect();
        for id in eviction_set(&candidates, cap) {
            self.entries.remove(&id);
            tracing::debug!(job_id = %id, "Evicted finished job");
        }
    }
}

/// Output stream of the CLI process.
#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was running and is now cancelled.
    Cancelled { job_id: JobId },
    /// The job had already finished; nothing changed.
    AlreadyFinished { job_id: JobId, status: JobStatus },
}

impl CancelOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Cancelled { job_id } => format!("Job {job_id} cancelled."),
            Self::AlreadyFinished { job_id, status } => format!("Job {job_id} already {status}."),
        }
    }
}

struct Inner {
    config: OrchestratorConfig,
    registry: RwLock<Registry>,
}

/// Owns the job registry and the CLI processes behind it.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

impl JobOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry: RwLock::new(Registry::default()),
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Start a job and return its identifier without waiting for it.
    ///
    /// A CLI that cannot be spawned does not make this call fail: the job is
    /// recorded as `failed` with the spawn error, and the caller finds out on
    /// the next status query.
    pub async fn create_job(
        &self,
        instructions: &str,
        work_folder: Option<&str>,
    ) -> Result<JobId, JobError> {
        if instructions.is_empty() {
            return Err(JobError::InvalidRequest("prompt is required.".to_string()));
        }
        let config = &self.inner.config;
        let work_folder = resolve_work_folder(work_folder, &config.home);

        let mut registry = self.inner.registry.write().await;
        let id = registry.allocate_id();
        let seq = registry.next_seq;
        registry.next_seq += 1;

        let mut job = Job::new(
            id.clone(),
            seq,
            head_chars(instructions, config.preview_chars),
            work_folder.clone(),
        );
        let (status_tx, _) = watch::channel(JobStatus::Running);

        tracing::info!(job_id = %id, work_folder = %work_folder.display(), "Starting job");

        match cli_command(config, instructions, &work_folder).spawn() {
            Ok(mut child) => {
                let (process, kill_rx) = ProcessHandle::new(&child);
                let readers = [
                    child
                        .stdout
                        .take()
                        .map(|out| self.spawn_reader(id.clone(), Stream::Stdout, out)),
                    child
                        .stderr
                        .take()
                        .map(|err| self.spawn_reader(id.clone(), Stream::Stderr, err)),
                ];
                registry.entries.insert(
                    id.clone(),
                    JobEntry {
                        job,
                        process: Some(process),
                        status_tx,
                    },
                );
                drop(registry);

                let this = self.clone();
                let job_id = id.clone();
                tokio::spawn(async move { this.supervise(job_id, child, kill_rx, readers).await });
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Failed to spawn CLI");
                job.stderr = format!("Failed to spawn Claude CLI: {e}");
                if let Err(reason) = job.transition_to(JobStatus::Failed) {
                    tracing::warn!(job_id = %id, %reason, "Spawn failure could not mark job failed");
                }
                status_tx.send_replace(JobStatus::Failed);
                registry.entries.insert(
                    id.clone(),
                    JobEntry {
                        job,
                        process: None,
                        status_tx,
                    },
                );
                registry.prune(config.max_retained_jobs);
            }
        }

        Ok(id)
    }

    /// Status of a job, waiting up to `wait_seconds` (clamped to the configured
    /// maximum) for it to leave `running`.
    ///
    /// Never fails because of the wait: when the deadline passes the snapshot
    /// simply shows the job still running with its partial output.
    pub async fn get_status(
        &self,
        job_id: &str,
        wait_seconds: Option<f64>,
    ) -> Result<JobSnapshot, JobError> {
        let wait = self.clamp_wait(wait_seconds);

        let mut status_rx = {
            let registry = self.inner.registry.read().await;
            registry
                .entries
                .get(job_id)
                .ok_or_else(|| not_found(job_id))?
                .status_tx
                .subscribe()
        };

        if !wait.is_zero() && !status_rx.borrow().is_terminal() {
            // A closed channel means the job was evicted; the lookup below reports it.
            let _ = tokio::time::timeout(wait, status_rx.wait_for(JobStatus::is_terminal)).await;
        }

        let registry = self.inner.registry.read().await;
        let entry = registry
            .entries
            .get(job_id)
            .ok_or_else(|| not_found(job_id))?;
        let config = &self.inner.config;
        Ok(entry
            .job
            .snapshot(Utc::now(), config.running_tail_chars, config.error_tail_chars))
    }

    /// Cancel a running job. Already-finished jobs are reported unchanged.
    ///
    /// The registry shows `cancelled` as soon as this returns; the process gets
    /// SIGTERM now and a forced kill after the grace period if it is still alive.
    pub async fn cancel_job(&self, job_id: &str) -> Result<CancelOutcome, JobError> {
        let config = &self.inner.config;
        let mut registry = self.inner.registry.write().await;
        let entry = registry
            .entries
            .get_mut(job_id)
            .ok_or_else(|| not_found(job_id))?;

        if entry.job.status.is_terminal() {
            return Ok(CancelOutcome::AlreadyFinished {
                job_id: entry.job.id.clone(),
                status: entry.job.status,
            });
        }

        let id = entry.job.id.clone();
        let process = entry.process.take();
        if let Err(reason) = entry.job.transition_to(JobStatus::Cancelled) {
            tracing::warn!(job_id = %id, %reason, "Unexpected cancel transition failure");
        }
        entry.status_tx.send_replace(JobStatus::Cancelled);

        if let Some(process) = process {
            process.terminate();
            process.escalate_after(id.clone(), config.kill_grace);
        }
        registry.prune(config.max_retained_jobs);

        tracing::info!(job_id = %id, "Job cancelled");
        Ok(CancelOutcome::Cancelled { job_id: id })
    }

    /// Summaries of all jobs matching `filter`, newest first.
    pub async fn list_jobs(&self, filter: StatusFilter) -> Vec<JobSummary> {
        let now = Utc::now();
        let registry = self.inner.registry.read().await;
        let mut jobs: Vec<&Job> = registry
            .entries
            .values()
            .map(|entry| &entry.job)
            .filter(|job| filter.matches(job.status))
            .collect();
        jobs.sort_by(|a, b| b.seq.cmp(&a.seq));
        jobs.into_iter().map(|job| job.summary(now)).collect()
    }

    /// Number of jobs currently in the registry.
    pub async fn job_count(&self) -> usize {
        self.inner.registry.read().await.entries.len()
    }

    /// Number of jobs currently running.
    pub async fn running_count(&self) -> usize {
        self.inner
            .registry
            .read()
            .await
            .entries
            .values()
            .filter(|entry| entry.job.status == JobStatus::Running)
            .count()
    }

    fn clamp_wait(&self, wait_seconds: Option<f64>) -> Duration {
        let config = &self.inner.config;
        match wait_seconds {
            None => config.default_wait.min(config.max_wait),
            Some(secs) if secs.is_nan() || secs <= 0.0 => Duration::ZERO,
            Some(secs) => config.max_wait.min(Duration::from_secs_f64(
                secs.min(config.max_wait.as_secs_f64()),
            )),
        }
    }

    fn spawn_reader<R>(&self, id: JobId, stream: Stream, mut reader: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            let mut decoder = Utf8Chunker::default();
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let text = decoder.push(&buf[..n]);
                        this.append_output(&id, stream, &text).await;
                    }
                    Err(e) => {
                        tracing::debug!(job_id = %id, ?stream, error = %e, "Output read failed");
                        break;
                    }
                }
            }
            let rest = decoder.finish();
            this.append_output(&id, stream, &rest).await;
        })
    }

    async fn append_output(&self, id: &JobId, stream: Stream, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut registry = self.inner.registry.write().await;
        if let Some(entry) = registry.entries.get_mut(id)
            && entry.job.status == JobStatus::Running
        {
            match stream {
                Stream::Stdout => entry.job.stdout.push_str(text),
                Stream::Stderr => entry.job.stderr.push_str(text),
            }
        }
    }

    /// Own the child until it exits, honouring forced-kill requests, then record
    /// the exit once both output streams are drained.
    async fn supervise(
        self,
        id: JobId,
        mut child: Child,
        mut kill_rx: oneshot::Receiver<()>,
        readers: [Option<JoinHandle<()>>; 2],
    ) {
        let pid = child.id();
        let mut kill_pending = true;
        let status = loop {
            tokio::select! {
                request = &mut kill_rx, if kill_pending => {
                    kill_pending = false;
                    if request.is_ok() {
                        if let Some(pid) = pid {
                            signal_group(pid, GroupSignal::Kill);
                        }
                        if let Err(e) = child.start_kill() {
                            tracing::debug!(job_id = %id, error = %e, "Forced kill failed");
                        }
                    }
                }
                status = child.wait() => break status,
            }
        };

        // Group members left behind by the leader can keep the pipes open, so a
        // forced kill must still reach the group while output drains.
        let drain = async {
            for reader in readers.into_iter().flatten() {
                let _ = reader.await;
            }
        };
        tokio::pin!(drain);
        loop {
            tokio::select! {
                request = &mut kill_rx, if kill_pending => {
                    kill_pending = false;
                    if request.is_ok()
                        && let Some(pid) = pid
                    {
                        tracing::debug!(job_id = %id, "Forced kill sent to lingering process group");
                        signal_group(pid, GroupSignal::Kill);
                    }
                }
                () = &mut drain => break,
            }
        }

        self.record_exit(&id, ProcessExit::from_status(status)).await;
    }

    async fn record_exit(&self, id: &JobId, exit: ProcessExit) {
        let cap = self.inner.config.max_retained_jobs;
        let mut registry = self.inner.registry.write().await;
        let Some(entry) = registry.entries.get_mut(id) else {
            return;
        };
        if entry.job.status.is_terminal() {
            tracing::debug!(job_id = %id, status = %entry.job.status, ?exit, "Process exited after job finished");
            return;
        }

        entry.process = None;
        let target = match exit {
            ProcessExit::Code(code) => {
                entry.job.exit_code = Some(code);
                if code == 0 {
                    JobStatus::Completed
                } else {
                    JobStatus::Failed
                }
            }
            ProcessExit::Signal(signal) => {
                push_line(&mut entry.job.stderr, &format!("Terminated by signal {signal}"));
                JobStatus::Failed
            }
            ProcessExit::WaitFailed(e) => {
                push_line(&mut entry.job.stderr, &format!("Wait error: {e}"));
                JobStatus::Failed
            }
        };
        if let Err(reason) = entry.job.transition_to(target) {
            tracing::warn!(job_id = %id, %reason, "Unexpected exit transition failure");
        }
        entry.status_tx.send_replace(target);
        tracing::info!(job_id = %id, status = %target, exit_code = ?entry.job.exit_code, "Job finished");

        registry.prune(cap);
    }
}

/// Use the requested folder when it is an absolute path, otherwise `home`.
///
/// A nonexistent absolute folder is kept so the spawn fails visibly.
fn resolve_work_folder(requested: Option<&str>, home: &Path) -> PathBuf {
    match requested {
        Some(dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
        _ => home.to_path_buf(),
    }
}

fn not_found(job_id: &str) -> JobError {
    JobError::NotFound {
        id: job_id.to_string(),
    }
}

fn push_line(buf: &mut String, line: &str) {
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(line);
}
