//! External CLI process: command construction, output decoding, signals.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use crate::config::OrchestratorConfig;

use super::job::JobId;

/// Build the CLI invocation for one job.
///
/// The CLI runs non-interactively with permission prompts bypassed and plain
/// text output, in its own process group so signals reach its children too.
pub(crate) fn cli_command(config: &OrchestratorConfig, instructions: &str, dir: &Path) -> Command {
    let mut command = Command::new(&config.program);
    command
        .args(&config.program_args)
        .args([
            "--dangerously-skip-permissions",
            "-p",
            instructions,
            "--output-format",
            "text",
        ])
        .current_dir(dir)
        .env("FORCE_COLOR", "0")
        .env("NO_COLOR", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    command.process_group(0);

    command
}

/// How a supervised process ended.
#[derive(Debug)]
pub(crate) enum ProcessExit {
    Code(i32),
    Signal(i32),
    WaitFailed(std::io::Error),
}

impl ProcessExit {
    pub(crate) fn from_status(status: std::io::Result<ExitStatus>) -> Self {
        match status {
            Ok(status) => match status.code() {
                Some(code) => Self::Code(code),
                None => Self::Signal(exit_signal(&status)),
            },
            Err(e) => Self::WaitFailed(e),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> i32 {
    -1
}

/// Ownership handle to a live CLI process, held by the registry while the job runs.
#[derive(Debug)]
pub(crate) struct ProcessHandle {
    pid: Option<u32>,
    kill_tx: oneshot::Sender<()>,
}

impl ProcessHandle {
    /// Create a handle plus the receiver the supervisor listens on for forced kills.
    pub(crate) fn new(child: &Child) -> (Self, oneshot::Receiver<()>) {
        let (kill_tx, kill_rx) = oneshot::channel();
        (
            Self {
                pid: child.id(),
                kill_tx,
            },
            kill_rx,
        )
    }

    /// Send the graceful termination signal to the process group.
    pub(crate) fn terminate(&self) {
        if let Some(pid) = self.pid {
            signal_group(pid, GroupSignal::Terminate);
        }
    }

    /// Force-kill the process after `grace` unless it has already been reaped.
    ///
    /// Best effort: if the supervisor is gone the process has exited and there is
    /// nothing left to kill.
    pub(crate) fn escalate_after(self, job_id: JobId, grace: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if self.kill_tx.send(()).is_err() {
                tracing::debug!(job_id = %job_id, "Forced kill skipped: process already exited");
            } else {
                tracing::debug!(job_id = %job_id, "Forced kill requested after grace period");
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum GroupSignal {
    Terminate,
    Kill,
}

/// Signal every process in the group led by `pid`. Errors are logged and dropped.
#[cfg(unix)]
pub(crate) fn signal_group(pid: u32, signal: GroupSignal) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
        tracing::debug!(pid, ?signal, error = %e, "Failed to signal process group");
    }
}

#[cfg(not(unix))]
pub(crate) fn signal_group(_pid: u32, _signal: GroupSignal) {}

/// Incremental UTF-8 decoder for pipe chunks.
///
/// Holds back an incomplete trailing sequence until the next chunk arrives so
/// multi-byte characters split across reads are not mangled.
#[derive(Debug, Default)]
pub(crate) struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(
                        std::str::from_utf8(&self.pending[..valid]).unwrap_or_default(),
                    );
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left once the stream has closed.
    pub(crate) fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
