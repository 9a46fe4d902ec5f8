//! Configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Default name of the external CLI when nothing more specific is found.
pub const DEFAULT_CLI_NAME: &str = "claude";

/// Job orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Executable launched for each job.
    pub program: PathBuf,
    /// Arguments placed before the CLI flags (e.g. a launcher script).
    pub program_args: Vec<String>,
    /// Fallback working directory for jobs.
    pub home: PathBuf,
    /// Maximum number of finished jobs kept in the registry.
    pub max_retained_jobs: usize,
    /// Upper bound for a single status wait.
    pub max_wait: Duration,
    /// Wait used when the caller does not specify one.
    pub default_wait: Duration,
    /// Delay between the graceful and the forced termination signal.
    pub kill_grace: Duration,
    /// Characters of the instructions kept as a preview.
    pub preview_chars: usize,
    /// Characters of stdout returned while a job is still running.
    pub running_tail_chars: usize,
    /// Characters of stderr returned for a failed job.
    pub error_tail_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_CLI_NAME),
            program_args: Vec::new(),
            home: home_dir(),
            max_retained_jobs: 50,
            max_wait: Duration::from_secs(25),
            default_wait: Duration::from_secs(25),
            kill_grace: Duration::from_secs(5),
            preview_chars: 200,
            running_tail_chars: 3000,
            error_tail_chars: 2000,
        }
    }
}

/// Server configuration, built from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root directory for omx documents (`~/.codex/.omx`).
    pub omx_dir: PathBuf,
    /// Whether `MCP_OMX_DEBUG=true` was set.
    pub debug: bool,
    /// Optional log file; logs always go to stderr as well.
    pub log_file: Option<PathBuf>,
    pub orchestrator: OrchestratorConfig,
}

impl ServerConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = home_dir();
        let omx_dir = std::env::var("OMX_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".codex").join(".omx"));

        let mut orchestrator = OrchestratorConfig {
            program: resolve_cli_program(&home),
            home,
            ..OrchestratorConfig::default()
        };
        if let Some(cap) = env_parse::<usize>("OMX_MAX_RETAINED_JOBS")? {
            orchestrator.max_retained_jobs = cap;
        }
        if let Some(secs) = env_parse::<u64>("OMX_KILL_GRACE_SECS")? {
            orchestrator.kill_grace = Duration::from_secs(secs);
        }

        Ok(Self {
            omx_dir,
            debug: std::env::var("MCP_OMX_DEBUG").is_ok_and(|v| v == "true"),
            log_file: std::env::var("OMX_LOG_FILE").ok().map(PathBuf::from),
            orchestrator,
        })
    }

    /// Directory holding per-mode state documents.
    pub fn state_dir(&self) -> PathBuf {
        self.omx_dir.join("state")
    }

    /// Path of the session notepad document.
    pub fn notepad_path(&self) -> PathBuf {
        self.omx_dir.join("notepad.json")
    }
}

/// Resolve the external CLI: `$CLAUDE_CLI_NAME`, then the local install, then `claude` on PATH.
pub fn resolve_cli_program(home: &Path) -> PathBuf {
    if let Ok(name) = std::env::var("CLAUDE_CLI_NAME")
        && !name.is_empty()
    {
        return PathBuf::from(name);
    }
    let local = home.join(".claude").join("local").join("claude");
    if local.exists() {
        return local;
    }
    PathBuf::from(DEFAULT_CLI_NAME)
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn orchestrator_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_retained_jobs, 50);
        assert_eq!(config.max_wait, Duration::from_secs(25));
        assert_eq!(config.kill_grace, Duration::from_secs(5));
        assert_eq!(config.running_tail_chars, 3000);
        assert_eq!(config.error_tail_chars, 2000);
    }

    #[test]
    fn local_install_is_preferred_over_path_lookup() {
        // Only meaningful when the override variable is absent.
        if std::env::var("CLAUDE_CLI_NAME").is_ok() {
            return;
        }
        let home = TempDir::new().unwrap();
        assert_eq!(
            resolve_cli_program(home.path()),
            PathBuf::from(DEFAULT_CLI_NAME)
        );

        let local = home.path().join(".claude/local");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("claude"), "").unwrap();
        assert_eq!(resolve_cli_program(home.path()), local.join("claude"));
    }

    #[test]
    fn env_parse_missing_key_is_none() {
        // A key nobody sets.
        let missing: Option<usize> = env_parse("OMX_TEST_SURELY_UNSET_KEY").unwrap();
        assert!(missing.is_none());
    }
}
