//! Retention policy for finished jobs.
//!
//! Kept free of registry access so it can be applied to any snapshot of the
//! registry and tested on its own.

use chrono::{DateTime, Utc};

use super::job::{Job, JobId};
use super::state::JobStatus;

/// The fields of a job the retention policy looks at.
#[derive(Debug, Clone)]
pub struct RetentionCandidate {
    pub id: JobId,
    pub status: JobStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub seq: u64,
}

impl From<&Job> for RetentionCandidate {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            completed_at: job.completed_at,
            seq: job.seq,
        }
    }
}

/// Jobs to evict so that at most `cap` finished jobs remain.
///
/// Oldest completion goes first; creation order breaks ties. Running jobs are
/// never selected.
pub fn eviction_set<'a, I>(candidates: I, cap: usize) -> Vec<JobId>
where
    I: IntoIterator<Item = &'a RetentionCandidate>,
{
    let mut finished: Vec<&RetentionCandidate> = candidates
        .into_iter()
        .filter(|c| c.status.is_terminal())
        .collect();

    if finished.len() <= cap {
        return Vec::new();
    }

    finished.sort_by_key(|c| (c.completed_at, c.seq));
    let excess = finished.len() - cap;
    finished
        .into_iter()
        .take(excess)
        .map(|c| c.id.clone())
        .collect()
}
