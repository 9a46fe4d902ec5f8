//! Background jobs that run the Claude CLI.

mod job;
mod orchestrator;
mod process;
mod retention;
mod state;

pub use job::{JobId, JobSnapshot, JobSummary, STILL_RUNNING_HINT};
pub use orchestrator::{CancelOutcome, JobOrchestrator};
pub use retention::{RetentionCandidate, eviction_set};
pub use state::{JobStatus, StatusFilter};
