//! omx: an MCP server that runs Claude Code jobs in the background and keeps
//! workflow state, session notes, and project memory on disk.

pub mod config;
pub mod error;
pub mod jobs;
pub mod server;
pub mod store;
pub mod tools;

pub use error::{Error, Result};
