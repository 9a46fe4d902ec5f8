//! Built-in tools: Claude Code delegation, workflow state, notepad, and project memory.

pub mod claude_code;
pub mod memory;
pub mod notepad;
pub mod state;

use std::sync::Arc;

use crate::jobs::JobOrchestrator;
use crate::store::{MemoryStore, NotepadStore, StateStore};
use crate::tools::ToolRegistry;

impl ToolRegistry {
    /// Register the four job tools backed by `jobs`.
    pub fn register_job_tools(&self, jobs: &JobOrchestrator) {
        self.register_sync(Arc::new(claude_code::ClaudeCodeTool::new(jobs.clone())));
        self.register_sync(Arc::new(claude_code::ClaudeCodeStatusTool::new(jobs.clone())));
        self.register_sync(Arc::new(claude_code::ClaudeCodeCancelTool::new(jobs.clone())));
        self.register_sync(Arc::new(claude_code::ClaudeCodeListTool::new(jobs.clone())));
    }

    pub fn register_state_tools(&self, store: Arc<StateStore>) {
        self.register_sync(Arc::new(state::StateReadTool::new(Arc::clone(&store))));
        self.register_sync(Arc::new(state::StateWriteTool::new(Arc::clone(&store))));
        self.register_sync(Arc::new(state::StateClearTool::new(Arc::clone(&store))));
        self.register_sync(Arc::new(state::StateListTool::new(store)));
    }

    pub fn register_notepad_tools(&self, store: Arc<NotepadStore>) {
        self.register_sync(Arc::new(notepad::NoteReadTool::new(Arc::clone(&store))));
        self.register_sync(Arc::new(notepad::NoteWriteTool::new(store)));
    }

    pub fn register_memory_tools(&self, store: MemoryStore) {
        self.register_sync(Arc::new(memory::MemoryReadTool::new(store)));
        self.register_sync(Arc::new(memory::MemoryWriteTool::new(store)));
    }

    /// A registry holding every built-in tool.
    pub fn with_builtins(
        jobs: &JobOrchestrator,
        state: Arc<StateStore>,
        notepad: Arc<NotepadStore>,
    ) -> Self {
        let registry = Self::new();
        registry.register_job_tools(jobs);
        registry.register_state_tools(state);
        registry.register_notepad_tools(notepad);
        registry.register_memory_tools(MemoryStore::new());
        registry
    }
}
