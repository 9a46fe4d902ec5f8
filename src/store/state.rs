//! Per-mode workflow state documents (`<state_dir>/<mode>.json`).

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tokio::fs;

use super::{Document, is_truthy, merge_shallow, read_json, read_object, timestamp_now, write_json};
use crate::error::StoreError;

/// One row of the mode listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeSummary {
    pub mode: String,
    /// False only when the document says `"active": false`.
    pub active: bool,
    pub phase: Value,
    pub updated_at: Value,
}

impl ModeSummary {
    fn from_document(mode: String, doc: &Document) -> Self {
        let phase = ["phase", "current_phase"]
            .iter()
            .filter_map(|key| doc.get(*key))
            .find(|value| is_truthy(value))
            .cloned()
            .unwrap_or(Value::Null);
        let updated_at = doc
            .get("_updatedAt")
            .filter(|value| is_truthy(value))
            .cloned()
            .unwrap_or(Value::Null);
        Self {
            mode,
            active: doc.get("active") != Some(&Value::Bool(false)),
            phase,
            updated_at,
        }
    }
}

/// File-backed store of workflow mode state.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Create the state directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))
    }

    fn path(&self, mode: &str) -> Result<PathBuf, StoreError> {
        validate_mode(mode)?;
        Ok(self.dir.join(format!("{mode}.json")))
    }

    /// Stored document for `mode`, or `None` when absent or unreadable.
    pub async fn read(&self, mode: &str) -> Result<Option<Value>, StoreError> {
        Ok(read_json(&self.path(mode)?).await)
    }

    /// Merge `data` into the mode's document (or replace it) and return the
    /// document as written.
    pub async fn write(
        &self,
        mode: &str,
        data: Document,
        replace: bool,
    ) -> Result<Document, StoreError> {
        let path = self.path(mode)?;
        let mut state = if replace {
            data
        } else {
            let existing = read_object(&path).await.unwrap_or_default();
            merge_shallow(existing, data)
        };
        state.insert("_mode".into(), Value::String(mode.to_string()));
        state.insert("_updatedAt".into(), Value::String(timestamp_now()));

        write_json(&path, &Value::Object(state.clone())).await?;
        tracing::debug!(mode, replace, "Wrote mode state");
        Ok(state)
    }

    /// Delete the mode's document. Returns whether a file was removed.
    pub async fn clear(&self, mode: &str) -> Result<bool, StoreError> {
        let path = self.path(mode)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(mode, "Cleared mode state");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Summaries of every stored mode, sorted by name.
    pub async fn list(&self) -> Result<Vec<ModeSummary>, StoreError> {
        let mut read_dir = match fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut modes = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let file_name = entry.file_name();
            let Some(mode) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let doc = read_object(&entry.path()).await.unwrap_or_default();
            modes.push(ModeSummary::from_document(mode.to_string(), &doc));
        }
        modes.sort_by(|a, b| a.mode.cmp(&b.mode));
        Ok(modes)
    }
}

/// Mode names become file names, so they must stay inside the state directory.
fn validate_mode(mode: &str) -> Result<(), StoreError> {
    let reason = if mode.is_empty() {
        "must not be empty"
    } else if mode.contains(['/', '\\']) {
        "must not contain path separators"
    } else if mode.contains("..") {
        "must not contain '..'"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidKey {
        key: "mode".to_string(),
        reason: reason.to_string(),
    })
}
