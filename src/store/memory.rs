//! Per-project memory at `<workFolder>/.omx/memory.json`.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{Document, merge_shallow, read_json, read_object, timestamp_now, write_json};
use crate::error::StoreError;

/// Project memory store. Stateless: the location comes from each call.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStore;

impl MemoryStore {
    pub fn new() -> Self {
        Self
    }

    /// File holding the memory of the project rooted at `work_folder`.
    pub fn path(work_folder: &str) -> Result<PathBuf, StoreError> {
        let root = Path::new(work_folder);
        if !root.is_absolute() {
            return Err(StoreError::InvalidKey {
                key: "workFolder".to_string(),
                reason: "must be an absolute path".to_string(),
            });
        }
        Ok(root.join(".omx").join("memory.json"))
    }

    pub async fn read(&self, work_folder: &str) -> Result<Option<Value>, StoreError> {
        Ok(read_json(&Self::path(work_folder)?).await)
    }

    /// Merge `data` into the project memory (or replace it). When both the
    /// stored and incoming `notes` are arrays they are concatenated.
    pub async fn write(
        &self,
        work_folder: &str,
        data: Document,
        replace: bool,
    ) -> Result<Document, StoreError> {
        let path = Self::path(work_folder)?;
        let mut memory = if replace {
            data
        } else {
            let existing = read_object(&path).await.unwrap_or_default();
            let notes = match (existing.get("notes"), data.get("notes")) {
                (Some(Value::Array(old)), Some(Value::Array(new))) => {
                    Some(old.iter().chain(new).cloned().collect::<Vec<_>>())
                }
                _ => None,
            };
            let mut merged = merge_shallow(existing, data);
            if let Some(notes) = notes {
                merged.insert("notes".into(), Value::Array(notes));
            }
            merged
        };
        memory.insert("_updatedAt".into(), Value::String(timestamp_now()));

        write_json(&path, &Value::Object(memory.clone())).await?;
        tracing::debug!(work_folder, replace, "Wrote project memory");
        Ok(memory)
    }
}
