//! Persistence layer: JSON documents on disk for workflow state, the session
//! notepad, and per-project memory.

pub mod memory;
pub mod notepad;
pub mod state;

pub use memory::MemoryStore;
pub use notepad::{NoteEntry, NoteSection, NoteSelector, Notepad, NotepadStore};
pub use state::{ModeSummary, StateStore};

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::fs;

use crate::error::StoreError;

/// A JSON object as stored on disk.
pub type Document = Map<String, Value>;

/// Read and parse a JSON file. Missing or unparsable files read as `None`.
pub(crate) async fn read_json(path: &Path) -> Option<Value> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "Unreadable document");
            }
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unparsable document");
            None
        }
    }
}

/// Like [`read_json`] but only accepts a top-level object.
pub(crate) async fn read_object(path: &Path) -> Option<Document> {
    match read_json(path).await? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Pretty-print `value` to `path`, creating parent directories.
pub(crate) async fn write_json(path: &Path, value: &Value) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)
        .await
        .map_err(|e| StoreError::io(path, e))
}

/// Shallow merge: keys from `patch` overwrite keys in `base`.
pub(crate) fn merge_shallow(mut base: Document, patch: Document) -> Document {
    for (key, value) in patch {
        base.insert(key, value);
    }
    base
}

/// Current time as an RFC 3339 string with millisecond precision.
pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// JavaScript-style truthiness, used where documents written by other tools
/// encode flags loosely.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
