//! Session notepad: a priority blurb, short-lived working notes, and
//! permanent manual notes, kept in a single JSON file.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{read_json, timestamp_now, write_json};
use crate::error::StoreError;

/// Maximum length of the priority section, in characters.
pub const PRIORITY_MAX_CHARS: usize = 500;

/// How long working entries survive.
pub fn working_retention() -> Duration {
    Duration::days(7)
}

/// A timestamped notepad entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub content: String,
    pub timestamp: String,
}

impl NoteEntry {
    fn now(content: &str) -> Self {
        Self {
            content: content.to_string(),
            timestamp: timestamp_now(),
        }
    }

    /// Entries with unparsable timestamps count as expired.
    fn is_after(&self, cutoff: DateTime<Utc>) -> bool {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .is_ok_and(|ts| ts.with_timezone(&Utc) > cutoff)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notepad {
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub working: Vec<NoteEntry>,
    #[serde(default)]
    pub manual: Vec<NoteEntry>,
}

impl Notepad {
    fn prune_working(&mut self, now: DateTime<Utc>) {
        let cutoff = now - working_retention();
        self.working.retain(|entry| entry.is_after(cutoff));
    }
}

/// A writable notepad section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSection {
    Priority,
    Working,
    Manual,
}

impl NoteSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Working => "working",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for NoteSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(Self::Priority),
            "working" => Ok(Self::Working),
            "manual" => Ok(Self::Manual),
            _ => Err("section must be priority, working, or manual.".to_string()),
        }
    }
}

/// What to read: the whole notepad or one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteSelector {
    #[default]
    All,
    Section(NoteSection),
}

impl FromStr for NoteSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            other => other
                .parse()
                .map(Self::Section)
                .map_err(|_| "invalid section.".to_string()),
        }
    }
}

/// File-backed notepad.
pub struct NotepadStore {
    path: PathBuf,
}

impl NotepadStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Current notepad with expired working entries dropped.
    pub async fn load(&self) -> Notepad {
        let mut notepad = match read_json(&self.path).await {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "Notepad has an unexpected shape; starting fresh");
                Notepad::default()
            }),
            None => Notepad::default(),
        };
        notepad.prune_working(Utc::now());
        notepad
    }

    /// Read the whole notepad or a single section, keyed by section name.
    pub async fn read(&self, selector: NoteSelector) -> Value {
        let notepad = self.load().await;
        match selector {
            NoteSelector::All => json!(notepad),
            NoteSelector::Section(NoteSection::Priority) => json!({ "priority": notepad.priority }),
            NoteSelector::Section(NoteSection::Working) => json!({ "working": notepad.working }),
            NoteSelector::Section(NoteSection::Manual) => json!({ "manual": notepad.manual }),
        }
    }

    /// Write to a section. Priority is replaced (and truncated); working and
    /// manual get a new timestamped entry.
    pub async fn write(&self, section: NoteSection, content: &str) -> Result<(), StoreError> {
        let mut notepad = self.load().await;
        match section {
            NoteSection::Priority => {
                notepad.priority = content.chars().take(PRIORITY_MAX_CHARS).collect();
            }
            NoteSection::Working => notepad.working.push(NoteEntry::now(content)),
            NoteSection::Manual => notepad.manual.push(NoteEntry::now(content)),
        }
        write_json(&self.path, &serde_json::to_value(&notepad)?).await?;
        tracing::debug!(section = section.as_str(), "Wrote notepad section");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SecondsFormat;
    use tempfile::TempDir;

    fn store() -> (NotepadStore, TempDir) {
        let dir = TempDir::new().unwrap();
        (NotepadStore::new(dir.path().join("notepad.json")), dir)
    }

    fn entry(content: &str, age: Duration) -> NoteEntry {
        NoteEntry {
            content: content.into(),
            timestamp: (Utc::now() - age).to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    #[tokio::test]
    async fn empty_notepad_has_all_sections() {
        let (store, _dir) = store();
        let all = store.read(NoteSelector::All).await;
        assert_eq!(all, json!({"priority": "", "working": [], "manual": []}));
    }

    #[tokio::test]
    async fn priority_is_replaced_and_truncated() {
        let (store, _dir) = store();
        store.write(NoteSection::Priority, "first").await.unwrap();
        store
            .write(NoteSection::Priority, &"p".repeat(800))
            .await
            .unwrap();

        let read = store
            .read(NoteSelector::Section(NoteSection::Priority))
            .await;
        assert_eq!(read["priority"].as_str().unwrap().len(), PRIORITY_MAX_CHARS);
    }

    #[tokio::test]
    async fn manual_entries_accumulate() {
        let (store, _dir) = store();
        store.write(NoteSection::Manual, "one").await.unwrap();
        store.write(NoteSection::Manual, "two").await.unwrap();
        let notepad = store.load().await;
        let contents: Vec<&str> = notepad.manual.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn stale_working_entries_are_dropped_on_read_and_write() {
        let (store, _dir) = store();
        let seeded = Notepad {
            working: vec![
                entry("old", Duration::days(8)),
                entry("recent", Duration::days(1)),
                NoteEntry {
                    content: "garbled".into(),
                    timestamp: "yesterday".into(),
                },
            ],
            manual: vec![entry("ancient", Duration::days(400))],
            ..Notepad::default()
        };
        write_json(&store.path, &serde_json::to_value(&seeded).unwrap())
            .await
            .unwrap();

        let read = store.read(NoteSelector::Section(NoteSection::Working)).await;
        assert_eq!(read["working"].as_array().unwrap().len(), 1);
        assert_eq!(read["working"][0]["content"], "recent");

        store.write(NoteSection::Working, "new").await.unwrap();
        let on_disk: Notepad =
            serde_json::from_value(read_json(&store.path).await.unwrap()).unwrap();
        let contents: Vec<&str> = on_disk.working.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["recent", "new"]);
        assert_eq!(on_disk.manual.len(), 1);
    }

    #[test]
    fn selector_parsing() {
        assert_eq!("all".parse::<NoteSelector>().unwrap(), NoteSelector::All);
        assert_eq!(
            "manual".parse::<NoteSelector>().unwrap(),
            NoteSelector::Section(NoteSection::Manual)
        );
        assert!("everything".parse::<NoteSelector>().is_err());
        assert!("all".parse::<NoteSection>().is_err());
    }
}
