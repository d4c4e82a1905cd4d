//! Append-only log of processed captures

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::extract::ExtractionResult;

/// History shared between the pipeline (writer) and the IPC server
pub type SharedHistory = Arc<RwLock<History>>;

/// One processed capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub result: ExtractionResult,
    /// Set when the vision service failed and `result` is a zero placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn succeeded(result: ExtractionResult) -> Self {
        Self {
            timestamp: Local::now(),
            result,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            result: ExtractionResult::empty(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedHistory {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Entries, oldest first
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The most recent entry, shown by "show details"
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    #[test]
    fn test_append_keeps_order() {
        let mut history = History::new();
        assert!(history.is_empty());
        assert!(history.latest().is_none());

        history.append(HistoryEntry::succeeded(extract("1:00")));
        history.append(HistoryEntry::failed("request failed"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.entries()[0].result.tokens, vec!["1:00"]);
        let latest = history.latest().unwrap();
        assert_eq!(latest.error.as_deref(), Some("request failed"));
        assert_eq!(latest.result, ExtractionResult::empty());
    }

    #[test]
    fn test_entry_serialization_omits_missing_error() {
        let json = serde_json::to_string(&HistoryEntry::succeeded(extract("2:30"))).unwrap();
        assert!(json.contains("timestamp"));
        assert!(!json.contains("error"));

        let json = serde_json::to_string(&HistoryEntry::failed("boom")).unwrap();
        assert!(json.contains("\"error\":\"boom\""));
    }
}
