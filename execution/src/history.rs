//! Append-only round history.

use skymultiplier_types::{HistoryEntry, HistoryError};

/// Append-only record of settled rounds. The engine appends exactly once
/// per settlement; entries are never mutated afterward.
pub trait HistoryStore {
    async fn append(&mut self, entry: HistoryEntry) -> Result<(), HistoryError>;

    /// Read-back for operator tooling and tests.
    async fn entries_for(&self, user: &str) -> Result<Vec<HistoryEntry>, HistoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: Vec<HistoryEntry>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HistoryStore for InMemoryHistory {
    async fn append(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.entries.push(entry);
        Ok(())
    }

    async fn entries_for(&self, user: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.user == user)
            .cloned()
            .collect())
    }
}
