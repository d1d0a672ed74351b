//! In-memory audit log

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::domain::{AuditEntry, AuditRecord, AuditSink};
use crate::error::StorageError;
use crate::Result;

/// [`AuditSink`] keeping entries in a vector
///
/// Clones share the same log, so a test can hand one clone to the service
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in append order
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<i64> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::database("audit log mutex poisoned"))?;
        entries.push(entry.clone());
        Ok(entries.len() as i64)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::database("audit log mutex poisoned"))?;
        Ok(entries
            .iter()
            .enumerate()
            .rev()
            .take(limit)
            .map(|(i, entry)| AuditRecord {
                id: i as i64 + 1,
                entry: entry.clone(),
            })
            .collect())
    }
}
