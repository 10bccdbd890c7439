//! In-memory implementation of the backend trait.
//!
//! Primarily for tests. Same semantics as SQLite but nothing persists past
//! the process.

use std::sync::RwLock;

use async_trait::async_trait;
use consent_ledger_core::LedgerEntry;

use crate::error::{Result, StoreError};
use crate::traits::{LedgerBackend, LedgerHead};

/// In-memory backend. Thread-safe via RwLock.
pub struct MemoryBackend {
    inner: RwLock<MemoryInner>,
}

struct MemoryInner {
    /// Entries in sequence order; index == seq.
    entries: Vec<LedgerEntry>,
    /// Persisted head, None simulates a lost metadata record.
    head: Option<LedgerHead>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                entries: Vec::new(),
                head: Some(LedgerHead::genesis()),
            }),
        }
    }

    /// Test hook: mutate a stored entry in place.
    ///
    /// Violates the append-only contract on purpose, to exercise chain
    /// verification against tampered storage.
    pub fn tamper_entry(&self, seq: u64, f: impl FnOnce(&mut LedgerEntry)) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.entries.get_mut(seq as usize) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }

    /// Test hook: drop the persisted head, simulating metadata loss.
    pub fn forget_head(&self) {
        self.inner.write().unwrap().head = None;
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    async fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let mut inner = self.inner.write().unwrap();

        let expected = inner.entries.len() as u64;
        if entry.seq != expected {
            return Err(StoreError::InvalidData(format!(
                "append out of order: got seq {}, expected {expected}",
                entry.seq
            )));
        }

        inner.entries.push(entry.clone());
        inner.head = Some(LedgerHead::after(entry));
        Ok(())
    }

    async fn entry_at(&self, seq: u64) -> Result<Option<LedgerEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.entries.get(seq as usize).cloned())
    }

    async fn entries_from(&self, from_seq: u64, limit: usize) -> Result<Vec<LedgerEntry>> {
        let inner = self.inner.read().unwrap();
        let start = from_seq.min(inner.entries.len() as u64) as usize;
        Ok(inner.entries[start..]
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn entry_count(&self) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        Ok(inner.entries.len() as u64)
    }

    async fn head(&self) -> Result<Option<LedgerHead>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.head)
    }
}
