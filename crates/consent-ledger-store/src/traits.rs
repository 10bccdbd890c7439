//! The backend trait: durable, strictly-ordered entry storage.
//!
//! Backends are deliberately dumb. Hash chaining, signing, and workflow
//! validation happen above them; a backend only stores sealed entries in
//! sequence order and keeps the small head metadata record that makes
//! startup fast. Implementations include SQLite (primary) and in-memory
//! (for tests).

use async_trait::async_trait;
use consent_ledger_core::{EntryHash, LedgerEntry, GENESIS_ANCHOR};

use crate::error::Result;

/// The persisted chain head: next sequence number and current anchor.
///
/// This is a cache for fast startup. If it is lost, it is rebuilt by
/// replaying the entry log (see [`LedgerBackend::head`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerHead {
    /// Sequence number the next entry will take.
    pub next_seq: u64,
    /// Hash of the most recently appended entry, or the genesis anchor.
    pub anchor: EntryHash,
}

impl LedgerHead {
    /// The head of an empty ledger.
    pub fn genesis() -> Self {
        Self {
            next_seq: 0,
            anchor: GENESIS_ANCHOR,
        }
    }

    /// The head after a given entry.
    pub fn after(entry: &LedgerEntry) -> Self {
        Self {
            next_seq: entry.seq + 1,
            anchor: entry.hash,
        }
    }
}

/// Async interface for durable entry persistence.
///
/// # Contract
///
/// - `append_entry` stores the entry and the updated head atomically: after
///   a failure, neither is observable.
/// - Entries are immutable once appended; there is no update or delete.
/// - Readers see only fully committed entries (read-committed isolation).
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Durably append a sealed entry and advance the persisted head.
    ///
    /// The caller guarantees `entry.seq` equals the current head's
    /// `next_seq`; a backend may reject anything else as invalid data.
    async fn append_entry(&self, entry: &LedgerEntry) -> Result<()>;

    /// Get the entry at a sequence number.
    async fn entry_at(&self, seq: u64) -> Result<Option<LedgerEntry>>;

    /// Get up to `limit` entries starting at `from_seq`, in order.
    ///
    /// An empty result means the end of the log.
    async fn entries_from(&self, from_seq: u64, limit: usize) -> Result<Vec<LedgerEntry>>;

    /// Number of entries in the log.
    async fn entry_count(&self) -> Result<u64>;

    /// The persisted head metadata, or `None` if it is missing or was lost.
    async fn head(&self) -> Result<Option<LedgerHead>>;
}

/// Rebuild the head from the entry log, for when the metadata record is lost.
pub async fn recover_head<B: LedgerBackend + ?Sized>(backend: &B) -> Result<LedgerHead> {
    let count = backend.entry_count().await?;
    if count == 0 {
        return Ok(LedgerHead::genesis());
    }
    let last = backend
        .entry_at(count - 1)
        .await?
        .ok_or_else(|| crate::error::StoreError::InvalidData(format!(
            "entry log claims {count} entries but sequence {} is missing",
            count - 1
        )))?;
    Ok(LedgerHead::after(&last))
}
