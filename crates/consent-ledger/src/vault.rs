//! Snapshot export, verification, and import.
//!
//! A snapshot is the full entry run plus the anchor it ends at, wrapped in a
//! versioned envelope. Verification re-derives every hash and signature from
//! the genesis anchor, so a snapshot stands on its own: no database, no
//! network, just the document and the signer's public key.

use serde::{Deserialize, Serialize};
use tracing::info;

use consent_ledger_core::{
    verify_entries, EntryHash, LedgerEntry, SignatureProvider, GENESIS_ANCHOR,
};
use consent_ledger_store::{LedgerBackend, LedgerHead};

use crate::error::{LedgerError, Result};
use crate::ledger::{now_millis, ConsentLedger, LedgerUpdate};

/// Schema version written into every exported snapshot.
///
/// Bump only with a migration path; importers refuse versions they do not
/// know.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// A portable, self-verifying copy of the whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// Envelope schema version, checked before anything else.
    pub schema_version: u32,
    /// Every committed entry, in sequence order from 0.
    pub entries: Vec<LedgerEntry>,
    /// Hash of the last entry (genesis anchor when empty).
    pub anchor: EntryHash,
    /// Export wall-clock time (Unix milliseconds). Informational only; not
    /// covered by any hash.
    pub updated_at: i64,
}

impl VaultSnapshot {
    /// Sequence the next appended entry would take.
    pub fn next_seq(&self) -> u64 {
        self.entries.len() as u64
    }
}

/// Check a snapshot end to end: schema version, every hash, every signature,
/// the linkage between entries, and the claimed anchor.
///
/// Reports the first fault and stops.
pub fn verify_snapshot(snapshot: &VaultSnapshot, signer: &dyn SignatureProvider) -> Result<()> {
    if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(LedgerError::UnsupportedSchema(snapshot.schema_version));
    }

    let anchor = verify_entries(&snapshot.entries, 0, GENESIS_ANCHOR, signer)?;
    if anchor != snapshot.anchor {
        // The entries check out but the envelope claims a different tail.
        return Err(LedgerError::Integrity(consent_ledger_core::IntegrityError {
            sequence: snapshot.next_seq().saturating_sub(1),
            reason: consent_ledger_core::IntegrityReason::HashMismatch,
        }));
    }
    Ok(())
}

impl<B: LedgerBackend> ConsentLedger<B> {
    /// Export the full ledger as a snapshot.
    ///
    /// Runs without the write lock: the anchor is taken from the last entry
    /// actually read, so an append racing with the export just lands in the
    /// next snapshot.
    pub async fn export_snapshot(&self) -> Result<VaultSnapshot> {
        let mut entries = Vec::new();
        let mut iter = self.iter_from(0);
        while let Some(entry) = iter.next().await? {
            entries.push(entry);
        }
        let anchor = entries.last().map_or(GENESIS_ANCHOR, |e| e.hash);

        info!(entries = entries.len(), "vault snapshot exported");
        Ok(VaultSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            entries,
            anchor,
            updated_at: now_millis(),
        })
    }

    /// Export as a JSON document, for file-based vault transports.
    pub async fn export_document(&self) -> Result<String> {
        let snapshot = self.export_snapshot().await?;
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Import a snapshot, appending the entries this ledger does not have.
    ///
    /// The snapshot is verified in full before anything is touched; a
    /// tampered snapshot leaves the ledger exactly as it was. The existing
    /// log must be a prefix of the snapshot, otherwise `Conflict` tells the
    /// caller where history diverges. Returns the number of entries
    /// appended.
    pub async fn import_snapshot(&self, snapshot: &VaultSnapshot) -> Result<u64> {
        verify_snapshot(snapshot, self.signer.as_ref())?;

        let mut head = self.write.lock().await;

        if snapshot.next_seq() < head.next_seq {
            // The snapshot is shorter than the local log; it cannot contain
            // anything new, and it cannot contradict us if its last entry
            // links correctly. Check the boundary and stop.
            let boundary = snapshot.next_seq();
            if boundary > 0 {
                let local = self
                    .backend
                    .entry_at(boundary - 1)
                    .await?
                    .ok_or(LedgerError::Conflict { seq: boundary - 1 })?;
                if local.hash != snapshot.anchor {
                    return Err(LedgerError::Conflict { seq: boundary - 1 });
                }
            }
            return Ok(0);
        }

        // Prefix check: hashes are content-derived and chained, so a single
        // boundary comparison proves every earlier entry matches too.
        if head.next_seq > 0 {
            let boundary = &snapshot.entries[head.next_seq as usize - 1];
            if boundary.hash != head.anchor {
                return Err(LedgerError::Conflict {
                    seq: divergence_seq(&snapshot.entries, self.backend.as_ref(), head.next_seq)
                        .await?,
                });
            }
        }

        let tail = &snapshot.entries[head.next_seq as usize..];
        for entry in tail {
            self.backend.append_entry(entry).await?;
            *head = LedgerHead::after(entry);
        }

        let appended = tail.len() as u64;
        if appended > 0 {
            self.finish_import(&head, tail);
        }
        info!(appended, next_seq = head.next_seq, "vault snapshot imported");
        Ok(appended)
    }

    fn finish_import(&self, head: &LedgerHead, tail: &[LedgerEntry]) {
        let mut projection = self.projection.write().unwrap();
        for entry in tail {
            projection.apply(entry);
        }
        drop(projection);
        self.set_anchor(head.anchor);
        if let Some(last) = tail.last() {
            self.notify(LedgerUpdate {
                seq: last.seq,
                anchor: last.hash,
            });
        }
    }
}

/// Walk back from the boundary to the first sequence where the snapshot and
/// the local log disagree.
async fn divergence_seq<B: LedgerBackend>(
    entries: &[LedgerEntry],
    backend: &B,
    local_next_seq: u64,
) -> Result<u64> {
    for seq in 0..local_next_seq {
        let local = backend.entry_at(seq).await?;
        let matches = local
            .map(|l| entries.get(seq as usize).map(|s| s.hash) == Some(l.hash))
            .unwrap_or(false);
        if !matches {
            return Ok(seq);
        }
    }
    Ok(local_next_seq.saturating_sub(1))
}
