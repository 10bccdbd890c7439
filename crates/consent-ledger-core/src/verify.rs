//! Chain verification: recompute every hash and signature, stop at the first
//! broken link.
//!
//! Verification is pure read-side work. It never repairs anything; a fault is
//! reported as an [`IntegrityError`] naming the offending sequence number.

use crate::crypto::{EntryHash, SignatureProvider};
use crate::entry::LedgerEntry;
use crate::error::{IntegrityError, IntegrityReason};

/// Streaming verifier over an ordered sequence of entries.
///
/// Feed entries in order via [`check`](Self::check); the verifier tracks the
/// expected sequence number and running anchor so callers can pull entries
/// lazily (from a store cursor or a snapshot) without materializing the whole
/// ledger.
pub struct ChainVerifier<'a> {
    signer: &'a dyn SignatureProvider,
    next_seq: u64,
    anchor: EntryHash,
}

impl<'a> ChainVerifier<'a> {
    /// Start verification at `start_seq`, seeded with the hash of the entry
    /// before it (the genesis anchor when starting from 0).
    pub fn new(signer: &'a dyn SignatureProvider, start_seq: u64, anchor: EntryHash) -> Self {
        Self {
            signer,
            next_seq: start_seq,
            anchor,
        }
    }

    /// Check the next entry against the chain.
    pub fn check(&mut self, entry: &LedgerEntry) -> Result<(), IntegrityError> {
        let fault = |reason| IntegrityError {
            sequence: entry.seq,
            reason,
        };

        if entry.seq != self.next_seq {
            return Err(fault(IntegrityReason::SequenceGap));
        }

        if entry.prev_hash != self.anchor {
            return Err(fault(IntegrityReason::HashMismatch));
        }

        let message = entry.unsigned().chained_message();
        if EntryHash::hash(&message) != entry.hash {
            return Err(fault(IntegrityReason::HashMismatch));
        }

        if self.signer.verify(&message, &entry.signature).is_err() {
            return Err(fault(IntegrityReason::SignatureInvalid));
        }

        self.anchor = entry.hash;
        self.next_seq += 1;
        Ok(())
    }

    /// Hash of the last verified entry (or the seed anchor).
    pub fn anchor(&self) -> EntryHash {
        self.anchor
    }

    /// Sequence number the verifier expects next.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

/// Verify a fully materialized run of entries; returns the final anchor.
pub fn verify_entries(
    entries: &[LedgerEntry],
    start_seq: u64,
    anchor: EntryHash,
    signer: &dyn SignatureProvider,
) -> Result<EntryHash, IntegrityError> {
    let mut verifier = ChainVerifier::new(signer, start_seq, anchor);
    for entry in entries {
        verifier.check(entry)?;
    }
    Ok(verifier.anchor())
}
