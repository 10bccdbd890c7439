//! The read-optimized projection: current consent state folded from entries.
//!
//! The projection is a disposable cache, never the source of truth. It is
//! rebuilt by full replay at startup and kept warm by applying each entry
//! right after its append. Records are mutated only through the fold, never
//! written directly.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use consent_ledger_core::{
    ConsentAction, ConsentActionType, ConsentId, EntryHash, LedgerEntry, LedgerEntryKind,
};

/// The derived lifecycle state of a consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Pending,
    Approved,
    Revoked,
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsentStatus::Pending => "pending",
            ConsentStatus::Approved => "approved",
            ConsentStatus::Revoked => "revoked",
        };
        f.write_str(s)
    }
}

/// Current-state view of one consent.
///
/// `approved` is preserved across revocation: a record that was approved and
/// later revoked shows `approved = true, revoked_at = Some(..)`, keeping the
/// history visible in the read shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: ConsentId,
    pub action: ConsentAction,
    pub approved: bool,
    pub revoked_at: Option<i64>,
    pub created_at: i64,
    pub user_id: String,
    pub latest_hash: EntryHash,

    /// Sequence of the Created entry; stable tie-break for ordering.
    #[serde(skip)]
    created_seq: u64,
}

impl ConsentRecord {
    /// Derive the lifecycle status.
    pub fn status(&self) -> ConsentStatus {
        if self.revoked_at.is_some() {
            ConsentStatus::Revoked
        } else if self.approved {
            ConsentStatus::Approved
        } else {
            ConsentStatus::Pending
        }
    }
}

/// Query filter for [`Projection::query`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Keep only records for this action type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ConsentActionType>,
    /// Keep only records in this lifecycle state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConsentStatus>,
}

impl RecordFilter {
    fn matches(&self, record: &ConsentRecord) -> bool {
        if let Some(action_type) = self.action_type {
            if record.action.action_type != action_type {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status() != status {
                return false;
            }
        }
        true
    }
}

/// In-memory fold of the ledger, keyed by consent id.
#[derive(Debug, Default)]
pub struct Projection {
    records: HashMap<ConsentId, ConsentRecord>,
    /// Sequence number the projection expects next.
    next_seq: u64,
}

impl Projection {
    /// Create an empty projection (as of genesis).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the projection expects next.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Fold one entry into the projection.
    ///
    /// Idempotent by sequence number: an already-applied sequence is a no-op,
    /// so replays and at-least-once delivery are safe.
    pub fn apply(&mut self, entry: &LedgerEntry) {
        if entry.seq < self.next_seq {
            return;
        }
        self.next_seq = entry.seq + 1;

        match entry.kind {
            LedgerEntryKind::Created => {
                let Some(action) = entry.action.clone() else {
                    debug!(seq = entry.seq, "created entry without action ignored");
                    return;
                };
                self.records
                    .entry(entry.consent_id)
                    .or_insert(ConsentRecord {
                        id: entry.consent_id,
                        action,
                        approved: false,
                        revoked_at: None,
                        created_at: entry.timestamp,
                        user_id: entry.user_id.clone(),
                        latest_hash: entry.hash,
                        created_seq: entry.seq,
                    });
            }
            LedgerEntryKind::Approved => {
                if let Some(record) = self.records.get_mut(&entry.consent_id) {
                    // The workflow forbids approve-after-revoke; ignore it
                    // here as well rather than corrupting the record.
                    if record.revoked_at.is_none() {
                        record.approved = true;
                        record.latest_hash = entry.hash;
                    }
                }
            }
            LedgerEntryKind::Revoked => {
                if let Some(record) = self.records.get_mut(&entry.consent_id) {
                    record.revoked_at = Some(entry.timestamp);
                    record.latest_hash = entry.hash;
                }
            }
        }
    }

    /// Current record for a consent.
    pub fn get(&self, id: &ConsentId) -> Option<&ConsentRecord> {
        self.records.get(id)
    }

    /// Filtered records, newest first by creation time.
    pub fn query(&self, filter: &RecordFilter) -> Vec<ConsentRecord> {
        let mut records: Vec<ConsentRecord> = self
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.created_seq.cmp(&a.created_seq))
        });
        records
    }

    /// All non-revoked records for a user, newest first.
    pub fn user_consents(&self, user_id: &str) -> Vec<ConsentRecord> {
        let mut records: Vec<ConsentRecord> = self
            .records
            .values()
            .filter(|r| r.user_id == user_id && r.revoked_at.is_none())
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.created_seq.cmp(&a.created_seq))
        });
        records
    }

    /// Whether the user's latest decision for an action type grants it.
    ///
    /// Latest decision wins; default deny when nothing matches.
    pub fn is_granted(&self, user_id: &str, action_type: ConsentActionType) -> bool {
        self.records
            .values()
            .filter(|r| r.user_id == user_id && r.action.action_type == action_type)
            .max_by_key(|r| (r.created_at, r.created_seq))
            .map(|r| r.status() == ConsentStatus::Approved)
            .unwrap_or(false)
    }
}
