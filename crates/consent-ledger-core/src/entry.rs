//! Ledger entries: the immutable, signed events of the consent audit trail.
//!
//! An entry is never edited once appended. State changes are represented as
//! new entries referencing the same consent id.

use serde::{Deserialize, Serialize};

use crate::action::ConsentAction;
use crate::canonical::canonical_entry_bytes;
use crate::crypto::{Ed25519Signature, EntryHash, SignatureProvider};
use crate::error::{CoreError, SignatureError};
use crate::types::ConsentId;

/// The current entry encoding version, baked into the canonical bytes.
pub const ENTRY_VERSION: u8 = 0;

/// What a ledger entry records about its consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// Consent requested; the record starts life unapproved.
    Created,
    /// The user approved the action.
    Approved,
    /// The user revoked (or rejected) the consent. Terminal for approval.
    Revoked,
}

impl LedgerEntryKind {
    /// Compact code used in the canonical entry encoding.
    pub fn wire_code(self) -> u16 {
        match self {
            Self::Created => 0x0001,
            Self::Approved => 0x0002,
            Self::Revoked => 0x0003,
        }
    }

    /// Try to parse from a wire code.
    pub fn from_wire_code(code: u16) -> Result<Self, CoreError> {
        match code {
            0x0001 => Ok(Self::Created),
            0x0002 => Ok(Self::Approved),
            0x0003 => Ok(Self::Revoked),
            other => Err(CoreError::UnknownKind(other)),
        }
    }
}

/// A complete, sealed ledger entry.
///
/// `hash = Blake3(prev_hash ++ canonical_bytes)` where the canonical bytes
/// cover every field except `hash` and `signature`. The signature covers the
/// same chained message, so both integrity and authenticity are anchored to
/// the position in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position in the ledger. Contiguous, 0-indexed, never reused.
    pub seq: u64,

    /// The consent this entry belongs to.
    pub consent_id: ConsentId,

    /// What happened.
    pub kind: LedgerEntryKind,

    /// The requested action. Present only on `Created` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ConsentAction>,

    /// The user the decision belongs to.
    pub user_id: String,

    /// Decision timestamp (Unix milliseconds).
    pub timestamp: i64,

    /// Hash of the previous entry (genesis anchor for seq 0).
    pub prev_hash: EntryHash,

    /// This entry's chain hash.
    pub hash: EntryHash,

    /// Signature over `prev_hash ++ canonical_bytes`.
    pub signature: Ed25519Signature,
}

impl LedgerEntry {
    /// Rebuild the unsigned shape, for re-verification.
    pub fn unsigned(&self) -> UnsignedEntry {
        UnsignedEntry {
            seq: self.seq,
            consent_id: self.consent_id,
            kind: self.kind,
            action: self.action.clone(),
            user_id: self.user_id.clone(),
            timestamp: self.timestamp,
            prev_hash: self.prev_hash,
        }
    }
}

/// The command-side payload of an entry, before it is placed in the chain.
///
/// Drafts carry no sequence or prev-hash; those are assigned inside the
/// append critical section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub consent_id: ConsentId,
    pub kind: LedgerEntryKind,
    pub action: Option<ConsentAction>,
    pub user_id: String,
    pub timestamp: i64,
}

impl EntryDraft {
    /// Draft a `Created` entry for a fresh consent request.
    pub fn created(
        consent_id: ConsentId,
        action: ConsentAction,
        user_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            consent_id,
            kind: LedgerEntryKind::Created,
            action: Some(action),
            user_id: user_id.into(),
            timestamp,
        }
    }

    /// Draft an `Approved` entry.
    pub fn approved(consent_id: ConsentId, user_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            consent_id,
            kind: LedgerEntryKind::Approved,
            action: None,
            user_id: user_id.into(),
            timestamp,
        }
    }

    /// Draft a `Revoked` entry.
    pub fn revoked(consent_id: ConsentId, user_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            consent_id,
            kind: LedgerEntryKind::Revoked,
            action: None,
            user_id: user_id.into(),
            timestamp,
        }
    }

    /// Place the draft at a chain position, producing the hashable shape.
    pub fn at(self, seq: u64, prev_hash: EntryHash) -> UnsignedEntry {
        UnsignedEntry {
            seq,
            consent_id: self.consent_id,
            kind: self.kind,
            action: self.action,
            user_id: self.user_id,
            timestamp: self.timestamp,
            prev_hash,
        }
    }
}

/// An entry positioned in the chain but not yet hashed or signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEntry {
    pub seq: u64,
    pub consent_id: ConsentId,
    pub kind: LedgerEntryKind,
    pub action: Option<ConsentAction>,
    pub user_id: String,
    pub timestamp: i64,
    pub prev_hash: EntryHash,
}

impl UnsignedEntry {
    /// Deterministic encoding of everything except hash and signature.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_entry_bytes(self)
    }

    /// The chained message: `prev_hash ++ canonical_bytes`.
    ///
    /// Both the entry hash and the signature are computed over this.
    pub fn chained_message(&self) -> Vec<u8> {
        let canonical = self.canonical_bytes();
        let mut message = Vec::with_capacity(32 + canonical.len());
        message.extend_from_slice(self.prev_hash.as_bytes());
        message.extend_from_slice(&canonical);
        message
    }

    /// Hash and sign, producing the sealed entry.
    pub fn seal(self, signer: &dyn SignatureProvider) -> Result<LedgerEntry, SignatureError> {
        let message = self.chained_message();
        let signature = signer.sign(&message)?;
        let hash = EntryHash::hash(&message);

        Ok(LedgerEntry {
            seq: self.seq,
            consent_id: self.consent_id,
            kind: self.kind,
            action: self.action,
            user_id: self.user_id,
            timestamp: self.timestamp,
            prev_hash: self.prev_hash,
            hash,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ConsentActionType, RiskLevel};
    use crate::crypto::{LocalSigner, GENESIS_ANCHOR};

    fn sample_action() -> ConsentAction {
        ConsentAction::new(ConsentActionType::Download, RiskLevel::Medium, "PDF report")
    }

    #[test]
    fn test_kind_wire_roundtrip() {
        for kind in [
            LedgerEntryKind::Created,
            LedgerEntryKind::Approved,
            LedgerEntryKind::Revoked,
        ] {
            assert_eq!(
                LedgerEntryKind::from_wire_code(kind.wire_code()).unwrap(),
                kind
            );
        }
        assert!(LedgerEntryKind::from_wire_code(0).is_err());
    }

    #[test]
    fn test_seal_produces_chained_hash() {
        let signer = LocalSigner::from_seed(&[0x42; 32]);
        let id = ConsentId::from_bytes([1; 16]);

        let entry = EntryDraft::created(id, sample_action(), "user-1", 1_736_870_400_000)
            .at(0, GENESIS_ANCHOR)
            .seal(&signer)
            .unwrap();

        assert_eq!(entry.seq, 0);
        assert_eq!(entry.prev_hash, GENESIS_ANCHOR);
        assert_eq!(entry.hash, EntryHash::hash(&entry.unsigned().chained_message()));
    }

    #[test]
    fn test_seal_is_deterministic_for_same_input() {
        let signer = LocalSigner::from_seed(&[7; 32]);
        let id = ConsentId::from_bytes([2; 16]);

        let make = || {
            EntryDraft::approved(id, "user-1", 1000)
                .at(3, EntryHash::hash(b"prev"))
                .seal(&signer)
                .unwrap()
        };
        assert_eq!(make().hash, make().hash);
    }

    #[test]
    fn test_hash_depends_on_prev() {
        let signer = LocalSigner::from_seed(&[7; 32]);
        let id = ConsentId::from_bytes([2; 16]);

        let a = EntryDraft::approved(id, "user-1", 1000)
            .at(3, EntryHash::hash(b"prev-a"))
            .seal(&signer)
            .unwrap();
        let b = EntryDraft::approved(id, "user-1", 1000)
            .at(3, EntryHash::hash(b"prev-b"))
            .seal(&signer)
            .unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_signature_verifies_over_chained_message() {
        let signer = LocalSigner::from_seed(&[9; 32]);
        let id = ConsentId::generate();

        let entry = EntryDraft::revoked(id, "user-2", 5000)
            .at(0, GENESIS_ANCHOR)
            .seal(&signer)
            .unwrap();

        let message = entry.unsigned().chained_message();
        signer.verify(&message, &entry.signature).unwrap();
    }
}
