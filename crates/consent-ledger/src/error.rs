//! The unified error taxonomy for ledger operations.

use consent_ledger_core::{ConsentId, IntegrityError, SignatureError};
use consent_ledger_store::StoreError;
use thiserror::Error;

use crate::projection::ConsentStatus;

/// Errors surfaced by [`ConsentLedger`](crate::ConsentLedger) operations.
///
/// `Storage` and `Signature` abort the whole command with nothing committed;
/// `NotFound` and `InvalidTransition` are recoverable validation failures;
/// `Integrity` is never repaired automatically and demands manual audit.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Durability failure on append or read.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Hash or signature mismatch found during chain verification.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// No Created entry exists for this consent id.
    #[error("consent not found: {0}")]
    NotFound(ConsentId),

    /// Illegal state change, e.g. approving a revoked consent.
    #[error("invalid transition: consent {id} is {state}")]
    InvalidTransition {
        id: ConsentId,
        state: ConsentStatus,
    },

    /// Snapshot import history diverges from the existing ledger.
    #[error("import conflict: history diverges at sequence {seq}")]
    Conflict { seq: u64 },

    /// The signing dependency failed or refused the key.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Snapshot carries a schema version this build cannot verify.
    #[error("unsupported snapshot schema version: {0}")]
    UnsupportedSchema(u32),

    /// Export/import document (de)serialization failure.
    #[error("document error: {0}")]
    Document(#[from] serde_json::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
