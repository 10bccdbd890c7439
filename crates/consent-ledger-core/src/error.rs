//! Error types for the consent ledger core.

use std::fmt;

use thiserror::Error;

/// Errors from malformed or out-of-range core data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown entry kind code: {0}")]
    UnknownKind(u16),

    #[error("unknown action type code: {0}")]
    UnknownActionType(u8),

    #[error("unknown risk level code: {0}")]
    UnknownRiskLevel(u8),
}

/// Errors from the signing dependency.
///
/// The signer is an injected external service; `Unavailable` covers the case
/// where it cannot be reached or refuses the key.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid public key")]
    InvalidKey,

    #[error("signature verification failed")]
    Invalid,

    #[error("signing backend unavailable: {0}")]
    Unavailable(String),
}

/// The first broken link found while re-verifying the hash chain.
///
/// Verification stops at the first fault and never repairs anything; the
/// caller is expected to surface this for manual audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("integrity fault at sequence {sequence}: {reason}")]
pub struct IntegrityError {
    /// Sequence number of the faulty entry.
    pub sequence: u64,
    /// What failed at that entry.
    pub reason: IntegrityReason,
}

/// Classification of a chain integrity fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityReason {
    /// Recomputed hash or prev-hash linkage does not match the stored entry.
    HashMismatch,
    /// The entry's signature does not verify.
    SignatureInvalid,
    /// Sequence numbers are not contiguous.
    SequenceGap,
}

impl fmt::Display for IntegrityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntegrityReason::HashMismatch => "hash mismatch",
            IntegrityReason::SignatureInvalid => "signature invalid",
            IntegrityReason::SequenceGap => "sequence gap",
        };
        f.write_str(s)
    }
}
