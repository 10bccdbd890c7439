//! # Consent Ledger Core
//!
//! Pure primitives for the consent ledger: entries, canonical encoding,
//! hashing, signing, and chain verification.
//!
//! This crate contains no I/O, no storage, no async. It is pure computation
//! over the audit-trail data structures.
//!
//! ## Key Types
//!
//! - [`LedgerEntry`] - one immutable, hash-chained, signed consent event
//! - [`ConsentAction`] - the sensitive action a consent covers
//! - [`ConsentId`] - identifier tying a consent's entries together
//! - [`SignatureProvider`] - the injected signing dependency
//! - [`ChainVerifier`] - streaming tamper detection
//!
//! ## Canonicalization
//!
//! Entries are hashed and signed over a deterministic CBOR encoding; see the
//! [`canonical`] module.

pub mod action;
pub mod canonical;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod types;
pub mod verify;

pub use action::{ConsentAction, ConsentActionType, RiskLevel};
pub use canonical::canonical_entry_bytes;
pub use crypto::{
    Ed25519PublicKey, Ed25519Signature, EntryHash, LocalSigner, SignatureProvider, GENESIS_ANCHOR,
};
pub use entry::{EntryDraft, LedgerEntry, LedgerEntryKind, UnsignedEntry, ENTRY_VERSION};
pub use error::{CoreError, IntegrityError, IntegrityReason, SignatureError};
pub use types::ConsentId;
pub use verify::{verify_entries, ChainVerifier};
