//! # Consent Ledger
//!
//! A tamper-evident, append-only record of user consent decisions, with a
//! disposable projection for fast queries.
//!
//! ## Overview
//!
//! - **Entries**: Immutable, signed, hash-chained events (Created, Approved,
//!   Revoked). The ledger is the source of truth; entries are never edited.
//! - **Workflow**: The Pending → Approved → Revoked state machine that gates
//!   every decision before it is appended.
//! - **Projection**: The current per-consent state, folded from the log and
//!   rebuilt from scratch on every open.
//! - **Vault**: Self-verifying snapshots for backup and transfer between
//!   stores.
//!
//! ## Key Concepts
//!
//! - **Revocation preserves history**: a revoked consent keeps its approval
//!   record; only `revoked_at` is added.
//! - **Anchor**: the hash of the newest entry. Two ledgers with the same
//!   anchor hold identical history.
//! - **Single writer**: all appends serialize through one lock, so the chain
//!   never forks.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use consent_ledger::{ConsentLedger, LedgerConfig};
//! use consent_ledger::core::{ConsentAction, ConsentActionType, LocalSigner, RiskLevel};
//! use consent_ledger::store::SqliteBackend;
//!
//! async fn example() {
//!     let signer = Arc::new(LocalSigner::generate());
//!     let backend = SqliteBackend::open("consent.db").unwrap();
//!     let ledger = ConsentLedger::open(backend, signer, LedgerConfig::default())
//!         .await
//!         .unwrap();
//!
//!     let action = ConsentAction::new(
//!         ConsentActionType::Download,
//!         RiskLevel::Medium,
//!         "download quarterly report",
//!     );
//!     let id = ledger.request_consent(action, "user-1").await.unwrap();
//!     ledger.approve(id).await.unwrap();
//!
//!     ledger.verify_chain(0).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `consent_ledger::core` - entry, chain, and signing primitives
//! - `consent_ledger::store` - storage abstraction, memory and SQLite

pub mod api;
pub mod error;
pub mod ledger;
pub mod projection;
pub mod vault;
pub mod workflow;

// Re-export component crates
pub use consent_ledger_core as core;
pub use consent_ledger_store as store;

pub use error::{LedgerError, Result};
pub use ledger::{ConsentLedger, LedgerConfig, LedgerIter, LedgerUpdate};
pub use projection::{ConsentRecord, ConsentStatus, RecordFilter};
pub use vault::{verify_snapshot, VaultSnapshot, SNAPSHOT_SCHEMA_VERSION};

// Commonly used core types
pub use consent_ledger_core::{
    ConsentAction, ConsentActionType, ConsentId, Ed25519PublicKey, Ed25519Signature, EntryHash,
    LedgerEntry, LedgerEntryKind, LocalSigner, RiskLevel, SignatureProvider, GENESIS_ANCHOR,
};
