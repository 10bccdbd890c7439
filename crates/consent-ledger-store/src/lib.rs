//! # Consent Ledger Store
//!
//! Durable backends for the consent ledger.
//!
//! The [`LedgerBackend`] trait is the seam between the chain logic and
//! persistence. Two implementations:
//!
//! - [`SqliteBackend`] - the primary backend: an append-only entry table
//!   plus a single-row head metadata record, written transactionally.
//! - [`MemoryBackend`] - same semantics, nothing persisted; for tests.
//!
//! Backends never compute hashes or validate workflow transitions; they
//! store sealed entries in strict sequence order.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use traits::{recover_head, LedgerBackend, LedgerHead};
