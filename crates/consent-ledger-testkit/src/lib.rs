//! # Consent Ledger Testkit
//!
//! Testing utilities for the consent ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: deterministic signers, canned actions, pre-sealed chains,
//!   and ready-to-use in-memory ledgers
//! - **Generators**: proptest strategies, including whole command scripts
//!   for property-based workflow testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use consent_ledger_testkit::fixtures::{download_action, TestFixture};
//!
//! # async fn example() {
//! let fixture = TestFixture::with_seed([7; 32]);
//! let ledger = fixture.open_memory_ledger().await;
//! let id = ledger
//!     .request_consent(download_action(), "user-1")
//!     .await
//!     .unwrap();
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use consent_ledger_testkit::{fixtures, generators};
//!
//! proptest! {
//!     #[test]
//!     fn any_script_leaves_a_verifiable_chain(script in generators::script(24)) {
//!         // drive a ledger with fixtures::run_script, then verify_chain(0)
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{camera_action, download_action, filesystem_action, run_script, TestFixture};
pub use generators::{script, script_step, ScriptStep};
