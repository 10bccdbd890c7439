//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use consent_ledger::{ConsentLedger, LedgerConfig};
use consent_ledger_core::{
    ConsentAction, ConsentActionType, ConsentId, EntryDraft, LedgerEntry, LocalSigner, RiskLevel,
    GENESIS_ANCHOR,
};
use consent_ledger_store::{LedgerBackend, MemoryBackend};

use crate::generators::ScriptStep;

/// A test fixture with a deterministic signer.
pub struct TestFixture {
    pub signer: Arc<LocalSigner>,
}

impl TestFixture {
    /// Create a fixture with a random signer.
    pub fn new() -> Self {
        Self {
            signer: Arc::new(LocalSigner::generate()),
        }
    }

    /// Create with a deterministic signer from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            signer: Arc::new(LocalSigner::from_seed(&seed)),
        }
    }

    /// Open an in-memory ledger signed by this fixture.
    pub async fn open_memory_ledger(&self) -> ConsentLedger<MemoryBackend> {
        ConsentLedger::open(
            MemoryBackend::new(),
            Arc::clone(&self.signer) as Arc<dyn consent_ledger_core::SignatureProvider>,
            LedgerConfig::default(),
        )
        .await
        .expect("open memory ledger")
    }

    /// Seal a run of drafts into a valid chain starting at the genesis
    /// anchor. Sequences and timestamps are assigned in order.
    pub fn seal_chain(&self, drafts: Vec<EntryDraft>) -> Vec<LedgerEntry> {
        let mut entries = Vec::with_capacity(drafts.len());
        let mut anchor = GENESIS_ANCHOR;
        for (seq, draft) in drafts.into_iter().enumerate() {
            let entry = draft
                .at(seq as u64, anchor)
                .seal(self.signer.as_ref())
                .expect("seal draft");
            anchor = entry.hash;
            entries.push(entry);
        }
        entries
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A medium-risk download action.
pub fn download_action() -> ConsentAction {
    ConsentAction::new(
        ConsentActionType::Download,
        RiskLevel::Medium,
        "download quarterly report",
    )
    .with_target("https://example.com/report.pdf")
}

/// A high-risk camera action.
pub fn camera_action() -> ConsentAction {
    ConsentAction::new(ConsentActionType::AccessCamera, RiskLevel::High, "video call")
}

/// A low-risk filesystem action.
pub fn filesystem_action() -> ConsentAction {
    ConsentAction::new(
        ConsentActionType::AccessFilesystem,
        RiskLevel::Low,
        "read downloads folder",
    )
    .with_target("~/Downloads")
}

/// Run a generated command script against a ledger.
///
/// Approve/Revoke steps address previously created consents by index; a step
/// that lands on a revoked consent may fail with an invalid-transition error,
/// which the script treats as a legal outcome. Any other failure panics.
///
/// Returns the consent ids created by the script.
pub async fn run_script<B: LedgerBackend>(
    ledger: &ConsentLedger<B>,
    script: &[ScriptStep],
) -> Vec<ConsentId> {
    use consent_ledger::LedgerError;

    let mut ids: Vec<ConsentId> = Vec::new();
    for step in script {
        match step {
            ScriptStep::Request { action, user_id } => {
                let id = ledger
                    .request_consent(action.clone(), user_id.clone())
                    .await
                    .expect("request consent");
                ids.push(id);
            }
            ScriptStep::Approve { slot } => {
                if let Some(&id) = pick(&ids, *slot) {
                    match ledger.approve(id).await {
                        Ok(()) | Err(LedgerError::InvalidTransition { .. }) => {}
                        Err(other) => panic!("approve failed: {other}"),
                    }
                }
            }
            ScriptStep::Revoke { slot } => {
                if let Some(&id) = pick(&ids, *slot) {
                    ledger.revoke(id).await.expect("revoke consent");
                }
            }
        }
    }
    ids
}

fn pick(ids: &[ConsentId], slot: usize) -> Option<&ConsentId> {
    if ids.is_empty() {
        None
    } else {
        ids.get(slot % ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_ledger_core::verify_entries;

    #[test]
    fn test_seal_chain_produces_valid_chain() {
        let fixture = TestFixture::with_seed([1; 32]);
        let id = ConsentId::from_bytes([2; 16]);
        let entries = fixture.seal_chain(vec![
            EntryDraft::created(id, download_action(), "user-1", 1_000),
            EntryDraft::approved(id, "user-1", 2_000),
            EntryDraft::revoked(id, "user-1", 3_000),
        ]);

        assert_eq!(entries.len(), 3);
        verify_entries(&entries, 0, GENESIS_ANCHOR, fixture.signer.as_ref()).unwrap();
    }

    #[tokio::test]
    async fn test_run_script_tolerates_dangling_slots() {
        let fixture = TestFixture::with_seed([3; 32]);
        let ledger = fixture.open_memory_ledger().await;

        // Approve before any request exists: the step is skipped.
        let script = vec![
            ScriptStep::Approve { slot: 0 },
            ScriptStep::Request {
                action: camera_action(),
                user_id: "user-1".into(),
            },
            ScriptStep::Revoke { slot: 5 },
            ScriptStep::Approve { slot: 0 },
        ];
        let ids = run_script(&ledger, &script).await;
        assert_eq!(ids.len(), 1);
        ledger.verify_chain(0).await.unwrap();
    }
}
