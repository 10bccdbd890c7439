//! End-to-end workflow tests: the full consent lifecycle over a real ledger.

use anyhow::Result;
use consent_ledger::{ConsentStatus, LedgerError, RecordFilter};
use consent_ledger_core::{ConsentActionType, ConsentId};
use consent_ledger_testkit::fixtures::{
    camera_action, download_action, filesystem_action, TestFixture,
};

#[tokio::test]
async fn test_request_approve_revoke_keeps_history() -> Result<()> {
    let fixture = TestFixture::with_seed([10; 32]);
    let ledger = fixture.open_memory_ledger().await;

    let id = ledger.request_consent(download_action(), "user-1").await?;
    assert_eq!(ledger.get(&id)?.status(), ConsentStatus::Pending);

    ledger.approve(id).await?;
    let record = ledger.get(&id)?;
    assert!(record.approved);
    assert_eq!(record.status(), ConsentStatus::Approved);

    ledger.revoke(id).await?;
    let record = ledger.get(&id)?;
    assert_eq!(record.status(), ConsentStatus::Revoked);
    assert!(record.approved, "revocation must not erase the approval");
    assert!(record.revoked_at.is_some());

    // Three entries, one per lifecycle step, forming a valid chain.
    let mut entries = Vec::new();
    let mut iter = ledger.iter_from(0);
    while let Some(entry) = iter.next().await? {
        entries.push(entry);
    }
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.consent_id == id));
    ledger.verify_chain(0).await?;
    Ok(())
}

#[tokio::test]
async fn test_decisions_on_unknown_consent_fail() {
    let fixture = TestFixture::with_seed([11; 32]);
    let ledger = fixture.open_memory_ledger().await;
    let ghost = ConsentId::from_bytes([0xee; 16]);

    assert!(matches!(
        ledger.approve(ghost).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        ledger.revoke(ghost).await,
        Err(LedgerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_revocation_is_terminal() -> Result<()> {
    let fixture = TestFixture::with_seed([12; 32]);
    let ledger = fixture.open_memory_ledger().await;

    let id = ledger.request_consent(camera_action(), "user-1").await?;
    ledger.revoke(id).await?;

    match ledger.approve(id).await {
        Err(LedgerError::InvalidTransition { state, .. }) => {
            assert_eq!(state, ConsentStatus::Revoked);
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }

    // Duplicate revocations are idempotent and append nothing.
    let anchor = ledger.anchor();
    ledger.revoke(id).await?;
    ledger.revoke(id).await?;
    assert_eq!(ledger.anchor(), anchor);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_approvals_are_idempotent() -> Result<()> {
    let fixture = TestFixture::with_seed([13; 32]);
    let ledger = fixture.open_memory_ledger().await;

    let id = ledger.request_consent(download_action(), "user-1").await?;
    ledger.approve(id).await?;
    let anchor = ledger.anchor();

    ledger.approve(id).await?;
    assert_eq!(ledger.anchor(), anchor);
    assert_eq!(ledger.get(&id)?.status(), ConsentStatus::Approved);
    Ok(())
}

#[tokio::test]
async fn test_query_filters_and_orders_newest_first() -> Result<()> {
    let fixture = TestFixture::with_seed([14; 32]);
    let ledger = fixture.open_memory_ledger().await;

    let first = ledger.request_consent(download_action(), "user-1").await?;
    let second = ledger.request_consent(camera_action(), "user-1").await?;
    let third = ledger.request_consent(download_action(), "user-2").await?;
    ledger.approve(second).await?;

    let all = ledger.query(&RecordFilter::default());
    assert_eq!(all.len(), 3);
    assert_eq!(all.last().map(|r| r.id), Some(first));

    let pending = ledger.query(&RecordFilter {
        status: Some(ConsentStatus::Pending),
        ..Default::default()
    });
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, third, "newest pending first");

    let downloads = ledger.query(&RecordFilter {
        action_type: Some(ConsentActionType::Download),
        ..Default::default()
    });
    assert_eq!(downloads.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_user_consents_and_latest_decision_wins() -> Result<()> {
    let fixture = TestFixture::with_seed([15; 32]);
    let ledger = fixture.open_memory_ledger().await;

    let early = ledger.request_consent(download_action(), "user-1").await?;
    ledger.approve(early).await?;
    ledger.request_consent(filesystem_action(), "user-1").await?;
    ledger.request_consent(download_action(), "user-2").await?;

    let mine = ledger.user_consents("user-1");
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|r| r.user_id == "user-1"));

    assert!(ledger.is_granted("user-1", ConsentActionType::Download));
    assert!(!ledger.is_granted("user-1", ConsentActionType::AccessCamera));
    assert!(!ledger.is_granted("user-2", ConsentActionType::Download));

    // A newer revocation overrides the earlier approval.
    let late = ledger.request_consent(download_action(), "user-1").await?;
    ledger.revoke(late).await?;
    assert!(!ledger.is_granted("user-1", ConsentActionType::Download));

    // Revoked consents drop out of the per-user listing.
    let mine = ledger.user_consents("user-1");
    assert_eq!(mine.len(), 2);
    Ok(())
}
