//! Vault export/import across real stores, including SQLite on disk.

use std::sync::Arc;

use anyhow::Result;
use consent_ledger::{
    verify_snapshot, ConsentLedger, ConsentStatus, LedgerConfig, LedgerError, RecordFilter,
};
use consent_ledger_core::SignatureProvider;
use consent_ledger_store::SqliteBackend;
use consent_ledger_testkit::fixtures::{camera_action, download_action, TestFixture};

#[tokio::test]
async fn test_exported_snapshot_always_verifies() -> Result<()> {
    let fixture = TestFixture::with_seed([20; 32]);
    let ledger = fixture.open_memory_ledger().await;

    // Verify at each stage of a growing ledger, empty included.
    for step in 0..4 {
        let snapshot = ledger.export_snapshot().await?;
        verify_snapshot(&snapshot, fixture.signer.as_ref())?;
        assert_eq!(snapshot.entries.len(), step);
        assert_eq!(snapshot.anchor, ledger.anchor());

        ledger
            .request_consent(download_action(), format!("user-{step}"))
            .await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_single_byte_tamper_is_detected() -> Result<()> {
    let fixture = TestFixture::with_seed([21; 32]);
    let ledger = fixture.open_memory_ledger().await;
    let id = ledger.request_consent(camera_action(), "user-1").await?;
    ledger.approve(id).await?;

    let clean = ledger.export_snapshot().await?;

    // Flip one byte of a mid-chain entry's stored hash.
    let mut tampered = clean.clone();
    tampered.entries[0].hash.0[5] ^= 0x01;
    match verify_snapshot(&tampered, fixture.signer.as_ref()) {
        Err(LedgerError::Integrity(fault)) => assert_eq!(fault.sequence, 0),
        other => panic!("expected integrity error, got {other:?}"),
    }

    // Flip one byte of a signature instead.
    let mut tampered = clean.clone();
    tampered.entries[1].signature.0[0] ^= 0x01;
    match verify_snapshot(&tampered, fixture.signer.as_ref()) {
        Err(LedgerError::Integrity(fault)) => assert_eq!(fault.sequence, 1),
        other => panic!("expected integrity error, got {other:?}"),
    }

    verify_snapshot(&clean, fixture.signer.as_ref())?;
    Ok(())
}

#[tokio::test]
async fn test_snapshot_moves_ledger_between_stores() -> Result<()> {
    let fixture = TestFixture::with_seed([22; 32]);
    let source = fixture.open_memory_ledger().await;

    let a = source.request_consent(download_action(), "user-1").await?;
    let b = source.request_consent(camera_action(), "user-2").await?;
    source.approve(a).await?;
    source.revoke(b).await?;

    let document = source.export_document().await?;
    let snapshot = serde_json::from_str(&document)?;

    let target = fixture.open_memory_ledger().await;
    let appended = target.import_snapshot(&snapshot).await?;
    assert_eq!(appended, 4);
    assert_eq!(target.anchor(), source.anchor());
    target.verify_chain(0).await?;

    // The projection converges with the source's.
    assert_eq!(target.get(&a)?.status(), ConsentStatus::Approved);
    assert_eq!(target.get(&b)?.status(), ConsentStatus::Revoked);
    assert_eq!(
        target.query(&RecordFilter::default()).len(),
        source.query(&RecordFilter::default()).len()
    );
    Ok(())
}

#[tokio::test]
async fn test_import_into_sqlite_survives_reopen() -> Result<()> {
    let fixture = TestFixture::with_seed([23; 32]);
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("consent.db");

    let source = fixture.open_memory_ledger().await;
    let id = source.request_consent(download_action(), "user-1").await?;
    source.approve(id).await?;
    let snapshot = source.export_snapshot().await?;

    {
        let backend = SqliteBackend::open(&path)?;
        let ledger = ConsentLedger::open(
            backend,
            Arc::clone(&fixture.signer) as Arc<dyn SignatureProvider>,
            LedgerConfig::default(),
        )
        .await?;
        assert_eq!(ledger.import_snapshot(&snapshot).await?, 2);
    }

    let backend = SqliteBackend::open(&path)?;
    let reopened = ConsentLedger::open(
        backend,
        Arc::clone(&fixture.signer) as Arc<dyn SignatureProvider>,
        LedgerConfig {
            verify_on_open: true,
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(reopened.anchor(), source.anchor());
    assert_eq!(reopened.get(&id)?.status(), ConsentStatus::Approved);
    Ok(())
}

#[tokio::test]
async fn test_divergent_import_leaves_ledger_untouched() -> Result<()> {
    let fixture = TestFixture::with_seed([24; 32]);
    let source = fixture.open_memory_ledger().await;
    source.request_consent(download_action(), "user-1").await?;
    let snapshot = source.export_snapshot().await?;

    let target = fixture.open_memory_ledger().await;
    target.request_consent(camera_action(), "user-9").await?;
    let anchor_before = target.anchor();

    match target.import_snapshot(&snapshot).await {
        Err(LedgerError::Conflict { seq }) => assert_eq!(seq, 0),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(target.anchor(), anchor_before);
    target.verify_chain(0).await?;
    Ok(())
}
