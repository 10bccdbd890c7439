//! Concurrency and property-based tests over the append path.

use std::sync::Arc;

use proptest::prelude::*;
use tokio::runtime::Runtime;

use consent_ledger::RecordFilter;
use consent_ledger_core::IntegrityReason;
use consent_ledger_testkit::fixtures::{download_action, run_script, TestFixture};
use consent_ledger_testkit::generators::script;

#[tokio::test]
async fn test_concurrent_requests_serialize_cleanly() {
    let fixture = TestFixture::with_seed([30; 32]);
    let ledger = Arc::new(fixture.open_memory_ledger().await);

    let mut handles = Vec::new();
    for worker in 0..8 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for _ in 0..4 {
                let id = ledger
                    .request_consent(download_action(), format!("user-{worker}"))
                    .await
                    .unwrap();
                ids.push(id);
            }
            ids
        }));
    }

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.await.unwrap());
    }

    // Every request landed, no sequence was lost or reused.
    all_ids.sort();
    all_ids.dedup();
    assert_eq!(all_ids.len(), 32);
    assert_eq!(ledger.query(&RecordFilter::default()).len(), 32);
    ledger.verify_chain(0).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_duplicate_approvals_converge() {
    let fixture = TestFixture::with_seed([31; 32]);
    let ledger = Arc::new(fixture.open_memory_ledger().await);
    let id = ledger
        .request_consent(download_action(), "user-1")
        .await
        .unwrap();

    // Both approvals succeed; exactly one Approved entry is appended.
    let (a, b) = tokio::join!(
        {
            let ledger = Arc::clone(&ledger);
            async move { ledger.approve(id).await }
        },
        {
            let ledger = Arc::clone(&ledger);
            async move { ledger.approve(id).await }
        }
    );
    a.unwrap();
    b.unwrap();

    let mut count = 0;
    let mut iter = ledger.iter_from(0);
    while let Some(entry) = iter.next().await.unwrap() {
        if entry.consent_id == id {
            count += 1;
        }
    }
    assert_eq!(count, 2, "one Created plus exactly one Approved");
    ledger.verify_chain(0).await.unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any sequence of valid commands leaves a chain that verifies from
    /// genesis, and a projection consistent with the log length.
    #[test]
    fn prop_any_script_leaves_verifiable_chain(steps in script(24)) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = TestFixture::with_seed([32; 32]);
            let ledger = fixture.open_memory_ledger().await;

            let ids = run_script(&ledger, &steps).await;

            ledger.verify_chain(0).await.unwrap();
            prop_assert_eq!(ledger.query(&RecordFilter::default()).len(), ids.len());

            // A ledger rebuilt from the exported history projects the same
            // state as the one maintained incrementally.
            let snapshot = ledger.export_snapshot().await.unwrap();
            let rebuilt = fixture.open_memory_ledger().await;
            rebuilt.import_snapshot(&snapshot).await.unwrap();
            prop_assert_eq!(
                rebuilt.query(&RecordFilter::default()),
                ledger.query(&RecordFilter::default())
            );
            Ok(())
        })?;
    }

    /// Corrupting any single committed entry is caught at exactly that
    /// sequence.
    #[test]
    fn prop_tamper_is_located_exactly(steps in script(16), victim in 0usize..64) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let fixture = TestFixture::with_seed([33; 32]);
            let ledger = fixture.open_memory_ledger().await;
            run_script(&ledger, &steps).await;

            let snapshot = ledger.export_snapshot().await.unwrap();
            if snapshot.entries.is_empty() {
                return Ok(());
            }
            let seq = (victim % snapshot.entries.len()) as u64;

            prop_assert!(ledger.backend().tamper_entry(seq, |e| e.timestamp ^= 1));

            match ledger.verify_chain(0).await {
                Err(consent_ledger::LedgerError::Integrity(fault)) => {
                    prop_assert_eq!(fault.sequence, seq);
                    prop_assert_eq!(fault.reason, IntegrityReason::HashMismatch);
                }
                other => return Err(TestCaseError::fail(format!(
                    "expected integrity failure at {seq}, got {other:?}"
                ))),
            }
            Ok(())
        })?;
    }
}
