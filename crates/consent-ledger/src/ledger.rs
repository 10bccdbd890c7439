//! The ledger facade: single-writer append path, queries, verification.
//!
//! All appends (`request_consent`, `approve`, `revoke`) pass through one
//! `tokio::sync::Mutex` guarding the chain head `(next_seq, anchor)`. That
//! mutex is the only shared mutable state requiring exclusive access; two
//! entries can never be computed against the same prev hash. Workflow
//! validation reads the projection inside the same critical section, so two
//! racing callers cannot both observe "not yet revoked" and append
//! conflicting entries.
//!
//! Reads (queries, iteration, verification, export) run without the write
//! lock and observe only fully committed entries.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use consent_ledger_core::{
    ChainVerifier, ConsentAction, ConsentActionType, ConsentId, EntryDraft, EntryHash,
    IntegrityError, IntegrityReason, LedgerEntry, SignatureProvider, GENESIS_ANCHOR,
};
use consent_ledger_store::{LedgerBackend, LedgerHead};

use crate::error::{LedgerError, Result};
use crate::projection::{ConsentRecord, Projection, RecordFilter};
use crate::workflow::{plan_transition, ConsentCommand};

/// Capacity of the push-notification channel for remote observers.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Configuration for the ledger facade.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Verify the full hash chain when opening the ledger.
    pub verify_on_open: bool,
    /// Batch size for lazy iteration and replay.
    pub iterate_batch: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            verify_on_open: false,
            iterate_batch: 256,
        }
    }
}

/// Pushed to subscribers after each successful append.
///
/// Remote observers combine this with polling `iter_from` and tolerate a few
/// seconds of eventual consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub seq: u64,
    pub anchor: EntryHash,
}

/// The consent ledger: tamper-evident audit trail plus its projection.
pub struct ConsentLedger<B: LedgerBackend> {
    pub(crate) backend: Arc<B>,
    pub(crate) signer: Arc<dyn SignatureProvider>,
    pub(crate) config: LedgerConfig,
    /// The single serialization point for appends.
    pub(crate) write: Mutex<LedgerHead>,
    /// Cheap read path for the current anchor.
    anchor_cache: RwLock<EntryHash>,
    pub(crate) projection: RwLock<Projection>,
    updates: broadcast::Sender<LedgerUpdate>,
}

impl<B: LedgerBackend> ConsentLedger<B> {
    /// Open the ledger over a backend.
    ///
    /// Rebuilds the projection by full replay. The persisted head metadata
    /// only speeds up sanity checks; when it is missing or disagrees with
    /// the log, the replayed head wins and the discrepancy is logged.
    pub async fn open(
        backend: B,
        signer: Arc<dyn SignatureProvider>,
        config: LedgerConfig,
    ) -> Result<Self> {
        let backend = Arc::new(backend);
        let persisted = backend.head().await?;

        let mut projection = Projection::new();
        let mut head = LedgerHead::genesis();
        loop {
            let batch = backend
                .entries_from(head.next_seq, config.iterate_batch)
                .await?;
            if batch.is_empty() {
                break;
            }
            for entry in &batch {
                projection.apply(entry);
                head = LedgerHead::after(entry);
            }
        }

        match persisted {
            None if head.next_seq > 0 => {
                warn!(
                    next_seq = head.next_seq,
                    "head metadata missing, recovered by log replay"
                );
            }
            Some(p) if p != head => {
                warn!(
                    persisted_next_seq = p.next_seq,
                    replayed_next_seq = head.next_seq,
                    "persisted head disagrees with log, using replayed head"
                );
            }
            _ => {}
        }

        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let ledger = Self {
            backend,
            signer,
            config,
            write: Mutex::new(head),
            anchor_cache: RwLock::new(head.anchor),
            projection: RwLock::new(projection),
            updates,
        };

        if ledger.config.verify_on_open {
            ledger.verify_chain(0).await?;
        }

        info!(entries = head.next_seq, "consent ledger opened");
        Ok(ledger)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    /// Record a consent request. Returns immediately with the new id; the
    /// user's decision arrives later via `approve` or `revoke`.
    pub async fn request_consent(
        &self,
        action: ConsentAction,
        user_id: impl Into<String>,
    ) -> Result<ConsentId> {
        let user_id = user_id.into();
        let mut head = self.write.lock().await;

        let id = self.fresh_id();
        let draft = EntryDraft::created(id, action, user_id, now_millis());
        let entry = self.commit(&mut head, draft).await?;

        info!(consent = %id, seq = entry.seq, "consent requested");
        Ok(id)
    }

    /// Record the user approving a consent.
    ///
    /// `NotFound` without a prior request, `InvalidTransition` if already
    /// revoked; approving an approved consent is a no-op success.
    pub async fn approve(&self, id: ConsentId) -> Result<()> {
        self.decide(id, ConsentCommand::Approve).await
    }

    /// Record the user revoking (or rejecting) a consent.
    ///
    /// Legal from Pending or Approved; revoking a revoked consent is a
    /// no-op success.
    pub async fn revoke(&self, id: ConsentId) -> Result<()> {
        self.decide(id, ConsentCommand::Revoke).await
    }

    async fn decide(&self, id: ConsentId, command: ConsentCommand) -> Result<()> {
        let mut head = self.write.lock().await;

        // Validation happens under the write lock: the projected state
        // cannot change between this read and the append below.
        let record = self.projection.read().unwrap().get(&id).cloned();
        let status = record.as_ref().map(ConsentRecord::status);

        if plan_transition(id, status, command)?.is_none() {
            debug!(consent = %id, ?command, "duplicate command, idempotent no-op");
            return Ok(());
        }
        let record = record.ok_or(LedgerError::NotFound(id))?;

        let draft = match command {
            ConsentCommand::Approve => EntryDraft::approved(id, record.user_id, now_millis()),
            ConsentCommand::Revoke => EntryDraft::revoked(id, record.user_id, now_millis()),
        };
        let entry = self.commit(&mut head, draft).await?;

        info!(consent = %id, seq = entry.seq, ?command, "consent decision recorded");
        Ok(())
    }

    /// Seal and durably append a draft at the current head, then advance the
    /// head, warm the projection, and notify subscribers.
    ///
    /// On any failure nothing is committed and the head is untouched, so the
    /// caller can retry the whole command.
    pub(crate) async fn commit(
        &self,
        head: &mut LedgerHead,
        draft: EntryDraft,
    ) -> Result<LedgerEntry> {
        let entry = draft
            .at(head.next_seq, head.anchor)
            .seal(self.signer.as_ref())?;
        self.backend.append_entry(&entry).await?;

        *head = LedgerHead::after(&entry);
        self.set_anchor(head.anchor);
        self.projection.write().unwrap().apply(&entry);
        self.notify(LedgerUpdate {
            seq: entry.seq,
            anchor: entry.hash,
        });

        Ok(entry)
    }

    pub(crate) fn set_anchor(&self, anchor: EntryHash) {
        *self.anchor_cache.write().unwrap() = anchor;
    }

    pub(crate) fn notify(&self, update: LedgerUpdate) {
        // Send fails only when nobody is subscribed.
        let _ = self.updates.send(update);
    }

    fn fresh_id(&self) -> ConsentId {
        let projection = self.projection.read().unwrap();
        loop {
            let id = ConsentId::generate();
            if projection.get(&id).is_none() {
                return id;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Current record for a consent.
    pub fn get(&self, id: &ConsentId) -> Result<ConsentRecord> {
        self.projection
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(LedgerError::NotFound(*id))
    }

    /// Filtered records, newest first.
    pub fn query(&self, filter: &RecordFilter) -> Vec<ConsentRecord> {
        self.projection.read().unwrap().query(filter)
    }

    /// All non-revoked records for a user, newest first.
    pub fn user_consents(&self, user_id: &str) -> Vec<ConsentRecord> {
        self.projection.read().unwrap().user_consents(user_id)
    }

    /// Whether the user's latest decision for an action type grants it.
    pub fn is_granted(&self, user_id: &str, action_type: ConsentActionType) -> bool {
        self.projection.read().unwrap().is_granted(user_id, action_type)
    }

    /// The storage backend behind this ledger.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Hash of the most recently appended entry (genesis anchor if empty).
    pub fn anchor(&self) -> EntryHash {
        *self.anchor_cache.read().unwrap()
    }

    /// Subscribe to append notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerUpdate> {
        self.updates.subscribe()
    }

    /// Lazy cursor over committed entries, starting at `from_seq`.
    ///
    /// Finite: it ends at the log's current tail. Restartable: build a new
    /// cursor from any sequence.
    pub fn iter_from(&self, from_seq: u64) -> LedgerIter<B> {
        LedgerIter::new(
            Arc::clone(&self.backend),
            from_seq,
            self.config.iterate_batch,
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────

    /// Recompute hashes, signatures, and linkage from `from_seq` to the tail.
    ///
    /// Stops at and reports the first broken link. Runs without the write
    /// lock; a fault is surfaced, never repaired.
    pub async fn verify_chain(&self, from_seq: u64) -> Result<()> {
        let seed = if from_seq == 0 {
            GENESIS_ANCHOR
        } else {
            self.backend
                .entry_at(from_seq - 1)
                .await?
                .ok_or(LedgerError::Integrity(IntegrityError {
                    sequence: from_seq - 1,
                    reason: IntegrityReason::SequenceGap,
                }))?
                .hash
        };

        let mut verifier = ChainVerifier::new(self.signer.as_ref(), from_seq, seed);
        let mut iter = self.iter_from(from_seq);
        while let Some(entry) = iter.next().await? {
            if let Err(fault) = verifier.check(&entry) {
                warn!(sequence = fault.sequence, reason = %fault.reason, "chain verification failed");
                return Err(fault.into());
            }
        }
        Ok(())
    }
}

/// Lazy batched cursor over ledger entries.
pub struct LedgerIter<B: LedgerBackend> {
    backend: Arc<B>,
    next_seq: u64,
    batch: VecDeque<LedgerEntry>,
    batch_size: usize,
    exhausted: bool,
}

impl<B: LedgerBackend> LedgerIter<B> {
    fn new(backend: Arc<B>, from_seq: u64, batch_size: usize) -> Self {
        Self {
            backend,
            next_seq: from_seq,
            batch: VecDeque::new(),
            batch_size,
            exhausted: false,
        }
    }

    /// Pull the next entry, fetching a new batch when the buffer runs dry.
    pub async fn next(&mut self) -> Result<Option<LedgerEntry>> {
        if let Some(entry) = self.batch.pop_front() {
            return Ok(Some(entry));
        }
        if self.exhausted {
            return Ok(None);
        }

        let batch = self
            .backend
            .entries_from(self.next_seq, self.batch_size)
            .await?;
        if batch.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.next_seq += batch.len() as u64;
        self.batch.extend(batch);
        Ok(self.batch.pop_front())
    }
}

/// Current time in Unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
