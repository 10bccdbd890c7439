//! SQLite implementation of the backend trait.
//!
//! The primary durable backend: rusqlite with bundled SQLite, wrapped in
//! `spawn_blocking` so ledger reads and writes never block the async runtime.
//! Entry row and head metadata are written in one transaction, so a failed
//! append leaves nothing behind.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use consent_ledger_core::{
    ConsentAction, ConsentId, Ed25519Signature, EntryHash, LedgerEntry, LedgerEntryKind,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{LedgerBackend, LedgerHead};

/// SQLite-based backend.
///
/// Thread-safe via an internal connection mutex.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open a database at the given path, creating and migrating as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database. Useful for tests.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::InvalidData(format!("connection mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(format!("blocking task failed: {e}"))))?
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    use rusqlite::types::Type;

    let blob_err = |name: &str| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Blob,
            format!("bad {name} length").into(),
        )
    };

    let consent_id_bytes: Vec<u8> = row.get("consent_id")?;
    let prev_hash_bytes: Vec<u8> = row.get("prev_hash")?;
    let hash_bytes: Vec<u8> = row.get("hash")?;
    let signature_bytes: Vec<u8> = row.get("signature")?;
    let action_cbor: Option<Vec<u8>> = row.get("action")?;
    let kind_code: u16 = row.get("kind")?;

    let kind = LedgerEntryKind::from_wire_code(kind_code)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))?;

    let action: Option<ConsentAction> = match action_cbor {
        Some(bytes) => Some(ciborium::from_reader(&bytes[..]).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Blob, Box::new(e))
        })?),
        None => None,
    };

    Ok(LedgerEntry {
        seq: row.get("seq")?,
        consent_id: ConsentId::from_bytes(
            consent_id_bytes
                .try_into()
                .map_err(|_| blob_err("consent_id"))?,
        ),
        kind,
        action,
        user_id: row.get("user_id")?,
        timestamp: row.get("timestamp")?,
        prev_hash: EntryHash::from_bytes(
            prev_hash_bytes
                .try_into()
                .map_err(|_| blob_err("prev_hash"))?,
        ),
        hash: EntryHash::from_bytes(hash_bytes.try_into().map_err(|_| blob_err("hash"))?),
        signature: Ed25519Signature::from_bytes(
            signature_bytes
                .try_into()
                .map_err(|_| blob_err("signature"))?,
        ),
    })
}

fn encode_action(action: &ConsentAction) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(action, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

const ENTRY_COLUMNS: &str =
    "seq, consent_id, kind, action, user_id, timestamp, prev_hash, hash, signature";

#[async_trait]
impl LedgerBackend for SqliteBackend {
    async fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let entry = entry.clone();
        let action_cbor = entry.action.as_ref().map(encode_action).transpose()?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let persisted_next: Option<u64> = tx
                .query_row("SELECT next_seq FROM ledger_head WHERE id = 0", [], |row| {
                    row.get(0)
                })
                .optional()?;
            if let Some(next) = persisted_next {
                if entry.seq != next {
                    return Err(StoreError::InvalidData(format!(
                        "append out of order: got seq {}, expected {next}",
                        entry.seq
                    )));
                }
            }

            tx.execute(
                "INSERT INTO entries (seq, consent_id, kind, action, user_id, timestamp,
                                      prev_hash, hash, signature)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.seq,
                    entry.consent_id.as_bytes().as_slice(),
                    entry.kind.wire_code(),
                    action_cbor,
                    entry.user_id,
                    entry.timestamp,
                    entry.prev_hash.as_bytes().as_slice(),
                    entry.hash.as_bytes().as_slice(),
                    entry.signature.as_bytes().as_slice(),
                ],
            )?;

            tx.execute(
                "INSERT OR REPLACE INTO ledger_head (id, next_seq, anchor) VALUES (0, ?1, ?2)",
                params![entry.seq + 1, entry.hash.as_bytes().as_slice()],
            )?;

            tx.commit()?;
            debug!(seq = entry.seq, "entry committed");
            Ok(())
        })
        .await
    }

    async fn entry_at(&self, seq: u64) -> Result<Option<LedgerEntry>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE seq = ?1"),
                params![seq],
                row_to_entry,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn entries_from(&self, from_seq: u64, limit: usize) -> Result<Vec<LedgerEntry>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries WHERE seq >= ?1 ORDER BY seq LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![from_seq, limit as i64], row_to_entry)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
    }

    async fn entry_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
                .map_err(StoreError::from)
        })
        .await
    }

    async fn head(&self) -> Result<Option<LedgerHead>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT next_seq, anchor FROM ledger_head WHERE id = 0",
                [],
                |row| {
                    let next_seq: u64 = row.get(0)?;
                    let anchor_bytes: Vec<u8> = row.get(1)?;
                    Ok((next_seq, anchor_bytes))
                },
            )
            .optional()?
            .map(|(next_seq, anchor_bytes)| {
                let anchor = EntryHash::from_bytes(anchor_bytes.try_into().map_err(|_| {
                    StoreError::InvalidData("ledger_head anchor is not 32 bytes".into())
                })?);
                Ok(LedgerHead { next_seq, anchor })
            })
            .transpose()
        })
        .await
    }
}
