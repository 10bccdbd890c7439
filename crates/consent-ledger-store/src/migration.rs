//! Database schema migrations for SQLite.
//!
//! Simple versioned migrations: each one transforms the schema from version
//! N to N+1 inside a transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: the append-only entry log plus the head metadata record.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- The ledger itself. Rows are inserted in strict sequence order and
        -- never updated or deleted.
        CREATE TABLE entries (
            seq INTEGER PRIMARY KEY,          -- 0-indexed, contiguous
            consent_id BLOB NOT NULL,         -- 16 bytes
            kind INTEGER NOT NULL,            -- LedgerEntryKind wire code
            action BLOB,                      -- CBOR ConsentAction, Created only
            user_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,       -- Unix ms
            prev_hash BLOB NOT NULL,          -- 32 bytes
            hash BLOB NOT NULL,               -- 32 bytes
            signature BLOB NOT NULL           -- 64 bytes
        );

        CREATE INDEX idx_entries_consent ON entries(consent_id, seq);

        -- Single-row head cache for fast startup. Losing this row is
        -- recoverable by replaying the entries table.
        CREATE TABLE ledger_head (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            next_seq INTEGER NOT NULL,
            anchor BLOB NOT NULL
        );
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
