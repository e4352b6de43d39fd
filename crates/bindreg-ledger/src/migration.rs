//! SQLite schema migrations.
//!
//! `MIGRATIONS[n]` moves the schema from version `n` to `n + 1`. Applied
//! versions are recorded in `schema_migrations`.

use rusqlite::{params, Connection};

use crate::error::{LedgerError, Result};

/// Deployment record and transition log.
const V1: &str = r#"
    -- At most one registry per database.
    CREATE TABLE deployment (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        admin BLOB NOT NULL,              -- Ed25519 public key
        genesis_state BLOB NOT NULL,      -- CBOR RegistryState at version 0
        deployed_at INTEGER NOT NULL
    );

    -- One row per applied transition; versions are contiguous from 1.
    CREATE TABLE transitions (
        version INTEGER PRIMARY KEY,
        request_id BLOB NOT NULL,
        caller BLOB NOT NULL,
        request BLOB NOT NULL,            -- signed request, canonical bytes
        state BLOB NOT NULL,              -- CBOR RegistryState after the request
        event BLOB,                       -- CBOR RegistryEvent, deposits only
        applied_at INTEGER NOT NULL
    );

    CREATE INDEX idx_transitions_caller ON transitions(caller);
"#;

const MIGRATIONS: &[&str] = &[V1];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
///
/// Refuses databases written by a newer schema.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    if current > CURRENT_VERSION {
        return Err(LedgerError::Migration(format!(
            "schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    let pending = &MIGRATIONS[current as usize..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in (current + 1..).zip(pending) {
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, now_millis()],
        )?;
        tracing::debug!(version, "schema migrated");
    }
    tx.commit()?;
    Ok(())
}

/// Wall-clock milliseconds, or 0 if the clock is before the epoch.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        for table in ["deployment", "transitions", "schema_migrations"] {
            let found: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(found, "missing table {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let (rows, max): (u32, u32) = conn
            .query_row("SELECT COUNT(*), MAX(version) FROM schema_migrations", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!((rows, max), (CURRENT_VERSION, CURRENT_VERSION));
    }

    #[test]
    fn test_newer_schema_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();
        assert!(matches!(migrate(&mut conn), Err(LedgerError::Migration(_))));
    }

    #[test]
    fn test_single_deployment_row() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO deployment (id, admin, genesis_state, deployed_at) VALUES (1, x'00', x'00', 0)",
            [],
        )
        .unwrap();
        assert!(conn
            .execute(
                "INSERT INTO deployment (id, admin, genesis_state, deployed_at) VALUES (2, x'00', x'00', 0)",
                [],
            )
            .is_err());
    }
}
