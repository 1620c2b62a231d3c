//! SQLite store for the live project graph and the review workflow.
//!
//! Every operation opens its own connection. Runtime pragmas:
//! - `journal_mode = WAL` so readers never block the single writer
//! - `busy_timeout = 5s` to absorb short writer overlap across processes
//! - `foreign_keys = ON` so items and summaries cascade with their proposal

pub mod migrations;
pub mod query;
pub mod schema;
pub mod write;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::{path::Path, time::Duration};

use crate::error::Result;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the store inside the workspace directory.
pub const STORE_FILE: &str = "ratify.sqlite3";

/// Open (or create) the store, apply runtime pragmas, and migrate the
/// schema to the latest version.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or opening,
/// configuring or migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut conn = Connection::open(path)?;
    configure_connection(&conn)?;
    migrations::migrate(&mut conn)?;

    Ok(conn)
}

/// In-memory store with the full schema, for tests and dry runs.
///
/// # Errors
///
/// Returns an error if the migrations fail.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations::migrate(&mut conn)?;
    Ok(conn)
}

/// Run `f` inside a `BEGIN IMMEDIATE` transaction and commit on success.
///
/// The write lock is taken up front, so two writers racing on the same
/// store serialize on `busy_timeout` instead of failing on upgrade.
///
/// # Errors
///
/// Returns the error from `f` (the transaction is rolled back) or from
/// beginning or committing the transaction.
pub fn immediate<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Transaction<'_>) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
