// src/db/mod.rs

//! SQLite persistence for imported configuration
//!
//! All state lives in a single SQLite database:
//! - `blobs`: content-addressed file bytes
//! - `revisions` / `revision_files`: immutable manifests per config set
//! - `config_sets`: latest revision pointer and import metadata
//! - `project_import_info`: where each project was last imported from
//!
//! Each import opens its own connection, so imports of different config
//! sets run in parallel; SQLite serializes the short publish transactions.

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a writer waits for the database lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the database (and its directory) and apply migrations
pub fn init(db_path: impl AsRef<Path>) -> Result<()> {
    let db_path = db_path.as_ref();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            debug!("Created database directory: {}", parent.display());
        }
    }

    let conn = open(db_path)?;
    schema::migrate(&conn)?;
    info!("Database ready at {}", db_path.display());
    Ok(())
}

/// Open an existing database with the settings every connection needs
pub fn open(db_path: impl AsRef<Path>) -> Result<Connection> {
    let db_path = db_path.as_ref();
    let conn = Connection::open(db_path)?;

    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    Ok(conn)
}

/// Run `f` inside an immediate (write-locked) transaction for publishing
///
/// Errors from `f` roll back and are returned unchanged. A failure of the
/// final `COMMIT` is reported as [`Error::CommitAmbiguous`]: the caller
/// cannot tell whether the writes landed and should re-run the import,
/// which is safe because every write it makes is idempotent.
pub fn publish_transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let result = f(&tx)?;
    tx.commit().map_err(|e| {
        warn!("Publish commit failed: {}", e);
        Error::CommitAmbiguous(e.to_string())
    })?;
    Ok(result)
}
