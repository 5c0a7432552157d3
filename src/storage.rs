// src/storage.rs

//! Reading stored configuration
//!
//! Readers resolve a config set to its latest revision, the revision to a
//! content hash, and the hash to bytes. Content is checked against its hash
//! on the way out, so silent corruption surfaces as `CorruptedState` rather
//! than as bad config.

use crate::db::models::{Blob, ConfigSet, RevisionFile};
use crate::error::{Error, Result};
use crate::hash;
use rusqlite::Connection;
use tracing::debug;

/// Content of `path` at the latest revision of `config_set`
///
/// `Ok(None)` if the config set does not exist, has never been imported, or
/// has no such file.
pub fn read_latest_file(conn: &Connection, config_set: &str, path: &str) -> Result<Option<Vec<u8>>> {
    let Some(revision) = ConfigSet::get_latest(conn, config_set)? else {
        debug!("{} has no latest revision", config_set);
        return Ok(None);
    };
    read_file(conn, config_set, &revision, path)
}

/// Content of `path` at a specific revision of `config_set`
pub fn read_file(
    conn: &Connection,
    config_set: &str,
    revision_id: &str,
    path: &str,
) -> Result<Option<Vec<u8>>> {
    let Some(content_hash) = RevisionFile::find_hash(conn, config_set, revision_id, path)? else {
        return Ok(None);
    };

    let content = Blob::get(conn, &content_hash)?.ok_or_else(|| {
        Error::CorruptedState(format!(
            "{}@{}:{} references missing blob {}",
            config_set, revision_id, path, content_hash
        ))
    })?;

    hash::verify(&content, &content_hash).map_err(|e| {
        Error::CorruptedState(format!("{}@{}:{}: {}", config_set, revision_id, path, e))
    })?;

    Ok(Some(content))
}
