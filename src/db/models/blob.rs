// src/db/models/blob.rs

//! Blob model - content-addressed file bytes
//!
//! Blobs are keyed by their versioned content hash and are never updated or
//! deleted. Writing a blob that already exists is a no-op, which is what
//! deduplicates identical files across revisions and config sets.

use crate::error::{Error, Result};
use crate::hash;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

/// Stored file content
#[derive(Debug, Clone)]
pub struct Blob {
    pub content_hash: String,
    pub content: Vec<u8>,
    pub size: i64,
    pub created_at: Option<String>,
}

impl Blob {
    /// Store `content` under `content_hash`
    ///
    /// The hash is computed by the writer; it is checked against the content
    /// before anything is written. Returns `true` if the blob was new.
    pub fn put(conn: &Connection, content_hash: &str, content: &[u8]) -> Result<bool> {
        hash::verify(content, content_hash).map_err(|e| Error::ChecksumMismatch {
            expected: e.expected,
            actual: e.actual,
        })?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO blobs (content_hash, content, size) VALUES (?1, ?2, ?3)",
            params![content_hash, content, content.len() as i64],
        )?;

        if inserted > 0 {
            debug!("Stored blob {} ({} bytes)", content_hash, content.len());
        } else {
            debug!("Blob already stored: {}", content_hash);
        }
        Ok(inserted > 0)
    }

    /// Content of a blob, or `None` if it is not stored
    pub fn get(conn: &Connection, content_hash: &str) -> Result<Option<Vec<u8>>> {
        let content = conn
            .query_row(
                "SELECT content FROM blobs WHERE content_hash = ?1",
                [content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    /// Whether a blob is stored
    pub fn exists(conn: &Connection, content_hash: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM blobs WHERE content_hash = ?1",
                [content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Full blob record
    pub fn find(conn: &Connection, content_hash: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT content_hash, content, size, created_at FROM blobs WHERE content_hash = ?1",
        )?;
        let blob = stmt.query_row([content_hash], Self::from_row).optional()?;
        Ok(blob)
    }

    /// Number of stored blobs
    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            content_hash: row.get(0)?,
            content: row.get(1)?,
            size: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}
