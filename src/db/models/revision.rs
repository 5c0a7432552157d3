// src/db/models/revision.rs

//! Revision and RevisionFile models - immutable config set snapshots

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeMap;

/// Path -> content hash listing of a revision
pub type Manifest = BTreeMap<String, String>;

/// A snapshot of one config set at one source-control revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub config_set: String,
    pub revision_id: String,
    pub created_at: Option<String>,
}

impl Revision {
    /// Write a revision and its file manifest
    ///
    /// Rewriting an existing revision with the same manifest is a no-op;
    /// with a different manifest it fails with `AlreadyExists`. Every
    /// content hash must already be stored as a blob.
    pub fn put(
        conn: &Connection,
        config_set: &str,
        revision_id: &str,
        files: &Manifest,
    ) -> Result<()> {
        if let Some(existing) = Self::get_manifest(conn, config_set, revision_id)? {
            if existing == *files {
                return Ok(());
            }
            return Err(Error::AlreadyExists(format!(
                "revision {} of {} with different content",
                revision_id, config_set
            )));
        }

        conn.execute(
            "INSERT INTO revisions (config_set, revision_id) VALUES (?1, ?2)",
            params![config_set, revision_id],
        )?;

        let mut stmt = conn.prepare(
            "INSERT INTO revision_files (config_set, revision_id, path, content_hash)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (path, content_hash) in files {
            stmt.execute(params![config_set, revision_id, path, content_hash])?;
        }

        Ok(())
    }

    /// Find a revision
    pub fn find(conn: &Connection, config_set: &str, revision_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT config_set, revision_id, created_at FROM revisions
             WHERE config_set = ?1 AND revision_id = ?2",
        )?;
        let revision = stmt
            .query_row(params![config_set, revision_id], Self::from_row)
            .optional()?;
        Ok(revision)
    }

    /// Whether a revision is stored
    pub fn exists(conn: &Connection, config_set: &str, revision_id: &str) -> Result<bool> {
        Ok(Self::find(conn, config_set, revision_id)?.is_some())
    }

    /// File manifest of a revision, or `None` if the revision is not stored
    pub fn get_manifest(
        conn: &Connection,
        config_set: &str,
        revision_id: &str,
    ) -> Result<Option<Manifest>> {
        if !Self::exists(conn, config_set, revision_id)? {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT path, content_hash FROM revision_files
             WHERE config_set = ?1 AND revision_id = ?2",
        )?;
        let manifest = stmt
            .query_map(params![config_set, revision_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Manifest, _>>()?;

        Ok(Some(manifest))
    }

    /// All stored revisions of a config set, oldest first
    pub fn list_for_config_set(conn: &Connection, config_set: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT config_set, revision_id, created_at FROM revisions
             WHERE config_set = ?1 ORDER BY created_at, revision_id",
        )?;
        let revisions = stmt
            .query_map([config_set], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(revisions)
    }

    /// Number of stored revisions across all config sets
    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM revisions", [], |row| row.get(0))?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            config_set: row.get(0)?,
            revision_id: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

/// One file of a revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionFile {
    pub config_set: String,
    pub revision_id: String,
    pub path: String,
    pub content_hash: String,
}

impl RevisionFile {
    /// Find one file of a revision
    pub fn find(
        conn: &Connection,
        config_set: &str,
        revision_id: &str,
        path: &str,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT config_set, revision_id, path, content_hash FROM revision_files
             WHERE config_set = ?1 AND revision_id = ?2 AND path = ?3",
        )?;
        let file = stmt
            .query_row(params![config_set, revision_id, path], Self::from_row)
            .optional()?;
        Ok(file)
    }

    /// Content hash of one file of a revision
    pub fn find_hash(
        conn: &Connection,
        config_set: &str,
        revision_id: &str,
        path: &str,
    ) -> Result<Option<String>> {
        Ok(Self::find(conn, config_set, revision_id, path)?.map(|f| f.content_hash))
    }

    /// Number of files (in any revision) referencing a blob
    pub fn count_by_hash(conn: &Connection, content_hash: &str) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM revision_files WHERE content_hash = ?1",
            [content_hash],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            config_set: row.get(0)?,
            revision_id: row.get(1)?,
            path: row.get(2)?,
            content_hash: row.get(3)?,
        })
    }
}
