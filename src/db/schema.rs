// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! This module defines the SQLite schema for the config store and provides
//! a migration system to evolve the schema over time.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(crate::error::Error::InitError(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}

/// Initial schema - Version 1
///
/// The composite foreign key from `config_sets` to `revisions` makes it
/// impossible to point a config set at a revision that was never written.
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        -- Blobs: file content keyed by versioned content hash
        CREATE TABLE blobs (
            content_hash TEXT PRIMARY KEY,
            content BLOB NOT NULL,
            size INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- Revisions: immutable snapshots of a config set
        CREATE TABLE revisions (
            config_set TEXT NOT NULL,
            revision_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (config_set, revision_id)
        );

        -- Revision files: path -> blob manifest of a revision
        CREATE TABLE revision_files (
            config_set TEXT NOT NULL,
            revision_id TEXT NOT NULL,
            path TEXT NOT NULL,
            content_hash TEXT NOT NULL REFERENCES blobs(content_hash),
            PRIMARY KEY (config_set, revision_id, path),
            FOREIGN KEY (config_set, revision_id)
                REFERENCES revisions(config_set, revision_id) ON DELETE CASCADE
        );

        CREATE INDEX idx_revision_files_hash ON revision_files(content_hash);

        -- Config sets: latest revision pointer and source metadata
        CREATE TABLE config_sets (
            name TEXT PRIMARY KEY,
            latest_revision TEXT,
            location_type TEXT NOT NULL DEFAULT 'gitiles'
                CHECK(location_type IN ('gitiles')),
            location TEXT NOT NULL,
            last_import_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (name, latest_revision)
                REFERENCES revisions(config_set, revision_id)
        );

        -- Project import info: repository each project was imported from
        CREATE TABLE project_import_info (
            project_id TEXT PRIMARY KEY,
            repo_type TEXT NOT NULL CHECK(repo_type IN ('gitiles')),
            repo_url TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_migrate_fresh_database() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        for table in [
            "blobs",
            "revisions",
            "revision_files",
            "config_sets",
            "project_import_info",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_migrate_idempotent() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();

        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_pointer_requires_revision() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO config_sets (name, latest_revision, location)
             VALUES ('services/x', 'deadbeef', 'https://localhost/x')",
            [],
        );
        assert!(result.is_err());

        // A config set without a latest revision is fine
        conn.execute(
            "INSERT INTO config_sets (name, location) VALUES ('services/x', 'https://localhost/x')",
            [],
        )
        .unwrap();
    }
}
