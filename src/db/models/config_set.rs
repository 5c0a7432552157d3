// src/db/models/config_set.rs

//! ConfigSet model - the mutable index of latest revisions
//!
//! A config set row names a config set, the revision readers should see,
//! and where it is imported from. The latest revision only moves through
//! [`ConfigSet::set_latest`], which is compare-and-set against the value
//! the writer started from.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::str::FromStr;

/// Kind of repository configs are imported from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepositoryType {
    #[default]
    Gitiles,
}

impl RepositoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryType::Gitiles => "gitiles",
        }
    }
}

impl FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "gitiles" => Ok(RepositoryType::Gitiles),
            _ => Err(format!("Invalid repository type: {}", s)),
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, independently versioned bundle of configuration files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSet {
    pub name: String,
    pub latest_revision: Option<String>,
    pub location_type: RepositoryType,
    pub location: String,
    pub last_import_at: Option<String>,
    pub created_at: Option<String>,
}

impl ConfigSet {
    /// Find a config set by name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, latest_revision, location_type, location, last_import_at, created_at
             FROM config_sets WHERE name = ?1",
        )?;
        let config_set = stmt.query_row([name], Self::from_row).optional()?;
        Ok(config_set)
    }

    /// List all config sets by name
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, latest_revision, location_type, location, last_import_at, created_at
             FROM config_sets ORDER BY name",
        )?;
        let config_sets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(config_sets)
    }

    /// Whether a config set exists
    pub fn exists(conn: &Connection, name: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM config_sets WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Latest revision of a config set, `None` if absent or never imported
    pub fn get_latest(conn: &Connection, name: &str) -> Result<Option<String>> {
        let latest: Option<Option<String>> = conn
            .query_row(
                "SELECT latest_revision FROM config_sets WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(latest.flatten())
    }

    /// Create the config set if it does not exist
    ///
    /// Existing rows are left untouched. Returns `true` if a row was created.
    pub fn ensure_exists(
        conn: &Connection,
        name: &str,
        location_type: RepositoryType,
        location: &str,
    ) -> Result<bool> {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO config_sets (name, location_type, location) VALUES (?1, ?2, ?3)",
            params![name, location_type.as_str(), location],
        )?;
        Ok(inserted > 0)
    }

    /// Point the config set at `revision_id`
    ///
    /// Succeeds only if the current latest revision still equals `expected`.
    /// Fails with `NotFound` for an absent config set and `Conflict` when
    /// another writer moved it to a different revision. Setting the value
    /// it already has is a no-op, even if another writer set it.
    pub fn set_latest(
        conn: &Connection,
        name: &str,
        revision_id: &str,
        expected: Option<&str>,
    ) -> Result<()> {
        if expected == Some(revision_id) {
            return Ok(());
        }

        let updated = conn.execute(
            "UPDATE config_sets SET latest_revision = ?1
             WHERE name = ?2 AND latest_revision IS ?3",
            params![revision_id, name, expected],
        )?;
        if updated > 0 {
            return Ok(());
        }

        match Self::find_by_name(conn, name)? {
            None => Err(Error::NotFound(format!("config set {}", name))),
            Some(current) if current.latest_revision.as_deref() == Some(revision_id) => Ok(()),
            Some(current) => Err(Error::Conflict(format!(
                "config set {} is at {:?}, expected {:?}",
                name, current.latest_revision, expected
            ))),
        }
    }

    /// Record where and when the config set was last imported
    pub fn record_import(
        conn: &Connection,
        name: &str,
        location_type: RepositoryType,
        location: &str,
        imported_at: &str,
    ) -> Result<()> {
        conn.execute(
            "UPDATE config_sets SET location_type = ?1, location = ?2, last_import_at = ?3
             WHERE name = ?4",
            params![location_type.as_str(), location, imported_at, name],
        )?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let location_type: String = row.get(2)?;
        Ok(Self {
            name: row.get(0)?,
            latest_revision: row.get(1)?,
            location_type: location_type.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            location: row.get(3)?,
            last_import_at: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
