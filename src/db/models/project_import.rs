// src/db/models/project_import.rs

//! ProjectImportInfo model - where each project's configs come from

use super::config_set::RepositoryType;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Repository a project was last imported from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectImportInfo {
    pub project_id: String,
    pub repo_type: RepositoryType,
    pub repo_url: String,
    pub updated_at: String,
}

impl ProjectImportInfo {
    /// Find import info for a project
    pub fn find(conn: &Connection, project_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT project_id, repo_type, repo_url, updated_at
             FROM project_import_info WHERE project_id = ?1",
        )?;
        let info = stmt.query_row([project_id], Self::from_row).optional()?;
        Ok(info)
    }

    /// Record import info, returning `true` if anything changed
    ///
    /// Re-recording the same type and URL leaves the row as it was.
    pub fn upsert(
        conn: &Connection,
        project_id: &str,
        repo_type: RepositoryType,
        repo_url: &str,
        updated_at: &str,
    ) -> Result<bool> {
        if let Some(existing) = Self::find(conn, project_id)? {
            if existing.repo_type == repo_type && existing.repo_url == repo_url {
                return Ok(false);
            }
        }

        conn.execute(
            "INSERT INTO project_import_info (project_id, repo_type, repo_url, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id) DO UPDATE SET
                repo_type = excluded.repo_type,
                repo_url = excluded.repo_url,
                updated_at = excluded.updated_at",
            params![project_id, repo_type.as_str(), repo_url, updated_at],
        )?;
        Ok(true)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let repo_type: String = row.get(1)?;
        Ok(Self {
            project_id: row.get(0)?,
            repo_type: repo_type.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            repo_url: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}
