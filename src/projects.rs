// src/projects.rs

//! Project registry
//!
//! Projects and their branches are declared in config that is itself
//! imported: `projects.toml` in the service's own config set and
//! `branches.toml` in each project's config set.
//!
//! ```toml
//! # services/<app_id>/projects.toml
//! [[projects]]
//! id = "chromium"
//! config_storage_type = "gitiles"
//! config_location = "https://chromium.googlesource.com/chromium/src"
//!
//! # projects/chromium/branches.toml
//! [[branches]]
//! name = "main"
//!
//! [[branches]]
//! name = "release-42"
//! config_path = "infra/config"
//! ```
//!
//! Reads are lenient: a file that fails to parse or fails its hash check is
//! logged and treated as empty, so one bad upload cannot stop imports of
//! everything else.

use crate::db;
use crate::db::models::{ConfigSet, ProjectImportInfo, RepositoryType};
use crate::error::{Error, Result};
use crate::storage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File in the service config set that declares projects
pub const PROJECTS_FILE: &str = "projects.toml";

/// File in a project config set that declares branches
pub const BRANCHES_FILE: &str = "branches.toml";

/// Where a project keeps its configs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Gitiles,
    #[serde(other)]
    Unknown,
}

/// A declared project
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub config_storage_type: Option<StorageType>,
    #[serde(default)]
    pub config_location: String,
}

/// A declared branch of a project
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    pub name: String,
    /// Directory holding the branch's configs, relative to the repo root
    #[serde(default)]
    pub config_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectsFile {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Debug, Default, Deserialize)]
struct BranchesFile {
    #[serde(default)]
    branches: Vec<Branch>,
}

/// Source of declared projects and branches
pub trait ProjectRegistry: Send + Sync {
    /// All declared projects
    fn list_projects(&self) -> Result<Vec<Project>>;

    /// Branches of a project, `None` if the project is unknown
    fn list_branches(&self, project_id: &str) -> Result<Option<Vec<Branch>>>;
}

/// Registry backed by the imported config in the store
pub struct StoredProjectRegistry {
    db_path: PathBuf,
    app_id: String,
}

impl StoredProjectRegistry {
    pub fn new(db_path: impl AsRef<Path>, app_id: impl Into<String>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            app_id: app_id.into(),
        }
    }

    /// Config set holding `projects.toml`
    pub fn service_config_set(&self) -> String {
        format!("services/{}", self.app_id)
    }
}

impl ProjectRegistry for StoredProjectRegistry {
    fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = db::open(&self.db_path)?;
        let config_set = self.service_config_set();
        let parsed: Option<ProjectsFile> = read_lenient(&conn, &config_set, PROJECTS_FILE)?;
        Ok(parsed.unwrap_or_default().projects)
    }

    fn list_branches(&self, project_id: &str) -> Result<Option<Vec<Branch>>> {
        let conn = db::open(&self.db_path)?;
        let config_set = format!("projects/{}", project_id);
        if ConfigSet::get_latest(&conn, &config_set)?.is_none() {
            debug!("No imported config for project {}", project_id);
            return Ok(None);
        }
        let parsed: Option<BranchesFile> = read_lenient(&conn, &config_set, BRANCHES_FILE)?;
        Ok(Some(parsed.unwrap_or_default().branches))
    }
}

/// Read and parse a TOML file from the latest revision of a config set
///
/// Missing files are `None`. Unparseable or corrupted files are logged and
/// also `None`; storage failures still propagate.
fn read_lenient<T: serde::de::DeserializeOwned>(
    conn: &rusqlite::Connection,
    config_set: &str,
    path: &str,
) -> Result<Option<T>> {
    let content = match storage::read_latest_file(conn, config_set, path) {
        Ok(Some(content)) => content,
        Ok(None) => return Ok(None),
        Err(Error::CorruptedState(msg)) => {
            warn!("Ignoring corrupted {} in {}: {}", path, config_set, msg);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let text = match String::from_utf8(content) {
        Ok(text) => text,
        Err(e) => {
            warn!("Ignoring non-UTF-8 {} in {}: {}", path, config_set, e);
            return Ok(None);
        }
    };

    match toml::from_str(&text) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!("Could not parse {} in {}: {}", path, config_set, e);
            Ok(None)
        }
    }
}

/// Repository type and URL a project was last imported from
pub fn get_repo(
    conn: &rusqlite::Connection,
    project_id: &str,
) -> Result<(Option<RepositoryType>, Option<String>)> {
    Ok(match ProjectImportInfo::find(conn, project_id)? {
        Some(info) => (Some(info.repo_type), Some(info.repo_url)),
        None => (None, None),
    })
}

/// Record where a project is imported from
///
/// Returns `true` if the stored info changed.
pub fn update_import_info(
    conn: &rusqlite::Connection,
    project_id: &str,
    repo_type: RepositoryType,
    repo_url: &str,
) -> Result<bool> {
    let changed = ProjectImportInfo::upsert(
        conn,
        project_id,
        repo_type,
        repo_url,
        &chrono::Utc::now().to_rfc3339(),
    )?;
    if changed {
        debug!("Project {} now imported from {} {}", project_id, repo_type, repo_url);
    }
    Ok(changed)
}
