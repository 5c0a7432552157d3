// src/import/discovery.rs

//! Enumerating config sets to import
//!
//! Services come from the directories under one root location. Projects
//! come from the project registry, each contributing its own config set and
//! one per declared branch. Both produce plain `(config set, location)`
//! pairs for [`ImportEngine::import_sources`].

use super::ImportEngine;
use crate::db;
use crate::db::models::RepositoryType;
use crate::error::Result;
use crate::location::Location;
use crate::projects::{self, Branch, Project, StorageType};
use crate::remote::EntryKind;
use crate::validation::{is_valid_branch_name, is_valid_project_id, is_valid_service_id};
use tracing::{debug, warn};

/// A config set and the location expression it is imported from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSetSource {
    pub config_set: String,
    pub location: String,
}

impl ConfigSetSource {
    pub fn new(config_set: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            config_set: config_set.into(),
            location: location.into(),
        }
    }
}

impl ImportEngine {
    /// One `services/<name>` config set per directory under `root`
    ///
    /// Directories whose names are not valid service ids are skipped. If the
    /// listing fails nothing is discovered this round.
    pub fn discover_services(&self, root: &Location) -> Vec<ConfigSetSource> {
        let entries = match self.remote.list_tree(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not list services at {} ({}): {}", root, e.kind(), e);
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter(|entry| entry.kind == EntryKind::Tree)
            .filter(|entry| {
                let valid = is_valid_service_id(&entry.name);
                if !valid {
                    debug!("Skipping directory with invalid service id: {:?}", entry.name);
                }
                valid
            })
            .map(|entry| {
                ConfigSetSource::new(
                    format!("services/{}", entry.name),
                    root.join(&entry.name).to_string(),
                )
            })
            .collect()
    }

    /// Config sets of every supported project and its branches
    ///
    /// Records each project's repository as a side effect. A project that
    /// cannot be handled is logged and skipped; the rest are still listed.
    pub fn discover_projects(&self) -> Result<Vec<ConfigSetSource>> {
        let projects = self.registry.list_projects()?;
        let conn = db::open(&self.db_path)?;

        let mut sources = Vec::new();
        for project in projects {
            let Some(repo_url) = supported_location(&project) else {
                continue;
            };

            if let Err(e) =
                projects::update_import_info(&conn, &project.id, RepositoryType::Gitiles, repo_url)
            {
                warn!("Could not record import info for project {}: {}", project.id, e);
            }

            sources.push(ConfigSetSource::new(
                format!("projects/{}", project.id),
                project_location(repo_url, &self.settings.project_ref),
            ));

            let branches = match self.registry.list_branches(&project.id) {
                Ok(branches) => branches.unwrap_or_default(),
                Err(e) => {
                    warn!("Could not read branches of project {}: {}", project.id, e);
                    Vec::new()
                }
            };
            for branch in branches {
                if !is_valid_branch_name(&branch.name) {
                    warn!(
                        "Skipping branch with invalid name {:?} of project {}",
                        branch.name, project.id
                    );
                    continue;
                }
                sources.push(ConfigSetSource::new(
                    format!("projects/{}/branches/{}", project.id, branch.name),
                    branch_location(repo_url, &branch, &self.settings.branch_config_path),
                ));
            }
        }

        Ok(sources)
    }
}

/// Repository URL of a project this store can import, without trailing slash
fn supported_location(project: &Project) -> Option<&str> {
    if !is_valid_project_id(&project.id) {
        warn!("Skipping project with invalid id: {:?}", project.id);
        return None;
    }
    if project.config_storage_type != Some(StorageType::Gitiles) {
        debug!(
            "Skipping project {}: unsupported storage type {:?}",
            project.id, project.config_storage_type
        );
        return None;
    }
    let repo_url = project.config_location.trim_end_matches('/');
    if let Err(e) = Location::parse(repo_url) {
        warn!("Skipping project {}: {}", project.id, e);
        return None;
    }
    Some(repo_url)
}

fn project_location(repo_url: &str, project_ref: &str) -> String {
    format!("{}/+/{}", repo_url, project_ref)
}

fn branch_location(repo_url: &str, branch: &Branch, default_path: &str) -> String {
    let path = branch
        .config_path
        .as_deref()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .unwrap_or(default_path);
    format!("{}/+/{}/{}", repo_url, branch.name, path)
}
