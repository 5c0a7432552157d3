// src/import/mod.rs

//! Import pipeline
//!
//! Moves config from source control into the store. One import of one
//! config set goes:
//!
//! 1. resolve the location's treeish to a commit id
//! 2. stop if the config set already points at it
//! 3. fetch and unpack the archive
//! 4. ask the validator
//! 5. in one transaction: store new blobs, write the revision, advance the
//!    config set pointer
//!
//! Remote failures, bad archives and rejected configs end the import with
//! an [`ImportOutcome`] and leave stored state untouched. Only storage
//! failures come back as errors.

mod discovery;

pub use discovery::ConfigSetSource;

use crate::archive::{self, FileMap};
use crate::db;
use crate::db::models::{Blob, ConfigSet, Manifest, RepositoryType, Revision};
use crate::error::{Error, Result};
use crate::hash;
use crate::location::Location;
use crate::projects::{ProjectRegistry, StoredProjectRegistry};
use crate::remote::RemoteRepository;
use crate::validation::{AcceptAll, ConfigValidator};
use rayon::prelude::*;
use rusqlite::{Connection, Transaction};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Deadline for resolving a ref
pub const DEFAULT_LOG_DEADLINE: Duration = Duration::from_secs(15);

/// Deadline for fetching an archive
pub const DEFAULT_ARCHIVE_DEADLINE: Duration = Duration::from_secs(15);

/// Knobs for an [`ImportEngine`]
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Service whose config set declares the projects
    pub app_id: String,
    /// Root listing one directory per service
    pub services_location: Option<String>,
    /// Treeish holding each project's own config
    pub project_ref: String,
    /// Directory used for a branch without a `config_path`
    pub branch_config_path: String,
    pub log_deadline: Duration,
    pub archive_deadline: Duration,
    /// Config sets imported at once
    pub max_parallel: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            app_id: "luci-config".to_string(),
            services_location: None,
            project_ref: "luci".to_string(),
            branch_config_path: "luci".to_string(),
            log_deadline: DEFAULT_LOG_DEADLINE,
            archive_deadline: DEFAULT_ARCHIVE_DEADLINE,
            max_parallel: 8,
        }
    }
}

/// How one import of one config set ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Already at the remote revision
    Unchanged,
    /// Remote was unreachable, unauthorized, too slow, or had nothing
    FetchFailed,
    /// Archive was unreadable or the validator said no
    ValidationRejected,
    /// Config set now points at this revision
    Published(String),
}

impl ImportOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, ImportOutcome::Published(_))
    }
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportOutcome::Unchanged => write!(f, "unchanged"),
            ImportOutcome::FetchFailed => write!(f, "fetch failed"),
            ImportOutcome::ValidationRejected => write!(f, "validation rejected"),
            ImportOutcome::Published(revision) => write!(f, "published {}", revision),
        }
    }
}

/// Results of importing many config sets
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Config sets whose import ran to an outcome
    pub outcomes: BTreeMap<String, ImportOutcome>,
    /// Config sets whose import hit a storage error
    pub failures: BTreeMap<String, String>,
}

impl ImportReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Config sets that moved to a new revision
    pub fn published(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(name, outcome)| match outcome {
            ImportOutcome::Published(revision) => Some((name.as_str(), revision.as_str())),
            _ => None,
        })
    }

    pub fn merge(&mut self, other: ImportReport) {
        self.outcomes.extend(other.outcomes);
        self.failures.extend(other.failures);
    }

    fn record(&mut self, config_set: String, result: Result<ImportOutcome>) {
        match result {
            Ok(outcome) => {
                self.outcomes.insert(config_set, outcome);
            }
            Err(e) => {
                self.failures.insert(config_set, e.to_string());
            }
        }
    }
}

/// Drives imports against one store
pub struct ImportEngine {
    db_path: PathBuf,
    remote: Arc<dyn RemoteRepository>,
    validator: Arc<dyn ConfigValidator>,
    registry: Arc<dyn ProjectRegistry>,
    settings: ImportSettings,
}

impl ImportEngine {
    /// Engine that accepts every config and reads projects from the store
    pub fn new(
        db_path: impl AsRef<Path>,
        remote: Arc<dyn RemoteRepository>,
        settings: ImportSettings,
    ) -> Self {
        let db_path = db_path.as_ref().to_path_buf();
        let registry = Arc::new(StoredProjectRegistry::new(&db_path, settings.app_id.clone()));
        Self {
            db_path,
            remote,
            validator: Arc::new(AcceptAll),
            registry,
            settings,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn ConfigValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn ProjectRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Import `location` into `config_set`
    ///
    /// A location whose treeish is a full commit id is imported at that
    /// commit; otherwise the treeish is resolved first. With
    /// `create_config_set` unset, an unknown config set is `NotFound`.
    pub fn import_revision(
        &self,
        config_set: &str,
        location: &Location,
        create_config_set: bool,
    ) -> Result<ImportOutcome> {
        let mut conn = db::open(&self.db_path)?;

        let existing = ConfigSet::find_by_name(&conn, config_set)?;
        if existing.is_none() && !create_config_set {
            return Err(Error::NotFound(format!("config set {}", config_set)));
        }

        let revision_id = if location.is_pinned() {
            location.treeish.clone()
        } else {
            match self.remote.resolve_ref(location, self.settings.log_deadline) {
                Ok(Some(commit)) => commit.sha,
                Ok(None) => {
                    warn!("{}: no commits at {}", config_set, location);
                    return Ok(ImportOutcome::FetchFailed);
                }
                Err(e) => {
                    warn!("{}: could not resolve {} ({}): {}", config_set, location, e.kind(), e);
                    return Ok(ImportOutcome::FetchFailed);
                }
            }
        };

        // The pointer value the publish will compare against
        let stored_latest = existing.and_then(|cs| cs.latest_revision);
        let known_latest = match stored_latest.as_deref() {
            Some(latest) if Revision::exists(&conn, config_set, latest)? => Some(latest.to_string()),
            Some(latest) => {
                warn!(
                    "{}: latest revision {} is not stored, treating as never imported",
                    config_set, latest
                );
                None
            }
            None => None,
        };

        if known_latest.as_deref() == Some(revision_id.as_str()) {
            debug!("{}: up-to-date at {}", config_set, revision_id);
            return Ok(ImportOutcome::Unchanged);
        }

        let revision_location = location.with_treeish(revision_id.as_str());

        if Revision::exists(&conn, config_set, &revision_id)? {
            if known_latest.is_some() {
                info!(
                    "{}: revision {} already stored, keeping {:?}",
                    config_set, revision_id, known_latest
                );
                return Ok(ImportOutcome::Unchanged);
            }
            info!("{}: re-pointing at stored revision {}", config_set, revision_id);
            db::publish_transaction(&mut conn, |tx| {
                self.advance(
                    tx,
                    config_set,
                    &revision_id,
                    stored_latest.as_deref(),
                    &revision_location,
                    create_config_set,
                )
            })?;
            return Ok(ImportOutcome::Published(revision_id));
        }

        let archive = match self
            .remote
            .fetch_archive(&revision_location, self.settings.archive_deadline)
        {
            Ok(Some(archive)) if !archive.is_empty() => archive,
            Ok(_) => {
                warn!("{}: empty archive at {}", config_set, revision_location);
                return Ok(ImportOutcome::FetchFailed);
            }
            Err(e) => {
                warn!(
                    "{}: could not fetch {} ({}): {}",
                    config_set,
                    revision_location,
                    e.kind(),
                    e
                );
                return Ok(ImportOutcome::FetchFailed);
            }
        };

        let files = match archive::unpack(&archive) {
            Ok(files) => files,
            Err(e) => {
                warn!("{}: unreadable archive at {}: {}", config_set, revision_location, e);
                return Ok(ImportOutcome::ValidationRejected);
            }
        };

        if !self.validator.validate(config_set, &files) {
            warn!("{}: revision {} rejected by validator", config_set, revision_id);
            return Ok(ImportOutcome::ValidationRejected);
        }

        let manifest = build_manifest(&files);
        let new_blobs = db::publish_transaction(&mut conn, |tx| {
            let new_blobs = store_blobs(tx, &files, &manifest)?;
            Revision::put(tx, config_set, &revision_id, &manifest)?;
            self.advance(
                tx,
                config_set,
                &revision_id,
                stored_latest.as_deref(),
                &revision_location,
                create_config_set,
            )?;
            Ok(new_blobs)
        })?;

        info!(
            "{}: published {} ({} files, {} new blobs)",
            config_set,
            revision_id,
            manifest.len(),
            new_blobs
        );
        Ok(ImportOutcome::Published(revision_id))
    }

    /// Import the latest commit of a location expression
    ///
    /// The config set is created on first import.
    pub fn import_config_set(&self, config_set: &str, location_expr: &str) -> Result<ImportOutcome> {
        let location = match Location::parse(location_expr) {
            Ok(location) => location,
            Err(e) => {
                warn!("{}: {}", config_set, e);
                return Ok(ImportOutcome::FetchFailed);
            }
        };

        debug!("{}: resolving {} via {}", config_set, location, self.remote.name());
        let commit = match self.remote.resolve_ref(&location, self.settings.log_deadline) {
            Ok(Some(commit)) => commit,
            Ok(None) => {
                warn!("{}: no commits at {}", config_set, location);
                return Ok(ImportOutcome::FetchFailed);
            }
            Err(e) => {
                warn!("{}: could not resolve {} ({}): {}", config_set, location, e.kind(), e);
                return Ok(ImportOutcome::FetchFailed);
            }
        };

        let latest = {
            let conn = db::open(&self.db_path)?;
            ConfigSet::get_latest(&conn, config_set)?
        };
        if latest.as_deref() == Some(commit.sha.as_str()) {
            debug!("{}: up-to-date at {}", config_set, commit.sha);
            return Ok(ImportOutcome::Unchanged);
        }

        self.import_revision(config_set, &location.with_treeish(commit.sha), true)
    }

    /// Import every source, isolating failures per config set
    pub fn import_sources(&self, sources: &[ConfigSetSource]) -> Result<ImportReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.max_parallel.max(1))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create import pool: {e}")))?;

        let results: Vec<(String, Result<ImportOutcome>)> = pool.install(|| {
            sources
                .par_iter()
                .map(|source| {
                    let result = self.import_config_set(&source.config_set, &source.location);
                    if let Err(e) = &result {
                        if e.is_commit_ambiguous() {
                            error!("{}: import may or may not have landed: {}", source.config_set, e);
                        } else {
                            error!("{}: import failed: {}", source.config_set, e);
                        }
                    }
                    (source.config_set.clone(), result)
                })
                .collect()
        });

        let mut report = ImportReport::default();
        for (config_set, result) in results {
            report.record(config_set, result);
        }
        Ok(report)
    }

    /// Import every service under the configured services location
    pub fn import_services(&self) -> Result<ImportReport> {
        let Some(expr) = &self.settings.services_location else {
            info!("No services location configured, skipping services");
            return Ok(ImportReport::default());
        };
        let root = Location::parse(expr)?;
        let sources = self.discover_services(&root);
        info!("Importing {} services from {}", sources.len(), root);
        self.import_sources(&sources)
    }

    /// Import every declared project and its branches
    pub fn import_projects(&self) -> Result<ImportReport> {
        let sources = self.discover_projects()?;
        info!("Importing {} project config sets", sources.len());
        self.import_sources(&sources)
    }

    /// Services first, so projects are discovered from fresh service config
    pub fn import_all(&self) -> Result<ImportReport> {
        let mut report = self.import_services()?;
        report.merge(self.import_projects()?);
        Ok(report)
    }

    /// Create (if asked) and advance the config set inside a publish
    fn advance(
        &self,
        tx: &Transaction,
        config_set: &str,
        revision_id: &str,
        expected: Option<&str>,
        location: &Location,
        create_config_set: bool,
    ) -> Result<()> {
        let location = location.to_string();
        if create_config_set && ConfigSet::ensure_exists(tx, config_set, RepositoryType::Gitiles, &location)? {
            debug!("Created config set {}", config_set);
        }
        ConfigSet::set_latest(tx, config_set, revision_id, expected)?;
        ConfigSet::record_import(
            tx,
            config_set,
            RepositoryType::Gitiles,
            &location,
            &chrono::Utc::now().to_rfc3339(),
        )?;
        Ok(())
    }
}

/// Content hash of every file
fn build_manifest(files: &FileMap) -> Manifest {
    files
        .iter()
        .map(|(path, content)| (path.clone(), hash::content_hash(content)))
        .collect()
}

/// Store blobs not yet present, returning how many were new
fn store_blobs(conn: &Connection, files: &FileMap, manifest: &Manifest) -> Result<usize> {
    let mut new_blobs = 0;
    for ((path, content), content_hash) in files.iter().zip(manifest.values()) {
        if Blob::exists(conn, content_hash)? {
            debug!("Reusing blob {} for {}", content_hash, path);
            continue;
        }
        if Blob::put(conn, content_hash, content)? {
            new_blobs += 1;
        }
    }
    Ok(new_blobs)
}
