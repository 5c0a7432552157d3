// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use cfgstore::db;
use cfgstore::remote::RemoteResult;
use cfgstore::{
    Branch, Commit, ImportEngine, ImportSettings, Location, Project, ProjectRegistry,
    RemoteError, RemoteRepository, TreeEntry,
};
use flate2::Compression;
use flate2::write::GzEncoder;
use rusqlite::types::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A call made against [`FakeRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ResolveRef(String),
    ListTree(String),
    FetchArchive(String),
}

/// In-memory remote repository keyed by location strings
#[derive(Default)]
pub struct FakeRemote {
    refs: Mutex<HashMap<String, RemoteResult<Option<Commit>>>>,
    trees: Mutex<HashMap<String, RemoteResult<Vec<TreeEntry>>>>,
    archives: Mutex<HashMap<String, RemoteResult<Option<Vec<u8>>>>>,
    calls: Mutex<Vec<Call>>,
}

fn key(location: &str) -> String {
    Location::parse(location).unwrap().to_string()
}

fn key_at(location: &str, sha: &str) -> String {
    Location::parse(location).unwrap().with_treeish(sha).to_string()
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `location` resolves to commit `sha`
    pub fn set_ref(&self, location: &str, sha: &str) {
        self.refs
            .lock()
            .unwrap()
            .insert(key(location), Ok(Some(Commit::new(sha))));
    }

    /// Resolving `location` fails with `error`
    pub fn fail_ref(&self, location: &str, error: RemoteError) {
        self.refs.lock().unwrap().insert(key(location), Err(error));
    }

    /// Archive of `location` at `sha`
    pub fn set_archive(&self, location: &str, sha: &str, archive: Vec<u8>) {
        self.archives
            .lock()
            .unwrap()
            .insert(key_at(location, sha), Ok(Some(archive)));
    }

    /// Fetching `location` at `sha` fails with `error`
    pub fn fail_archive(&self, location: &str, sha: &str, error: RemoteError) {
        self.archives
            .lock()
            .unwrap()
            .insert(key_at(location, sha), Err(error));
    }

    /// Shorthand for a ref plus its archive
    pub fn publish(&self, location: &str, sha: &str, files: &[(&str, &[u8])]) {
        self.set_ref(location, sha);
        self.set_archive(location, sha, targz(files));
    }

    pub fn set_tree(&self, location: &str, entries: Vec<TreeEntry>) {
        self.trees.lock().unwrap().insert(key(location), Ok(entries));
    }

    pub fn fail_tree(&self, location: &str, error: RemoteError) {
        self.trees.lock().unwrap().insert(key(location), Err(error));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::FetchArchive(_)))
            .count()
    }

    pub fn fetched(&self, location: &str, sha: &str) -> bool {
        self.calls().contains(&Call::FetchArchive(key_at(location, sha)))
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl RemoteRepository for FakeRemote {
    fn resolve_ref(&self, location: &Location, _deadline: Duration) -> RemoteResult<Option<Commit>> {
        let key = location.to_string();
        self.calls.lock().unwrap().push(Call::ResolveRef(key.clone()));
        self.refs.lock().unwrap().get(&key).cloned().unwrap_or(Ok(None))
    }

    fn list_tree(&self, location: &Location) -> RemoteResult<Vec<TreeEntry>> {
        let key = location.to_string();
        self.calls.lock().unwrap().push(Call::ListTree(key.clone()));
        self.trees.lock().unwrap().get(&key).cloned().unwrap_or(Ok(Vec::new()))
    }

    fn fetch_archive(
        &self,
        location: &Location,
        _deadline: Duration,
    ) -> RemoteResult<Option<Vec<u8>>> {
        let key = location.to_string();
        self.calls.lock().unwrap().push(Call::FetchArchive(key.clone()));
        self.archives.lock().unwrap().get(&key).cloned().unwrap_or(Ok(None))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Project registry with a fixed answer
#[derive(Default)]
pub struct StaticRegistry {
    pub projects: Vec<Project>,
    pub branches: HashMap<String, Vec<Branch>>,
}

impl ProjectRegistry for StaticRegistry {
    fn list_projects(&self) -> cfgstore::Result<Vec<Project>> {
        Ok(self.projects.clone())
    }

    fn list_branches(&self, project_id: &str) -> cfgstore::Result<Option<Vec<Branch>>> {
        Ok(self.branches.get(project_id).cloned())
    }
}

/// A gzip tar holding `files`
pub fn targz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Create an initialized database in a temp directory.
///
/// Returns (TempDir, db_path) - keep the TempDir alive to prevent cleanup.
pub fn setup_db() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("cfgstore.db");
    db::init(&db_path).unwrap();
    (temp_dir, db_path)
}

pub fn settings() -> ImportSettings {
    ImportSettings {
        max_parallel: 4,
        ..ImportSettings::default()
    }
}

pub fn engine(db_path: &Path, remote: &Arc<FakeRemote>) -> ImportEngine {
    ImportEngine::new(db_path, remote.clone(), settings())
}

/// Every row of every content table, for before/after comparisons
pub fn dump_state(db_path: &Path) -> Vec<String> {
    let conn = db::open(db_path).unwrap();
    let mut rows = Vec::new();
    for table in ["blobs", "revisions", "revision_files", "config_sets", "project_import_info"] {
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {} ORDER BY 1, 2, 3", table))
            .unwrap();
        let columns = stmt.column_count();
        let table_rows = stmt
            .query_map([], |row| {
                let values = (0..columns)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(format!("{}: {:?}", table, values))
            })
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        rows.extend(table_rows);
    }
    rows
}

/// Install a trigger that aborts any statement it fires on
pub fn install_failing_trigger(db_path: &Path, name: &str, event: &str, condition: &str) {
    let conn = db::open(db_path).unwrap();
    conn.execute_batch(&format!(
        "CREATE TRIGGER {name} {event} WHEN {condition}
         BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;"
    ))
    .unwrap();
}

pub fn drop_trigger(db_path: &Path, name: &str) {
    let conn = db::open(db_path).unwrap();
    conn.execute_batch(&format!("DROP TRIGGER {name};")).unwrap();
}
