// src/remote/mod.rs
//! Remote source-control access
//!
//! The import engine talks to source control only through the
//! [`RemoteRepository`] trait:
//! - resolve a treeish to its latest commit
//! - list the entries of a directory
//! - fetch a gzip tar snapshot of a directory
//!
//! [`GitilesClient`] implements it over HTTP. Tests substitute their own.

mod gitiles;

pub use gitiles::GitilesClient;

use crate::location::Location;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Result type for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Failures surfaced by a remote repository
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Credentials missing or rejected
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Call did not finish within its deadline
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Connection or HTTP failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response arrived but could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Short label for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::Authorization(_) => "authorization",
            RemoteError::DeadlineExceeded(_) => "deadline",
            RemoteError::Transport(_) => "transport",
            RemoteError::InvalidResponse(_) => "invalid-response",
        }
    }
}

/// Identity of a commit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Commit {
    /// Commit id (40 hex chars)
    #[serde(rename = "commit")]
    pub sha: String,
    /// Root tree id
    #[serde(default)]
    pub tree: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub author: Option<Signature>,
    #[serde(default)]
    pub committer: Option<Signature>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Commit {
    /// A commit with only its id set
    pub fn new(sha: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            tree: String::new(),
            parents: Vec::new(),
            author: None,
            committer: None,
            message: None,
        }
    }
}

/// Author or committer of a commit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub time: Option<String>,
}

/// Kind of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
    #[serde(other)]
    Other,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub mode: u32,
}

impl TreeEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            mode: 0,
        }
    }
}

/// Read access to a source-control host
pub trait RemoteRepository: Send + Sync {
    /// Latest commit touching `location.path` at `location.treeish`
    ///
    /// `Ok(None)` means the ref or path has no history.
    fn resolve_ref(&self, location: &Location, deadline: Duration) -> RemoteResult<Option<Commit>>;

    /// Entries of the directory at `location`
    fn list_tree(&self, location: &Location) -> RemoteResult<Vec<TreeEntry>>;

    /// Gzip tar of the directory at `location`
    ///
    /// `Ok(None)` means there is nothing to fetch.
    fn fetch_archive(&self, location: &Location, deadline: Duration)
        -> RemoteResult<Option<Vec<u8>>>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}
