// src/lib.rs

//! cfgstore: content-addressed store for imported configuration
//!
//! Pulls config sets from Gitiles-style source control, validates them, and
//! keeps an append-only, deduplicated copy that readers can query by name
//! without talking to source control.
//!
//! # Architecture
//!
//! - Database-first: all state in one SQLite file
//! - Blobs: file content keyed by `v1:<sha1>`, stored once
//! - Revisions: immutable path -> blob manifests per config set
//! - Config sets: a latest-revision pointer, advanced compare-and-set
//!   in the same transaction that writes the revision

pub mod archive;
pub mod config;
pub mod db;
mod error;
pub mod hash;
pub mod import;
pub mod location;
pub mod projects;
pub mod remote;
pub mod storage;
pub mod validation;

pub use config::CfgstoreConfig;
pub use error::{Error, Result};
pub use hash::{ContentHash, HashVersion};
pub use import::{ConfigSetSource, ImportEngine, ImportOutcome, ImportReport, ImportSettings};
pub use location::Location;
pub use projects::{Branch, Project, ProjectRegistry, StorageType, StoredProjectRegistry};
pub use remote::{Commit, EntryKind, GitilesClient, RemoteError, RemoteRepository, TreeEntry};
pub use validation::{AcceptAll, ConfigValidator};
