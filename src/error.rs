// src/error.rs

//! Error types for cfgstore
//!
//! Remote and validation problems are normally absorbed by the import engine
//! and reported as outcomes; the variants here that reach a caller are
//! storage failures, bad input, and `CommitAmbiguous`.

use thiserror::Error;

/// Result type for cfgstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while importing or reading configuration
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Entity already exists with different content
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Content does not match its content hash
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Location expression could not be parsed
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// Archive could not be unpacked
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// Archive entry tried to escape its root
    #[error("path traversal attempt: {0}")]
    PathTraversal(String),

    /// Stored data is unreadable or inconsistent
    #[error("corrupted stored state: {0}")]
    CorruptedState(String),

    /// A concurrent writer advanced the same config set
    #[error("concurrent update: {0}")]
    Conflict(String),

    /// Commit failed in a way that may or may not have been applied
    #[error("commit outcome unknown: {0}")]
    CommitAmbiguous(String),

    /// Initialization failed
    #[error("initialization error: {0}")]
    InitError(String),
}

impl Error {
    /// Whether the storage layer may have committed despite reporting failure.
    ///
    /// Re-running the import is safe: content and revision writes are
    /// idempotent and the pointer advance is compare-and-set.
    pub fn is_commit_ambiguous(&self) -> bool {
        matches!(self, Error::CommitAmbiguous(_))
    }
}
