// src/hash.rs

//! Versioned content hashes for blob addressing
//!
//! Every blob is keyed by a string of the form `<version>:<hex digest>`.
//! The only version today is `v1`: the lowercase hex SHA-1 of the content
//! framed as a git blob object (`blob <len>\0<content>`), so a v1 digest
//! equals the blob id git itself reports for the same file:
//!
//! ```
//! use cfgstore::hash::ContentHash;
//!
//! let hash = ContentHash::compute(b"x\n");
//! assert_eq!(hash.to_string(), "v1:587be6b4c3f93f93c489c0111bba5596147a26cb");
//! ```
//!
//! The version prefix leaves room to change the digest without rewriting
//! stored keys.

use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Content hash scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum HashVersion {
    /// SHA-1 over `blob <len>\0` followed by the content
    #[default]
    V1,
}

impl HashVersion {
    /// Digest length in bytes
    #[inline]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::V1 => 20,
        }
    }

    /// Digest length as hex
    #[inline]
    pub const fn hex_len(&self) -> usize {
        self.output_len() * 2
    }

    /// Prefix used in stored keys
    #[inline]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
        }
    }
}

impl fmt::Display for HashVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl FromStr for HashVersion {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(Self::V1),
            _ => Err(HashError::UnknownVersion(s.to_string())),
        }
    }
}

/// Content hash parse errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Prefix is not a known hash version
    UnknownVersion(String),
    /// String has no `<version>:` prefix
    MissingPrefix(String),
    /// Digest has wrong length for its version
    InvalidLength { expected: usize, got: usize },
    /// Digest is not lowercase hex
    InvalidHex(String),
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownVersion(v) => write!(f, "unknown content hash version: {}", v),
            Self::MissingPrefix(s) => write!(f, "content hash has no version prefix: {}", s),
            Self::InvalidLength { expected, got } => {
                write!(f, "invalid digest length: expected {}, got {}", expected, got)
            }
            Self::InvalidHex(s) => write!(f, "invalid hex in content hash: {}", s),
        }
    }
}

impl std::error::Error for HashError {}

/// A versioned content hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash {
    version: HashVersion,
    digest: String,
}

impl ContentHash {
    /// Hash content with the current version
    pub fn compute(content: &[u8]) -> Self {
        Self::compute_with(HashVersion::default(), content)
    }

    /// Hash content with a specific version
    pub fn compute_with(version: HashVersion, content: &[u8]) -> Self {
        let digest = match version {
            HashVersion::V1 => {
                let mut hasher = Sha1::new();
                hasher.update(format!("blob {}\0", content.len()).as_bytes());
                hasher.update(content);
                hex::encode(hasher.finalize())
            }
        };
        Self { version, digest }
    }

    /// Parse a stored `<version>:<hex>` key
    pub fn parse(s: &str) -> Result<Self, HashError> {
        let (prefix, digest) = s
            .split_once(':')
            .ok_or_else(|| HashError::MissingPrefix(s.to_string()))?;
        let version: HashVersion = prefix.parse()?;

        if digest.len() != version.hex_len() {
            return Err(HashError::InvalidLength {
                expected: version.hex_len(),
                got: digest.len(),
            });
        }
        if !digest
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(HashError::InvalidHex(s.to_string()));
        }

        Ok(Self {
            version,
            digest: digest.to_string(),
        })
    }

    /// The hash version
    #[inline]
    pub fn version(&self) -> HashVersion {
        self.version
    }

    /// Hex digest without the version prefix
    #[inline]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Check that `content` hashes to this value
    pub fn matches(&self, content: &[u8]) -> bool {
        Self::compute_with(self.version(), content) == *self
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.version(), self.digest)
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Compute the stored key for `content`
#[inline]
pub fn content_hash(content: &[u8]) -> String {
    ContentHash::compute(content).to_string()
}

/// Verification failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "content hash mismatch: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for VerifyError {}

/// Verify bytes against a stored content hash key
///
/// An unparseable key never verifies.
pub fn verify(content: &[u8], expected: &str) -> Result<(), VerifyError> {
    let actual = match ContentHash::parse(expected) {
        Ok(hash) => ContentHash::compute_with(hash.version(), content),
        Err(_) => ContentHash::compute(content),
    };
    if actual.to_string() == expected {
        Ok(())
    } else {
        Err(VerifyError {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}
