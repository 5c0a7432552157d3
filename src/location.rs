// src/location.rs

//! Source locations of config sets
//!
//! A location names a directory at a point in a repository's history:
//!
//! ```text
//! https://<host>/<project>[/+/<treeish>][/<path>]
//! ```
//!
//! The treeish defaults to `HEAD` and the path to `/`. Projects may contain
//! slashes (`chromium/src`); the `/+/` marker separates project from
//! treeish.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Treeish used when a location does not name one
pub const DEFAULT_TREEISH: &str = "HEAD";

/// A directory in a remote repository at a given treeish
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// Host name, including a port when one was given
    pub hostname: String,
    /// Repository path on the host, without leading or trailing slashes
    pub project: String,
    /// Branch, tag, or commit id
    pub treeish: String,
    /// Absolute directory path inside the repository (`/` for the root)
    pub path: String,
}

impl Location {
    /// Build a location from parts, normalizing the path
    pub fn new(
        hostname: impl Into<String>,
        project: impl Into<String>,
        treeish: impl Into<String>,
        path: impl AsRef<str>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            project: project.into(),
            treeish: treeish.into(),
            path: normalize_path(path.as_ref()),
        }
    }

    /// Parse a location expression
    pub fn parse(expr: &str) -> Result<Self> {
        let url = Url::parse(expr)
            .map_err(|e| Error::InvalidLocation(format!("{}: {}", expr, e)))?;

        if url.scheme() != "https" {
            return Err(Error::InvalidLocation(format!(
                "{}: only https locations are supported",
                expr
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidLocation(format!("{}: missing host", expr)))?;
        let hostname = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let full_path = url.path().trim_start_matches('/');
        let (project, rest) = match full_path.split_once("/+/") {
            Some((project, rest)) => (project, Some(rest)),
            None => (full_path.strip_suffix("/+").unwrap_or(full_path), None),
        };

        let project = project.trim_end_matches('/');
        let project = project.strip_suffix(".git").unwrap_or(project);
        if project.is_empty() {
            return Err(Error::InvalidLocation(format!("{}: missing project", expr)));
        }

        let (treeish, path) = match rest {
            Some(rest) => {
                let rest = rest.trim_start_matches('/');
                match rest.split_once('/') {
                    Some((treeish, path)) => (treeish, path),
                    None => (rest, ""),
                }
            }
            None => ("", ""),
        };
        let treeish = if treeish.is_empty() {
            DEFAULT_TREEISH
        } else {
            treeish
        };

        Ok(Self::new(hostname, project, treeish, path))
    }

    /// Same directory at a different treeish
    pub fn with_treeish(&self, treeish: impl Into<String>) -> Self {
        Self {
            treeish: treeish.into(),
            ..self.clone()
        }
    }

    /// A subdirectory of this location
    pub fn join(&self, child: &str) -> Self {
        let child = child.trim_matches('/');
        if child.is_empty() {
            return self.clone();
        }
        let path = if self.path == "/" {
            format!("/{}", child)
        } else {
            format!("{}/{}", self.path, child)
        };
        Self {
            path,
            ..self.clone()
        }
    }

    /// `https://<host>/<project>` with no treeish or path
    pub fn repository_url(&self) -> String {
        format!("https://{}/{}", self.hostname, self.project)
    }

    /// Whether the treeish is a full 40-character commit id
    pub fn is_pinned(&self) -> bool {
        is_commit_id(&self.treeish)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/+/{}", self.repository_url(), self.treeish)?;
        if self.path != "/" {
            write!(f, "{}", self.path)?;
        }
        Ok(())
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Whether `s` is a full lowercase hex commit id
pub fn is_commit_id(s: &str) -> bool {
    s.len() == 40 && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}
