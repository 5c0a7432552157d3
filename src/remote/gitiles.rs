// src/remote/gitiles.rs

//! HTTP client for Gitiles-style source-control endpoints
//!
//! Uses the JSON views of `+log` and `+` and the `+archive` tarball
//! endpoint. Calls are made once; retrying is left to whoever schedules the
//! next import cycle.

use super::{Commit, RemoteError, RemoteRepository, RemoteResult, TreeEntry};
use crate::error::{Error, Result};
use crate::location::Location;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Prefix Gitiles puts in front of JSON bodies
const XSSI_PREFIX: &str = ")]}'";

/// Default timeout for requests without an explicit deadline
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct LogResponse {
    #[serde(default)]
    log: Vec<Commit>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    entries: Vec<TreeEntry>,
}

/// Blocking Gitiles client
pub struct GitilesClient {
    client: Client,
    token: Option<String>,
}

impl GitilesClient {
    /// Create a client with the default timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    /// Create a client whose requests default to `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// GET `url`; `Ok(None)` on 404
    fn get(&self, url: &str, deadline: Option<Duration>) -> RemoteResult<Option<Response>> {
        debug!("GET {}", url);

        let mut request = self.client.get(url);
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| classify_error(&e, url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if let Some(err) = status_error(response.status(), url) {
            return Err(err);
        }
        Ok(Some(response))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        deadline: Option<Duration>,
    ) -> RemoteResult<Option<T>> {
        let Some(response) = self.get(url, deadline)? else {
            return Ok(None);
        };
        let body = response.text().map_err(|e| classify_error(&e, url))?;
        parse_json(&body)
            .map(Some)
            .map_err(|e| RemoteError::InvalidResponse(format!("{}: {}", url, e)))
    }
}

impl RemoteRepository for GitilesClient {
    fn resolve_ref(&self, location: &Location, deadline: Duration) -> RemoteResult<Option<Commit>> {
        let url = log_url(location, 1);
        let log: Option<LogResponse> = self.get_json(&url, Some(deadline))?;
        Ok(log.and_then(|log| log.log.into_iter().next()))
    }

    fn list_tree(&self, location: &Location) -> RemoteResult<Vec<TreeEntry>> {
        let url = tree_url(location);
        let tree: Option<TreeResponse> = self.get_json(&url, None)?;
        Ok(tree.map(|t| t.entries).unwrap_or_default())
    }

    fn fetch_archive(
        &self,
        location: &Location,
        deadline: Duration,
    ) -> RemoteResult<Option<Vec<u8>>> {
        let url = archive_url(location);
        let Some(response) = self.get(&url, Some(deadline))? else {
            return Ok(None);
        };
        let bytes = response.bytes().map_err(|e| classify_error(&e, &url))?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(Some(bytes.to_vec()))
    }

    fn name(&self) -> &str {
        "gitiles"
    }
}

/// Location path as a URL suffix: empty for the root, `/a/b` otherwise
fn path_suffix(location: &Location) -> &str {
    if location.path == "/" {
        ""
    } else {
        &location.path
    }
}

pub(crate) fn log_url(location: &Location, limit: usize) -> String {
    format!(
        "{}/+log/{}{}?format=JSON&n={}",
        location.repository_url(),
        location.treeish,
        path_suffix(location),
        limit
    )
}

pub(crate) fn tree_url(location: &Location) -> String {
    format!(
        "{}/+/{}{}/?format=JSON",
        location.repository_url(),
        location.treeish,
        path_suffix(location)
    )
}

pub(crate) fn archive_url(location: &Location) -> String {
    format!(
        "{}/+archive/{}{}.tar.gz",
        location.repository_url(),
        location.treeish,
        path_suffix(location)
    )
}

fn parse_json<T: DeserializeOwned>(body: &str) -> serde_json::Result<T> {
    let body = body.trim_start();
    let body = body.strip_prefix(XSSI_PREFIX).unwrap_or(body);
    serde_json::from_str(body)
}

fn status_error(status: StatusCode, url: &str) -> Option<RemoteError> {
    if status.is_success() {
        return None;
    }
    let msg = format!("HTTP {} from {}", status, url);
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Authorization(msg),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            RemoteError::DeadlineExceeded(msg)
        }
        _ => RemoteError::Transport(msg),
    })
}

fn classify_error(err: &reqwest::Error, url: &str) -> RemoteError {
    if err.is_timeout() {
        RemoteError::DeadlineExceeded(format!("{}: {}", url, err))
    } else if let Some(status) = err.status() {
        status_error(status, url)
            .unwrap_or_else(|| RemoteError::Transport(format!("{}: {}", url, err)))
    } else {
        RemoteError::Transport(format!("{}: {}", url, err))
    }
}
