// src/validation.rs

//! Config validation hook and identifier checks
//!
//! What makes a config file valid is decided outside this crate. The import
//! engine only needs a yes/no answer before it publishes a revision.

use crate::archive::FileMap;
use regex::Regex;
use std::sync::LazyLock;

static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9\-_]+$").unwrap());

// One ref component; a '/' would be read as the start of the config path
static BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._\-]*$").unwrap());

/// Decides whether a fetched revision may be published
pub trait ConfigValidator: Send + Sync {
    /// `true` to accept `files` as the next revision of `config_set`
    fn validate(&self, config_set: &str, files: &FileMap) -> bool;
}

/// Validator that accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ConfigValidator for AcceptAll {
    fn validate(&self, _config_set: &str, _files: &FileMap) -> bool {
        true
    }
}

impl<F> ConfigValidator for F
where
    F: Fn(&str, &FileMap) -> bool + Send + Sync,
{
    fn validate(&self, config_set: &str, files: &FileMap) -> bool {
        self(config_set, files)
    }
}

/// Whether `id` can name a service (`services/<id>`)
pub fn is_valid_service_id(id: &str) -> bool {
    ID_RE.is_match(id)
}

/// Whether `id` can name a project (`projects/<id>`)
pub fn is_valid_project_id(id: &str) -> bool {
    ID_RE.is_match(id)
}

/// Whether `name` can be used as a branch treeish and in
/// `projects/<id>/branches/<name>`
pub fn is_valid_branch_name(name: &str) -> bool {
    BRANCH_RE.is_match(name)
        && !name.contains("..")
        && !name.ends_with('.')
        && !name.ends_with(".lock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_ids() {
        assert!(is_valid_service_id("luci-config"));
        assert!(is_valid_service_id("swarming_1"));
        assert!(!is_valid_service_id(""));
        assert!(!is_valid_service_id("Upper"));
        assert!(!is_valid_service_id("has space"));
        assert!(!is_valid_service_id("a/b"));
        assert!(!is_valid_service_id(".hidden"));
    }

    #[test]
    fn test_project_ids() {
        assert!(is_valid_project_id("chromium"));
        assert!(!is_valid_project_id("chromium/src"));
    }

    #[test]
    fn test_closure_validator() {
        let reject_empty = |_: &str, files: &FileMap| !files.is_empty();
        assert!(!reject_empty.validate("services/x", &FileMap::new()));

        let mut files = FileMap::new();
        files.insert("a.cfg".to_string(), b"a".to_vec());
        assert!(reject_empty.validate("services/x", &files));
        assert!(AcceptAll.validate("services/x", &FileMap::new()));
    }

    #[test]
    fn test_branch_names() {
        assert!(is_valid_branch_name("main"));
        assert!(is_valid_branch_name("release-4.2"));
        assert!(is_valid_branch_name("Infra_Config"));
        assert!(!is_valid_branch_name(""));
        assert!(!is_valid_branch_name("a b"));
        assert!(!is_valid_branch_name("../x"));
        assert!(!is_valid_branch_name("a..b"));
        assert!(!is_valid_branch_name("refs/heads/main"));
        assert!(!is_valid_branch_name(".hidden"));
        assert!(!is_valid_branch_name("-rf"));
        assert!(!is_valid_branch_name("topic.lock"));
        assert!(!is_valid_branch_name("trailing."));
    }
}
