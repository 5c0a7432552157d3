// src/db/models/mod.rs

//! Data models for stored configuration
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating and reading records. Nothing here
//! deletes: blobs, revisions and files are append-only, and config sets
//! only ever have their pointer advanced.

mod blob;
mod config_set;
mod project_import;
mod revision;

pub use blob::Blob;
pub use config_set::{ConfigSet, RepositoryType};
pub use project_import::ProjectImportInfo;
pub use revision::{Manifest, Revision, RevisionFile};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::error::Error;
    use crate::hash::content_hash;
    use rusqlite::Connection;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn store(conn: &Connection, content: &[u8]) -> String {
        let hash = content_hash(content);
        Blob::put(conn, &hash, content).unwrap();
        hash
    }

    #[test]
    fn test_blob_put_get() {
        let (_temp, conn) = create_test_db();

        let hash = content_hash(b"x\n");
        assert!(Blob::put(&conn, &hash, b"x\n").unwrap());
        assert_eq!(Blob::get(&conn, &hash).unwrap(), Some(b"x\n".to_vec()));

        let blob = Blob::find(&conn, &hash).unwrap().unwrap();
        assert_eq!(blob.size, 2);
        assert!(blob.created_at.is_some());
    }

    #[test]
    fn test_blob_put_idempotent() {
        let (_temp, conn) = create_test_db();

        let hash = content_hash(b"same");
        assert!(Blob::put(&conn, &hash, b"same").unwrap());
        assert!(!Blob::put(&conn, &hash, b"same").unwrap());
        assert_eq!(Blob::count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_blob_put_rejects_wrong_hash() {
        let (_temp, conn) = create_test_db();

        let hash = content_hash(b"original");
        let result = Blob::put(&conn, &hash, b"different");
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
        assert!(!Blob::exists(&conn, &hash).unwrap());
    }

    #[test]
    fn test_blob_get_missing() {
        let (_temp, conn) = create_test_db();
        assert_eq!(Blob::get(&conn, "v1:0000000000000000000000000000000000000000").unwrap(), None);
    }

    #[test]
    fn test_revision_put_and_read() {
        let (_temp, conn) = create_test_db();

        let a = store(&conn, b"a");
        let b = store(&conn, b"b");
        let mut files = Manifest::new();
        files.insert("a.cfg".to_string(), a.clone());
        files.insert("dir/b.cfg".to_string(), b.clone());

        Revision::put(&conn, "services/x", "rev1", &files).unwrap();

        assert!(Revision::exists(&conn, "services/x", "rev1").unwrap());
        assert_eq!(
            Revision::get_manifest(&conn, "services/x", "rev1").unwrap(),
            Some(files)
        );
        assert_eq!(
            RevisionFile::find_hash(&conn, "services/x", "rev1", "dir/b.cfg").unwrap(),
            Some(b)
        );
        assert_eq!(
            RevisionFile::find_hash(&conn, "services/x", "rev1", "missing").unwrap(),
            None
        );
        assert_eq!(Revision::get_manifest(&conn, "services/x", "rev2").unwrap(), None);
    }

    #[test]
    fn test_revision_put_same_manifest_is_noop() {
        let (_temp, conn) = create_test_db();

        let a = store(&conn, b"a");
        let mut files = Manifest::new();
        files.insert("a.cfg".to_string(), a);

        Revision::put(&conn, "services/x", "rev1", &files).unwrap();
        Revision::put(&conn, "services/x", "rev1", &files).unwrap();
        assert_eq!(Revision::count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_revision_put_different_manifest_fails() {
        let (_temp, conn) = create_test_db();

        let a = store(&conn, b"a");
        let b = store(&conn, b"b");
        let mut first = Manifest::new();
        first.insert("a.cfg".to_string(), a);
        let mut second = Manifest::new();
        second.insert("a.cfg".to_string(), b);

        Revision::put(&conn, "services/x", "rev1", &first).unwrap();
        let result = Revision::put(&conn, "services/x", "rev1", &second);
        assert!(matches!(result, Err(Error::AlreadyExists(_))));

        // Same revision id under another config set is independent
        Revision::put(&conn, "services/y", "rev1", &second).unwrap();
    }

    #[test]
    fn test_revision_requires_blobs() {
        let (_temp, conn) = create_test_db();

        let mut files = Manifest::new();
        files.insert(
            "a.cfg".to_string(),
            "v1:0000000000000000000000000000000000000000".to_string(),
        );
        assert!(Revision::put(&conn, "services/x", "rev1", &files).is_err());
    }

    #[test]
    fn test_shared_blob_counted_per_file() {
        let (_temp, conn) = create_test_db();

        let shared = store(&conn, b"shared");
        let mut files = Manifest::new();
        files.insert("common.cfg".to_string(), shared.clone());

        Revision::put(&conn, "services/x", "rev1", &files).unwrap();
        Revision::put(&conn, "services/x", "rev2", &files).unwrap();

        assert_eq!(Blob::count(&conn).unwrap(), 1);
        assert_eq!(RevisionFile::count_by_hash(&conn, &shared).unwrap(), 2);
        assert_eq!(
            Revision::list_for_config_set(&conn, "services/x").unwrap().len(),
            2
        );
    }

    #[test]
    fn test_config_set_ensure_exists() {
        let (_temp, conn) = create_test_db();

        assert!(ConfigSet::ensure_exists(&conn, "services/x", RepositoryType::Gitiles, "https://a/x").unwrap());
        let before = ConfigSet::find_by_name(&conn, "services/x").unwrap().unwrap();

        // Second call keeps the original metadata
        assert!(!ConfigSet::ensure_exists(&conn, "services/x", RepositoryType::Gitiles, "https://b/x").unwrap());
        let after = ConfigSet::find_by_name(&conn, "services/x").unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(after.location, "https://a/x");
        assert_eq!(after.latest_revision, None);
    }

    #[test]
    fn test_config_set_set_latest() {
        let (_temp, conn) = create_test_db();

        let a = store(&conn, b"a");
        let mut files = Manifest::new();
        files.insert("a.cfg".to_string(), a);
        Revision::put(&conn, "services/x", "rev1", &files).unwrap();
        Revision::put(&conn, "services/x", "rev2", &files).unwrap();

        ConfigSet::ensure_exists(&conn, "services/x", RepositoryType::Gitiles, "https://a/x").unwrap();
        assert_eq!(ConfigSet::get_latest(&conn, "services/x").unwrap(), None);

        ConfigSet::set_latest(&conn, "services/x", "rev1", None).unwrap();
        assert_eq!(
            ConfigSet::get_latest(&conn, "services/x").unwrap().as_deref(),
            Some("rev1")
        );

        // Stale expectation loses
        let result = ConfigSet::set_latest(&conn, "services/x", "rev2", None);
        assert!(matches!(result, Err(Error::Conflict(_))));

        // ...unless the pointer already holds the same revision
        ConfigSet::set_latest(&conn, "services/x", "rev1", None).unwrap();
        assert_eq!(
            ConfigSet::get_latest(&conn, "services/x").unwrap().as_deref(),
            Some("rev1")
        );

        ConfigSet::set_latest(&conn, "services/x", "rev2", Some("rev1")).unwrap();
        assert_eq!(
            ConfigSet::get_latest(&conn, "services/x").unwrap().as_deref(),
            Some("rev2")
        );
    }

    #[test]
    fn test_config_set_set_latest_missing() {
        let (_temp, conn) = create_test_db();
        let result = ConfigSet::set_latest(&conn, "services/nope", "rev1", None);
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(ConfigSet::get_latest(&conn, "services/nope").unwrap(), None);
    }

    #[test]
    fn test_config_set_pointer_needs_revision() {
        let (_temp, conn) = create_test_db();

        ConfigSet::ensure_exists(&conn, "services/x", RepositoryType::Gitiles, "https://a/x").unwrap();
        assert!(ConfigSet::set_latest(&conn, "services/x", "never-written", None).is_err());
        assert_eq!(ConfigSet::get_latest(&conn, "services/x").unwrap(), None);
    }

    #[test]
    fn test_config_set_record_import() {
        let (_temp, conn) = create_test_db();

        ConfigSet::ensure_exists(&conn, "services/x", RepositoryType::Gitiles, "https://a/x").unwrap();
        ConfigSet::record_import(
            &conn,
            "services/x",
            RepositoryType::Gitiles,
            "https://a/x/+/abc",
            "2024-01-01T00:00:00+00:00",
        )
        .unwrap();

        let cs = ConfigSet::find_by_name(&conn, "services/x").unwrap().unwrap();
        assert_eq!(cs.location, "https://a/x/+/abc");
        assert_eq!(cs.last_import_at.as_deref(), Some("2024-01-01T00:00:00+00:00"));
        assert_eq!(ConfigSet::list_all(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_repository_type_shared_by_tables() {
        let (_temp, conn) = create_test_db();
        assert_eq!("gitiles".parse::<RepositoryType>(), Ok(RepositoryType::Gitiles));
        assert!("svn".parse::<RepositoryType>().is_err());

        ConfigSet::ensure_exists(&conn, "projects/x", RepositoryType::default(), "https://a/x").unwrap();
        ProjectImportInfo::upsert(&conn, "x", RepositoryType::Gitiles, "https://a/x", "t1").unwrap();

        let cs = ConfigSet::find_by_name(&conn, "projects/x").unwrap().unwrap();
        let info = ProjectImportInfo::find(&conn, "x").unwrap().unwrap();
        assert_eq!(cs.location_type, info.repo_type);
        assert_eq!(info.repo_type.to_string(), "gitiles");
    }

    #[test]
    fn test_project_import_info() {
        let (_temp, conn) = create_test_db();

        assert!(ProjectImportInfo::find(&conn, "x").unwrap().is_none());

        assert!(ProjectImportInfo::upsert(&conn, "x", RepositoryType::Gitiles, "https://localhost/x", "t1").unwrap());
        // Second time with the same info changes nothing
        assert!(!ProjectImportInfo::upsert(&conn, "x", RepositoryType::Gitiles, "https://localhost/x", "t2").unwrap());
        let info = ProjectImportInfo::find(&conn, "x").unwrap().unwrap();
        assert_eq!(info.repo_url, "https://localhost/x");
        assert_eq!(info.updated_at, "t1");

        // Change it
        assert!(ProjectImportInfo::upsert(&conn, "x", RepositoryType::Gitiles, "https://localhost/y", "t3").unwrap());
        let info = ProjectImportInfo::find(&conn, "x").unwrap().unwrap();
        assert_eq!(info.repo_url, "https://localhost/y");
        assert_eq!(info.repo_type, RepositoryType::Gitiles);
    }
}
