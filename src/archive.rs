// src/archive.rs

//! Unpacking of fetched tree snapshots
//!
//! A snapshot is a tar archive, normally gzip-compressed. Unpacking yields
//! a flat map of relative path to file content. Only regular files are
//! kept; directories, symlinks and other entry types are skipped.
//!
//! Entry paths come from a remote host and are untrusted:
//! - leading `/` and `./` are stripped
//! - `..` components make the whole archive invalid
//! - a path appearing twice makes the whole archive invalid

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path};
use tar::Archive;
use tracing::debug;

/// Maximum size of a single file in a snapshot (16 MiB)
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Files of a snapshot keyed by relative path
pub type FileMap = BTreeMap<String, Vec<u8>>;

/// Unpack a (optionally gzip-compressed) tar archive
pub fn unpack(data: &[u8]) -> Result<FileMap> {
    if data.starts_with(&GZIP_MAGIC) {
        unpack_tar(GzDecoder::new(data))
    } else {
        unpack_tar(data)
    }
}

fn unpack_tar<R: Read>(reader: R) -> Result<FileMap> {
    let mut archive = Archive::new(reader);
    let mut files = FileMap::new();

    let entries = archive
        .entries()
        .map_err(|e| Error::InvalidArchive(format!("Failed to read archive entries: {}", e)))?;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| Error::InvalidArchive(format!("Failed to read archive entry: {}", e)))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let raw_path = entry
            .path()
            .map_err(|e| Error::InvalidArchive(format!("Failed to get entry path: {}", e)))?
            .to_string_lossy()
            .to_string();
        let path = sanitize_path(&raw_path)?;

        let size = entry
            .header()
            .size()
            .map_err(|e| Error::InvalidArchive(format!("Failed to get size of {}: {}", path, e)))?;
        if size > MAX_FILE_SIZE {
            return Err(Error::InvalidArchive(format!(
                "{} is {} bytes, limit is {}",
                path, size, MAX_FILE_SIZE
            )));
        }

        let mut content = Vec::with_capacity(size as usize);
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::InvalidArchive(format!("Failed to read {}: {}", path, e)))?;

        if files.insert(path.clone(), content).is_some() {
            return Err(Error::InvalidArchive(format!("duplicate path {}", path)));
        }
    }

    debug!("Unpacked {} files from archive", files.len());
    Ok(files)
}

/// Normalize an archive entry path to `a/b/c` form
pub fn sanitize_path(path: &str) -> Result<String> {
    let relative = path.trim_start_matches('/');
    let mut parts: Vec<String> = Vec::new();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => parts.push(c.to_string_lossy().to_string()),
            Component::CurDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(path.to_string())),
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if parts.is_empty() {
        return Err(Error::InvalidArchive(format!("empty entry path: {:?}", path)));
    }
    Ok(parts.join("/"))
}
