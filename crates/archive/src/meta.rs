//! Persisted metadata records for one archive
//!
//! Two records live under `<archive_dir>/meta/`: the archive-level config
//! and the version list. Both are JSON documents replaced atomically on
//! every write, so a load after a crash sees either the old or the new
//! record, never a torn one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::{atomic_write, Algorithm, Error, Result};
use uuid::Uuid;

const ARCHIVE_CONFIG_FILE: &str = "archive.json";
const VERSIONS_FILE: &str = "versions.json";

/// Archive-level configuration, written once at creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Stable identifier, shared with the registry record
    pub id: Uuid,
    /// Directory being backed up
    pub source_dir: PathBuf,
    /// Digest algorithm used for the copy/skip decision
    pub algorithm: Algorithm,
    /// Retention policy: maximum number of versions kept in the chain
    pub max_versions: usize,
}

/// One entry in the persisted version list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: Uuid,
    /// Creation timestamp in Unix milliseconds; sole ordering key
    pub created_at_ms: u64,
    pub is_base: bool,
}

/// Version-list document
#[derive(Debug, Default, Serialize, Deserialize)]
struct VersionIndex {
    records: Vec<VersionRecord>,
}

pub fn meta_dir(archive_dir: &Path) -> PathBuf {
    archive_dir.join("meta")
}

pub fn content_dir(archive_dir: &Path) -> PathBuf {
    archive_dir.join("archive")
}

pub fn tmp_dir(archive_dir: &Path) -> PathBuf {
    archive_dir.join("tmp")
}

/// Directory holding the files a version physically stores
pub fn version_dir(archive_dir: &Path, id: Uuid) -> PathBuf {
    content_dir(archive_dir).join(id.to_string())
}

pub fn load_archive_config(archive_dir: &Path) -> Result<ArchiveConfig> {
    let path = meta_dir(archive_dir).join(ARCHIVE_CONFIG_FILE);
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "archive config not found at {}",
            path.display()
        )));
    }
    let raw = fs::read_to_string(&path)?;
    serde_json::from_str(&raw).map_err(|source| Error::Metadata { path, source })
}

pub fn store_archive_config(archive_dir: &Path, config: &ArchiveConfig) -> Result<()> {
    let path = meta_dir(archive_dir).join(ARCHIVE_CONFIG_FILE);
    let raw = serde_json::to_vec_pretty(config)
        .map_err(|source| Error::Metadata { path: path.clone(), source })?;
    atomic_write(&tmp_dir(archive_dir), &path, &raw)
}

/// Load the version list; an archive with no versions yet has no file
pub fn load_version_records(archive_dir: &Path) -> Result<Vec<VersionRecord>> {
    let path = meta_dir(archive_dir).join(VERSIONS_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(&path)?;
    let index: VersionIndex =
        serde_json::from_str(&raw).map_err(|source| Error::Metadata { path, source })?;
    Ok(index.records)
}

pub fn store_version_records(archive_dir: &Path, records: &[VersionRecord]) -> Result<()> {
    let path = meta_dir(archive_dir).join(VERSIONS_FILE);
    let index = VersionIndex {
        records: records.to_vec(),
    };
    let raw = serde_json::to_vec_pretty(&index)
        .map_err(|source| Error::Metadata { path: path.clone(), source })?;
    atomic_write(&tmp_dir(archive_dir), &path, &raw)
}
