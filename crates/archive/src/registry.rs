//! Registry of known archives
//!
//! An explicitly constructed handle over one registry directory; callers
//! create it and pass it where needed rather than reaching for process
//! state. The backing file is a single JSON document replaced atomically
//! on every mutation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::{atomic_write, Error, Result};
use uuid::Uuid;

const REGISTRY_FILE: &str = "registry.json";

/// One known archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: Uuid,
    pub source_dir: PathBuf,
    pub archive_dir: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    archives: Vec<ArchiveRecord>,
}

pub struct Registry {
    root: PathBuf,
    records: Vec<ArchiveRecord>,
}

impl Registry {
    /// Open the registry under `root`, creating an empty one on first use
    pub fn open(root: &Path) -> Result<Self> {
        let path = root.join(REGISTRY_FILE);
        if !path.exists() {
            tracing::debug!(root = %root.display(), "no registry file, starting empty");
            let registry = Self {
                root: root.to_path_buf(),
                records: Vec::new(),
            };
            registry.save()?;
            return Ok(registry);
        }

        let raw = fs::read_to_string(&path)?;
        let file: RegistryFile =
            serde_json::from_str(&raw).map_err(|source| Error::Metadata { path, source })?;
        Ok(Self {
            root: root.to_path_buf(),
            records: file.archives,
        })
    }

    pub fn records(&self) -> &[ArchiveRecord] {
        &self.records
    }

    /// Register a new archive, allocating a fresh identifier
    pub fn add(&mut self, source_dir: &Path, archive_dir: &Path) -> Result<ArchiveRecord> {
        let mut id = Uuid::new_v4();
        while self.records.iter().any(|record| record.id == id) {
            id = Uuid::new_v4();
        }

        let record = ArchiveRecord {
            id,
            source_dir: source_dir.to_path_buf(),
            archive_dir: archive_dir.to_path_buf(),
        };
        self.records.push(record.clone());
        self.save()?;

        tracing::info!(%id, source = %source_dir.display(), archive = %archive_dir.display(), "registered archive");
        Ok(record)
    }

    /// Find the record matching every provided restraint.
    /// At least one restraint is required.
    pub fn find(
        &self,
        id: Option<Uuid>,
        source_dir: Option<&Path>,
        archive_dir: Option<&Path>,
    ) -> Result<Option<&ArchiveRecord>> {
        if id.is_none() && source_dir.is_none() && archive_dir.is_none() {
            return Err(Error::InvalidState(
                "must provide at least one restraint".to_string(),
            ));
        }
        Ok(self.records.iter().find(|record| {
            if let Some(id) = id {
                if record.id != id {
                    return false;
                }
            }
            if let Some(source_dir) = source_dir {
                if record.source_dir != source_dir {
                    return false;
                }
            }
            if let Some(archive_dir) = archive_dir {
                if record.archive_dir != archive_dir {
                    return false;
                }
            }
            true
        }))
    }

    /// Drop a record; the archive's storage is the caller's to delete
    pub fn remove(&mut self, id: Uuid) -> Result<ArchiveRecord> {
        let index = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| Error::NotFound(format!("no archive record for {id}")))?;
        let record = self.records.remove(index);
        self.save()?;
        tracing::info!(%id, "removed archive record");
        Ok(record)
    }

    fn save(&self) -> Result<()> {
        let path = self.root.join(REGISTRY_FILE);
        let file = RegistryFile {
            archives: self.records.clone(),
        };
        let raw = serde_json::to_vec_pretty(&file)
            .map_err(|source| Error::Metadata { path: path.clone(), source })?;
        atomic_write(&self.root.join("tmp"), &path, &raw)
    }
}
