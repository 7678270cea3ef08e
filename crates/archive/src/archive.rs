//! The archive facade
//!
//! Ties the pieces together for one archive: creation with validation and
//! undo, version lifecycle, retention enforcement, and access to the
//! resolver. One `Archive` value per archive directory; no process-wide
//! state.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use strata_core::{Algorithm, Error, Result};
use uuid::Uuid;

use crate::compact::{CollapseReport, CompactionEngine, MigrationReport};
use crate::meta::{self, ArchiveConfig, VersionRecord};
use crate::registry::Registry;
use crate::resolve::SnapshotResolver;
use crate::snapshot::SnapshotWriter;
use crate::version::{Version, VersionChain};

pub struct Archive {
    archive_dir: PathBuf,
    config: ArchiveConfig,
    chain: VersionChain,
}

impl Archive {
    /// Create a new archive and take its base snapshot
    ///
    /// Validates the request, registers the archive, lays out its
    /// directories, and populates the base version. If anything fails
    /// after the registry record is written, the record and any created
    /// directories are removed before the error propagates.
    pub fn create(
        registry: &mut Registry,
        source_dir: &Path,
        archive_dir: &Path,
        algorithm: Algorithm,
        max_versions: usize,
    ) -> Result<Archive> {
        if !source_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "source directory does not exist: {}",
                source_dir.display()
            )));
        }
        if !archive_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "archive directory does not exist: {}",
                archive_dir.display()
            )));
        }
        if registry.find(None, None, Some(archive_dir))?.is_some() {
            return Err(Error::InvalidState(format!(
                "archive directory has already been used: {}",
                archive_dir.display()
            )));
        }
        if max_versions < 1 {
            return Err(Error::InvalidState(format!(
                "at least one version should be kept: {max_versions}"
            )));
        }

        let record = registry.add(source_dir, archive_dir)?;
        match Self::initialize(record.id, source_dir, archive_dir, algorithm, max_versions) {
            Ok(archive) => {
                tracing::info!(id = %archive.config.id, "created archive");
                Ok(archive)
            }
            Err(err) => {
                // Undo the record and the partial layout before surfacing
                let _ = registry.remove(record.id);
                let _ = fs::remove_dir_all(meta::content_dir(archive_dir));
                let _ = fs::remove_dir_all(meta::meta_dir(archive_dir));
                let _ = fs::remove_dir_all(meta::tmp_dir(archive_dir));
                tracing::warn!(id = %record.id, "archive creation failed, previous changes undone");
                Err(err)
            }
        }
    }

    fn initialize(
        id: Uuid,
        source_dir: &Path,
        archive_dir: &Path,
        algorithm: Algorithm,
        max_versions: usize,
    ) -> Result<Archive> {
        fs::create_dir(meta::content_dir(archive_dir))?;
        fs::create_dir(meta::meta_dir(archive_dir))?;

        let config = ArchiveConfig {
            id,
            source_dir: source_dir.to_path_buf(),
            algorithm,
            max_versions,
        };
        meta::store_archive_config(archive_dir, &config)?;

        let chain = VersionChain::load(archive_dir)?;
        let mut archive = Archive {
            archive_dir: archive_dir.to_path_buf(),
            config,
            chain,
        };
        archive.write_snapshot(true)?;
        Ok(archive)
    }

    /// Open an existing archive from its storage directory
    pub fn open(archive_dir: &Path) -> Result<Archive> {
        let config = meta::load_archive_config(archive_dir)?;
        let chain = VersionChain::load(archive_dir)?;
        Ok(Archive {
            archive_dir: archive_dir.to_path_buf(),
            config,
            chain,
        })
    }

    /// Remove the archive: its storage directory and registry record
    pub fn remove(self, registry: &mut Registry) -> Result<()> {
        let id = self.config.id;
        fs::remove_dir_all(&self.archive_dir)?;
        registry.remove(id)?;
        tracing::info!(%id, "removed archive");
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.config.id
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn chain(&self) -> &VersionChain {
        &self.chain
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.chain.iter()
    }

    pub fn get_version(&self, id: Uuid) -> Option<&Version> {
        self.chain.get(id)
    }

    pub fn resolver(&self) -> SnapshotResolver<'_> {
        SnapshotResolver::new(&self.chain)
    }

    /// Take a new snapshot, enforcing the retention policy first
    ///
    /// With `max_versions == 1` the policy is "always exactly one
    /// version": the current base is removed outright and a fresh full
    /// base snapshot is taken. Otherwise the oldest versions are migrated
    /// forward until there is room, then a normal incremental version is
    /// written.
    pub fn create_version(&mut self) -> Result<Version> {
        if self.config.max_versions == 1 {
            if let Some(base) = self.chain.base().cloned() {
                // Fully superseded by the upcoming full snapshot
                self.remove_version_unchecked(base.id)?;
            }
            return self.write_snapshot(true);
        }

        let max_versions = self.config.max_versions;
        CompactionEngine::new(&mut self.chain, &self.archive_dir)
            .enforce_retention(max_versions)?;

        if self.chain.is_empty() {
            return Err(Error::InvalidState(
                "cannot create a non-base version without a base version".to_string(),
            ));
        }
        self.write_snapshot(false)
    }

    /// Remove a version by id; the base is protected
    pub fn remove_version(&mut self, id: Uuid) -> Result<()> {
        let version = self
            .chain
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("version {id} not in archive {}", self.config.id)))?;
        if version.is_base {
            return Err(Error::InvalidState(
                "cannot remove the base version directly".to_string(),
            ));
        }
        self.remove_version_unchecked(id)
    }

    /// Single-step migration: fold the base forward into its successor
    pub fn migrate_oldest(&mut self) -> Result<MigrationReport> {
        CompactionEngine::new(&mut self.chain, &self.archive_dir).migrate_oldest_to_base()
    }

    /// Full collapse down to a single version
    pub fn migrate_all(&mut self) -> Result<CollapseReport> {
        CompactionEngine::new(&mut self.chain, &self.archive_dir).migrate_all_to_base()
    }

    fn write_snapshot(&mut self, is_base: bool) -> Result<Version> {
        if is_base && !self.chain.is_empty() {
            return Err(Error::InvalidState(
                "cannot create duplicate base versions".to_string(),
            ));
        }

        let mut id = Uuid::new_v4();
        while self.chain.get(id).is_some() {
            id = Uuid::new_v4();
        }
        let record = VersionRecord {
            id,
            created_at_ms: self.next_timestamp(),
            is_base,
        };
        self.chain.insert(&self.archive_dir, record)?;
        let version = self
            .chain
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("version {id} vanished after insert")))?;

        let writer = SnapshotWriter::new(&self.chain, &self.config.source_dir, self.config.algorithm);
        writer.populate(&version)?;

        tracing::info!(
            %id,
            base = is_base,
            archive = %self.config.id,
            "created version"
        );
        Ok(version)
    }

    fn remove_version_unchecked(&mut self, id: Uuid) -> Result<()> {
        let version = self
            .chain
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("version {id} not in archive {}", self.config.id)))?;
        self.chain.remove(&self.archive_dir, id)?;
        if version.dir().exists() {
            fs::remove_dir_all(version.dir())?;
        }
        tracing::info!(%id, "removed version");
        Ok(())
    }

    /// Creation timestamps are the sole ordering key, so assignment is
    /// clamped to stay strictly above the latest version's stamp even if
    /// the wall clock stalls within one millisecond.
    fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);
        match self.chain.latest() {
            Some(latest) => now.max(latest.created_at_ms + 1),
            None => now,
        }
    }
}
