//! Version handles and the ordered version chain
//!
//! A chain is an implicit doubly-linked structure over a sorted list:
//! previous/next are computed positionally from the records sorted by
//! creation timestamp, never stored as links. Every structural mutation
//! persists the record change and then reloads and revalidates, so cached
//! ordering can never drift from persisted state.

use std::path::{Path, PathBuf};

use strata_core::{Error, Result};
use uuid::Uuid;

use crate::meta::{self, VersionRecord};

/// One snapshot layer in an archive's chain
#[derive(Debug, Clone)]
pub struct Version {
    pub id: Uuid,
    /// Unix milliseconds; the sole ordering key
    pub created_at_ms: u64,
    pub is_base: bool,
    dir: PathBuf,
}

impl Version {
    fn from_record(archive_dir: &Path, record: &VersionRecord) -> Self {
        Self {
            id: record.id,
            created_at_ms: record.created_at_ms,
            is_base: record.is_base,
            dir: meta::version_dir(archive_dir, record.id),
        }
    }

    /// Directory holding this version's physically stored files
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Version {}

/// The ordered sequence of versions belonging to one archive
#[derive(Debug)]
pub struct VersionChain {
    versions: Vec<Version>,
}

impl VersionChain {
    /// Load and validate the chain from persisted version records
    ///
    /// Records are stable-sorted ascending by creation timestamp, so
    /// equal stamps keep their record order. Equal stamps are ambiguous
    /// ordering and are neither repaired nor rejected here; creation-side
    /// assignment is clamped monotonic and cannot produce them.
    pub fn load(archive_dir: &Path) -> Result<Self> {
        let mut records = meta::load_version_records(archive_dir)?;
        records.sort_by_key(|record| record.created_at_ms);

        let versions: Vec<Version> = records
            .iter()
            .map(|record| Version::from_record(archive_dir, record))
            .collect();

        let chain = Self { versions };
        chain.validate()?;
        tracing::debug!(count = chain.len(), "loaded version chain");
        Ok(chain)
    }

    /// Exactly one base version must exist and it must be the oldest.
    /// An empty chain is valid (a freshly created archive before its base
    /// snapshot); anything else out of shape is corruption, reported
    /// rather than silently repaired.
    fn validate(&self) -> Result<()> {
        if self.versions.is_empty() {
            return Ok(());
        }

        let base_count = self.versions.iter().filter(|v| v.is_base).count();
        if base_count == 0 {
            return Err(Error::ChainCorruption(
                "no base version in a non-empty chain".to_string(),
            ));
        }
        if base_count > 1 {
            return Err(Error::ChainCorruption(format!(
                "{base_count} base versions, expected exactly one"
            )));
        }
        if !self.versions[0].is_base {
            return Err(Error::ChainCorruption(format!(
                "base version {} is not the oldest in the chain",
                self.versions.iter().find(|v| v.is_base).map(|v| v.id).unwrap_or_default()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter()
    }

    /// The chronologically first version
    pub fn base(&self) -> Option<&Version> {
        self.versions.first()
    }

    /// The chronologically last version
    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    pub fn get(&self, id: Uuid) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Position of a version in chain order
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.versions.iter().position(|v| v.id == id)
    }

    pub fn at(&self, index: usize) -> Option<&Version> {
        self.versions.get(index)
    }

    /// Neighbor toward the base; the base itself has no previous
    pub fn previous(&self, version: &Version) -> Option<&Version> {
        let index = self.position(version.id)?;
        index.checked_sub(1).and_then(|i| self.versions.get(i))
    }

    /// Neighbor toward the latest version
    pub fn next(&self, version: &Version) -> Option<&Version> {
        let index = self.position(version.id)?;
        self.versions.get(index + 1)
    }

    /// Append a record, persist, and reload
    pub fn insert(&mut self, archive_dir: &Path, record: VersionRecord) -> Result<()> {
        let mut records = meta::load_version_records(archive_dir)?;
        records.push(record);
        meta::store_version_records(archive_dir, &records)?;
        *self = Self::load(archive_dir)?;
        Ok(())
    }

    /// Remove a record, persist, and reload
    ///
    /// Only touches the record; deleting the version's directory is the
    /// caller's step. Base protection also lives with the caller, since
    /// the compaction path is allowed to remove a base.
    pub fn remove(&mut self, archive_dir: &Path, id: Uuid) -> Result<()> {
        let mut records = meta::load_version_records(archive_dir)?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            return Err(Error::NotFound(format!("version {id} has no record")));
        }
        meta::store_version_records(archive_dir, &records)?;
        *self = Self::load(archive_dir)?;
        Ok(())
    }

    /// Transfer the base flag and drop the old base in one persisted step,
    /// so no load can observe two bases between the two changes
    pub(crate) fn promote_and_remove(
        &mut self,
        archive_dir: &Path,
        new_base: Uuid,
        removed: Uuid,
    ) -> Result<()> {
        let mut records = meta::load_version_records(archive_dir)?;
        for record in &mut records {
            if record.id == new_base {
                record.is_base = true;
            }
        }
        records.retain(|record| record.id != removed);
        meta::store_version_records(archive_dir, &records)?;
        *self = Self::load(archive_dir)?;
        Ok(())
    }

    pub fn reload(&mut self, archive_dir: &Path) -> Result<()> {
        *self = Self::load(archive_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::store_version_records;

    fn record(ms: u64, is_base: bool) -> VersionRecord {
        VersionRecord {
            id: Uuid::new_v4(),
            created_at_ms: ms,
            is_base,
        }
    }

    #[test]
    fn test_load_empty_chain() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let chain = VersionChain::load(temp_dir.path())?;
        assert!(chain.is_empty());
        assert!(chain.base().is_none());
        assert!(chain.latest().is_none());
        Ok(())
    }

    #[test]
    fn test_load_sorts_by_timestamp() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let base = record(100, true);
        let late = record(300, false);
        let mid = record(200, false);
        // Persist out of order
        store_version_records(temp_dir.path(), &[late.clone(), base.clone(), mid.clone()])?;

        let chain = VersionChain::load(temp_dir.path())?;
        assert_eq!(chain.base().unwrap().id, base.id);
        assert_eq!(chain.at(1).unwrap().id, mid.id);
        assert_eq!(chain.latest().unwrap().id, late.id);
        Ok(())
    }

    #[test]
    fn test_neighbors_are_positional() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let a = record(100, true);
        let b = record(200, false);
        let c = record(300, false);
        store_version_records(temp_dir.path(), &[a.clone(), b.clone(), c.clone()])?;

        let chain = VersionChain::load(temp_dir.path())?;
        let base = chain.base().unwrap().clone();
        let middle = chain.at(1).unwrap().clone();
        let last = chain.latest().unwrap().clone();

        assert!(chain.previous(&base).is_none());
        assert_eq!(chain.previous(&middle).unwrap().id, a.id);
        assert_eq!(chain.next(&middle).unwrap().id, c.id);
        assert!(chain.next(&last).is_none());
        Ok(())
    }

    #[test]
    fn test_zero_base_is_corruption() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        store_version_records(temp_dir.path(), &[record(100, false), record(200, false)])?;

        let result = VersionChain::load(temp_dir.path());
        assert!(matches!(result, Err(Error::ChainCorruption(_))));
        Ok(())
    }

    #[test]
    fn test_multiple_bases_is_corruption() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        store_version_records(temp_dir.path(), &[record(100, true), record(200, true)])?;

        let result = VersionChain::load(temp_dir.path());
        assert!(matches!(result, Err(Error::ChainCorruption(_))));
        Ok(())
    }

    #[test]
    fn test_base_not_oldest_is_corruption() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        store_version_records(temp_dir.path(), &[record(100, false), record(200, true)])?;

        let result = VersionChain::load(temp_dir.path());
        assert!(matches!(result, Err(Error::ChainCorruption(_))));
        Ok(())
    }

    #[test]
    fn test_insert_reloads_in_order() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut chain = VersionChain::load(temp_dir.path())?;

        chain.insert(temp_dir.path(), record(100, true))?;
        chain.insert(temp_dir.path(), record(200, false))?;

        assert_eq!(chain.len(), 2);
        assert!(chain.base().unwrap().is_base);
        assert!(!chain.latest().unwrap().is_base);
        Ok(())
    }

    #[test]
    fn test_remove_missing_record() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut chain = VersionChain::load(temp_dir.path())?;
        chain.insert(temp_dir.path(), record(100, true))?;

        let result = chain.remove(temp_dir.path(), Uuid::new_v4());
        assert!(matches!(result, Err(Error::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_promote_and_remove_single_step() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let old_base = record(100, true);
        let next = record(200, false);
        store_version_records(temp_dir.path(), &[old_base.clone(), next.clone()])?;

        let mut chain = VersionChain::load(temp_dir.path())?;
        chain.promote_and_remove(temp_dir.path(), next.id, old_base.id)?;

        assert_eq!(chain.len(), 1);
        let base = chain.base().unwrap();
        assert_eq!(base.id, next.id);
        assert!(base.is_base);
        Ok(())
    }
}
