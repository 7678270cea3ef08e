//! Snapshot creation: populating a version from the source tree
//!
//! The writer mirrors the source directory structure unconditionally and
//! then decides per regular file whether a physical copy is needed. The
//! base version always copies everything; later versions defer to the
//! effective owner among strictly older versions when the content is
//! byte-identical.

use std::fs;
use std::io;
use std::path::Path;

use strata_core::digest::same_content;
use strata_core::fsutil::{copy_with_parents, relative_to};
use strata_core::{Algorithm, Error, Result};
use walkdir::WalkDir;

use crate::resolve::{effective_owner, walk_error};
use crate::version::{Version, VersionChain};

/// Populates a newly created version's directory
pub struct SnapshotWriter<'a> {
    chain: &'a VersionChain,
    source_dir: &'a Path,
    algorithm: Algorithm,
}

impl<'a> SnapshotWriter<'a> {
    pub fn new(chain: &'a VersionChain, source_dir: &'a Path, algorithm: Algorithm) -> Self {
        Self {
            chain,
            source_dir,
            algorithm,
        }
    }

    /// Fill the target version's directory from the source tree
    ///
    /// Returns the number of files physically copied; zero is valid (an
    /// all-unchanged snapshot). A failure part-way leaves the partially
    /// populated directory in place; the caller may remove the version.
    pub fn populate(&self, target: &Version) -> Result<usize> {
        if !self.source_dir.is_dir() {
            return Err(Error::SnapshotIo(io::Error::new(
                io::ErrorKind::NotFound,
                format!("source directory missing: {}", self.source_dir.display()),
            )));
        }
        let target_index = self.chain.position(target.id).ok_or_else(|| {
            Error::NotFound(format!("version {} is not in the chain", target.id))
        })?;

        fs::create_dir_all(target.dir())?;

        let mut copied = 0;
        for entry in WalkDir::new(self.source_dir).min_depth(1) {
            let entry = entry.map_err(walk_error)?;
            let relative = relative_to(self.source_dir, entry.path())?;

            // Directories are mirrored unconditionally
            if entry.file_type().is_dir() {
                fs::create_dir_all(target.dir().join(&relative))?;
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            if !target.is_base {
                // Nearest predecessor storing this path; equal content
                // means the predecessor remains the owner and no copy is
                // made. First appearance always copies.
                let owner = target_index
                    .checked_sub(1)
                    .and_then(|upto| effective_owner(self.chain, upto, &relative));
                if let Some(owner) = owner {
                    let stored = owner.dir().join(&relative);
                    if same_content(&stored, entry.path(), self.algorithm)? {
                        continue;
                    }
                }
            }

            copy_with_parents(entry.path(), &target.dir().join(&relative))?;
            copied += 1;
            tracing::debug!(path = %relative.display(), "copied file");
        }

        tracing::info!(copied, version = %target.id, "populated snapshot");
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{store_version_records, version_dir, VersionRecord};
    use std::path::PathBuf;
    use uuid::Uuid;

    struct Fixture {
        _temp: tempfile::TempDir,
        archive_dir: PathBuf,
        source_dir: PathBuf,
        records: Vec<VersionRecord>,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let temp = tempfile::tempdir()?;
            let archive_dir = temp.path().join("archive-root");
            let source_dir = temp.path().join("source");
            fs::create_dir_all(&archive_dir)?;
            fs::create_dir_all(&source_dir)?;
            Ok(Self {
                _temp: temp,
                archive_dir,
                source_dir,
                records: Vec::new(),
            })
        }

        fn write_source(&self, relative: &str, content: &str) -> Result<()> {
            let path = self.source_dir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
            Ok(())
        }

        /// Add a version record and reload the chain
        fn push_version(&mut self, is_base: bool) -> Result<(VersionChain, Version)> {
            let id = Uuid::new_v4();
            let stamp = 1000 + self.records.len() as u64;
            self.records.push(VersionRecord {
                id,
                created_at_ms: stamp,
                is_base,
            });
            store_version_records(&self.archive_dir, &self.records)?;
            let chain = VersionChain::load(&self.archive_dir)?;
            let version = chain.get(id).cloned().unwrap();
            Ok((chain, version))
        }

        fn populate(&self, chain: &VersionChain, version: &Version) -> Result<usize> {
            SnapshotWriter::new(chain, &self.source_dir, Algorithm::Sha256).populate(version)
        }

        fn stored(&self, version: &Version, relative: &str) -> PathBuf {
            version_dir(&self.archive_dir, version.id).join(relative)
        }
    }

    #[test]
    fn test_base_copies_everything() -> Result<()> {
        let mut fixture = Fixture::new()?;
        fixture.write_source("a.txt", "1")?;
        fixture.write_source("nested/deep/b.txt", "2")?;

        let (chain, base) = fixture.push_version(true)?;
        let copied = fixture.populate(&chain, &base)?;

        assert_eq!(copied, 2);
        assert!(fixture.stored(&base, "a.txt").is_file());
        assert!(fixture.stored(&base, "nested/deep/b.txt").is_file());
        Ok(())
    }

    #[test]
    fn test_unchanged_file_is_skipped() -> Result<()> {
        let mut fixture = Fixture::new()?;
        fixture.write_source("a.txt", "same")?;

        let (chain, base) = fixture.push_version(true)?;
        fixture.populate(&chain, &base)?;

        let (chain, second) = fixture.push_version(false)?;
        let copied = fixture.populate(&chain, &second)?;

        assert_eq!(copied, 0);
        assert!(!fixture.stored(&second, "a.txt").exists());
        Ok(())
    }

    #[test]
    fn test_changed_file_is_copied() -> Result<()> {
        let mut fixture = Fixture::new()?;
        fixture.write_source("a.txt", "before")?;

        let (chain, base) = fixture.push_version(true)?;
        fixture.populate(&chain, &base)?;

        fixture.write_source("a.txt", "after")?;
        let (chain, second) = fixture.push_version(false)?;
        let copied = fixture.populate(&chain, &second)?;

        assert_eq!(copied, 1);
        assert_eq!(fs::read_to_string(fixture.stored(&second, "a.txt"))?, "after");
        // The base copy is untouched
        assert_eq!(fs::read_to_string(fixture.stored(&base, "a.txt"))?, "before");
        Ok(())
    }

    #[test]
    fn test_first_appearance_is_copied() -> Result<()> {
        let mut fixture = Fixture::new()?;
        fixture.write_source("a.txt", "1")?;

        let (chain, base) = fixture.push_version(true)?;
        fixture.populate(&chain, &base)?;

        fixture.write_source("b.txt", "new")?;
        let (chain, second) = fixture.push_version(false)?;
        let copied = fixture.populate(&chain, &second)?;

        assert_eq!(copied, 1);
        assert!(fixture.stored(&second, "b.txt").is_file());
        assert!(!fixture.stored(&second, "a.txt").exists());
        Ok(())
    }

    #[test]
    fn test_owner_is_nearest_predecessor() -> Result<()> {
        let mut fixture = Fixture::new()?;
        fixture.write_source("a.txt", "v1")?;

        let (chain, base) = fixture.push_version(true)?;
        fixture.populate(&chain, &base)?;

        fixture.write_source("a.txt", "v2")?;
        let (chain, second) = fixture.push_version(false)?;
        fixture.populate(&chain, &second)?;

        // Unchanged relative to the *second* version, not the base
        let (chain, third) = fixture.push_version(false)?;
        let copied = fixture.populate(&chain, &third)?;

        assert_eq!(copied, 0);
        Ok(())
    }

    #[test]
    fn test_directories_mirrored_even_when_empty() -> Result<()> {
        let mut fixture = Fixture::new()?;
        fixture.write_source("a.txt", "1")?;
        fs::create_dir_all(fixture.source_dir.join("empty/dir"))?;

        let (chain, base) = fixture.push_version(true)?;
        fixture.populate(&chain, &base)?;

        assert!(fixture.stored(&base, "empty/dir").is_dir());
        Ok(())
    }

    #[test]
    fn test_missing_source_fails() -> Result<()> {
        let mut fixture = Fixture::new()?;
        let (chain, base) = fixture.push_version(true)?;

        fs::remove_dir_all(&fixture.source_dir)?;
        let result = fixture.populate(&chain, &base);
        assert!(matches!(result, Err(Error::SnapshotIo(_))));
        Ok(())
    }
}
