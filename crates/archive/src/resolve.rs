//! Logical-snapshot resolution
//!
//! Two views exist over a version. The *exact* view lists the files the
//! version physically stores, nothing more. The *effective* view is the
//! full logical tree visible when the version is treated as the current
//! state: every path is resolved to its effective owner, the most recent
//! version at or before the query version that stores it.
//!
//! Both views are lazy iterators in filesystem traversal order (not
//! sorted) and restartable by asking the resolver again. Deletions are
//! not tracked: a path removed from the source after its last owning
//! version keeps resolving to that last stored copy.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use strata_core::fsutil::{copy_with_parents, relative_to};
use strata_core::{Error, Result};

use crate::version::{Version, VersionChain};

/// One resolved file: where it sits in the logical tree and where its
/// bytes physically live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub relative: PathBuf,
    pub stored: PathBuf,
}

/// Most recent version at or before chain position `upto` (inclusive)
/// that physically stores `relative`
///
/// This is the single owner-resolution rule; the snapshot writer and both
/// resolver passes all go through it.
pub(crate) fn effective_owner<'c>(
    chain: &'c VersionChain,
    upto: usize,
    relative: &Path,
) -> Option<&'c Version> {
    for index in (0..=upto).rev() {
        let version = chain.at(index)?;
        if version.dir().join(relative).is_file() {
            return Some(version);
        }
    }
    None
}

pub(crate) fn walk_error(err: walkdir::Error) -> Error {
    let message = err.to_string();
    match err.into_io_error() {
        Some(io) => Error::SnapshotIo(io),
        None => Error::Resolution(message),
    }
}

/// Resolves views over one archive's chain
pub struct SnapshotResolver<'c> {
    chain: &'c VersionChain,
}

impl<'c> SnapshotResolver<'c> {
    pub fn new(chain: &'c VersionChain) -> Self {
        Self { chain }
    }

    /// The files physically stored in this version's own directory.
    /// No chain traversal.
    pub fn exact_files(&self, version: &Version) -> ExactFiles {
        ExactFiles::new(version)
    }

    /// The logical snapshot as of `version`, one entry per resolvable path
    pub fn files(&self, version: &Version) -> Result<EffectiveFiles<'c>> {
        if self.chain.is_empty() {
            return Err(Error::Resolution(format!(
                "version {} belongs to an archive with no version chain",
                version.id
            )));
        }
        let upto = self.chain.position(version.id).ok_or_else(|| {
            Error::NotFound(format!("version {} is not in the chain", version.id))
        })?;
        let base = self.chain.at(0).ok_or_else(|| {
            Error::Resolution("chain has no base version".to_string())
        })?;

        Ok(EffectiveFiles {
            chain: self.chain,
            upto,
            stage: 0,
            base_paths: HashSet::new(),
            walker: ExactFiles::new(base),
        })
    }

    /// Materialize a version into a destination directory
    ///
    /// `exact` exports only the files the version physically stores;
    /// otherwise the full effective view is written out. Returns the
    /// number of files exported.
    pub fn export(&self, version: &Version, destination: &Path, exact: bool) -> Result<usize> {
        fs::create_dir_all(destination)?;
        let mut exported = 0;

        if exact {
            for entry in self.exact_files(version) {
                let entry = entry?;
                copy_with_parents(&entry.stored, &destination.join(&entry.relative))?;
                exported += 1;
            }
        } else {
            for entry in self.files(version)? {
                let entry = entry?;
                copy_with_parents(&entry.stored, &destination.join(&entry.relative))?;
                exported += 1;
            }
        }

        tracing::info!(
            exported,
            version = %version.id,
            exact,
            destination = %destination.display(),
            "exported version"
        );
        Ok(exported)
    }
}

/// Lazy listing of the files a version physically stores
pub struct ExactFiles {
    root: PathBuf,
    walker: walkdir::IntoIter,
}

impl ExactFiles {
    fn new(version: &Version) -> Self {
        Self {
            root: version.dir().to_path_buf(),
            walker: walkdir::WalkDir::new(version.dir()).min_depth(1).into_iter(),
        }
    }
}

impl Iterator for ExactFiles {
    type Item = Result<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(walk_error(err))),
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match relative_to(&self.root, entry.path()) {
                Ok(relative) => relative,
                Err(err) => return Some(Err(err)),
            };
            return Some(Ok(FileEntry {
                relative,
                stored: entry.path().to_path_buf(),
            }));
        }
    }
}

/// Lazy effective view, two passes over the chain
///
/// Pass one walks the base directory: every path that existed at archive
/// inception is resolved to its owner in [base, query]. The base stores
/// all of them, so a fallback owner always exists. Pass two walks each
/// version after the base up to the query version; a path not present in
/// the base is yielded only while walking the version that owns it as of
/// the query, so each later-introduced path appears exactly once.
pub struct EffectiveFiles<'c> {
    chain: &'c VersionChain,
    /// Chain position of the query version
    upto: usize,
    /// Position of the version currently being walked
    stage: usize,
    /// Relative paths seen during the base pass
    base_paths: HashSet<PathBuf>,
    walker: ExactFiles,
}

impl Iterator for EffectiveFiles<'_> {
    type Item = Result<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walker.next() {
                Some(Err(err)) => return Some(Err(err)),
                Some(Ok(entry)) => {
                    if self.stage == 0 {
                        self.base_paths.insert(entry.relative.clone());
                        let stored = match effective_owner(self.chain, self.upto, &entry.relative)
                        {
                            Some(owner) => owner.dir().join(&entry.relative),
                            // The base copy we just walked past is itself the owner
                            // if every later copy vanished under us.
                            None => entry.stored.clone(),
                        };
                        return Some(Ok(FileEntry {
                            relative: entry.relative,
                            stored,
                        }));
                    }

                    // Later pass: paths introduced after the base
                    if self.base_paths.contains(&entry.relative) {
                        continue;
                    }
                    let owns = effective_owner(self.chain, self.upto, &entry.relative)
                        .and_then(|owner| self.chain.position(owner.id))
                        == Some(self.stage);
                    if owns {
                        return Some(Ok(entry));
                    }
                }
                None => {
                    self.stage += 1;
                    if self.stage > self.upto {
                        return None;
                    }
                    let version = self.chain.at(self.stage)?;
                    self.walker = ExactFiles::new(version);
                }
            }
        }
    }
}
