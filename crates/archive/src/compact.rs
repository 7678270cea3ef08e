//! Chain compaction: migration and retention enforcement
//!
//! Single-step migration folds the base version forward into its
//! successor: every file only the base stores is moved (not copied) into
//! the successor, the base flag transfers, and the old base is removed.
//! Each file move is an atomic rename; a crash mid-migration can leave a
//! file present in both directories (safe, the old base is simply not
//! yet removable) but never in neither.

use std::fs;
use std::path::Path;

use strata_core::fsutil::relative_to;
use strata_core::{Error, Result};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::resolve::walk_error;
use crate::version::VersionChain;

/// Outcome of one single-step migration
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// The version that was consumed and removed
    pub removed: Uuid,
    /// The version that inherited the base flag
    pub new_base: Uuid,
    /// Files physically moved forward
    pub moved_files: usize,
}

/// Outcome of a full collapse
#[derive(Debug, Clone, Default)]
pub struct CollapseReport {
    pub steps: usize,
    pub moved_files: usize,
}

/// Enforces the retention policy over one archive's chain
pub struct CompactionEngine<'a> {
    chain: &'a mut VersionChain,
    archive_dir: &'a Path,
}

impl<'a> CompactionEngine<'a> {
    pub fn new(chain: &'a mut VersionChain, archive_dir: &'a Path) -> Self {
        Self { chain, archive_dir }
    }

    /// Merge the oldest (base) version forward into the next oldest
    ///
    /// Requires at least two versions; with only the base present there
    /// is nothing to migrate into and the call fails with `InvalidState`.
    pub fn migrate_oldest_to_base(&mut self) -> Result<MigrationReport> {
        if self.chain.len() < 2 {
            return Err(Error::InvalidState(
                "cannot migrate: nothing to migrate into".to_string(),
            ));
        }
        let base = self
            .chain
            .base()
            .cloned()
            .ok_or_else(|| Error::InvalidState("chain has no base version".to_string()))?;
        let next = self
            .chain
            .at(1)
            .cloned()
            .ok_or_else(|| Error::InvalidState("chain has no second version".to_string()))?;

        tracing::debug!(from = %base.id, to = %next.id, "migrating oldest version");

        let mut moved_files = 0;
        for entry in WalkDir::new(base.dir()).min_depth(1) {
            let entry = entry.map_err(walk_error)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_to(base.dir(), entry.path())?;
            let destination = next.dir().join(&relative);
            // A copy already in the successor supersedes the base's; the
            // stale base copy is dropped with the directory below.
            if destination.exists() {
                continue;
            }
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(entry.path(), &destination)?;
            moved_files += 1;
        }

        // Flag transfer and record removal land in one persisted write,
        // so no load in between can see two bases or none.
        self.chain
            .promote_and_remove(self.archive_dir, next.id, base.id)?;
        fs::remove_dir_all(base.dir())?;

        tracing::info!(
            moved_files,
            removed = %base.id,
            new_base = %next.id,
            "migrated oldest version into base"
        );
        Ok(MigrationReport {
            removed: base.id,
            new_base: next.id,
            moved_files,
        })
    }

    /// Repeat single-step migration until one version remains
    ///
    /// A chain already reduced to one version is left untouched.
    pub fn migrate_all_to_base(&mut self) -> Result<CollapseReport> {
        let mut report = CollapseReport::default();
        while self.chain.len() > 1 {
            let step = self.migrate_oldest_to_base()?;
            report.steps += 1;
            report.moved_files += step.moved_files;
        }
        Ok(report)
    }

    /// Migrate until the chain is strictly below `max_versions`, making
    /// room for one more snapshot. Callers handle the `max_versions == 1`
    /// policy separately; it replaces the base outright instead of
    /// migrating.
    pub fn enforce_retention(&mut self, max_versions: usize) -> Result<usize> {
        let mut steps = 0;
        while self.chain.len() >= max_versions {
            self.migrate_oldest_to_base()?;
            steps += 1;
        }
        if steps > 0 {
            tracing::info!(steps, max_versions, "retention enforced");
        }
        Ok(steps)
    }
}
