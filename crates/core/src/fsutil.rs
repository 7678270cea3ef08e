//! Filesystem helpers shared by the archive engine

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Atomic replace-on-write
///
/// Writes data to a uniquely named temporary file inside `tmp_dir`, fsyncs
/// it, then renames it over the target path. A subsequent load never
/// observes a half-written record.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    fs::create_dir_all(tmp_dir)?;

    let temp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());

    let mut temp_file = fs::File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    // Rename is atomic on POSIX systems
    fs::rename(&temp_path, target)?;

    // Fsync parent directory for durability
    if let Some(parent) = target.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Compute a path's position relative to a traversal root
///
/// The root must be a prefix of the path; anything else means a traversal
/// handed us an entry from outside the tree it was asked to walk.
pub fn relative_to(root: &Path, path: &Path) -> Result<PathBuf> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| {
            Error::Resolution(format!(
                "{} is not under {}",
                path.display(),
                root.display()
            ))
        })
}

/// Copy a file, creating the destination's parent directories first
pub fn copy_with_parents(source: &Path, destination: &Path) -> Result<u64> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::copy(source, destination)?)
}
