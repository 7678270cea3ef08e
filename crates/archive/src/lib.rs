//! Strata Archive - incremental, deduplicating backup engine
//!
//! An archive pairs one source directory with one storage directory and a
//! retention policy. Each snapshot becomes a version in an ordered chain;
//! only files that changed since their last appearance are physically
//! stored. The chain can be resolved into a full logical view at any
//! version and compacted forward under the retention policy.
//!
//! Storage layout per archive:
//! ```text
//! <archive_dir>/
//!   meta/
//!     archive.json     # archive-level config
//!     versions.json    # ordered version records
//!   archive/
//!     <version-uuid>/  # files physically stored by that version
//!   tmp/               # scratch space for atomic metadata replace
//! ```

pub mod archive;
pub mod compact;
pub mod meta;
pub mod registry;
pub mod resolve;
pub mod snapshot;
pub mod version;

pub use archive::Archive;
pub use compact::{CollapseReport, CompactionEngine, MigrationReport};
pub use meta::{ArchiveConfig, VersionRecord};
pub use registry::{ArchiveRecord, Registry};
pub use resolve::{FileEntry, SnapshotResolver};
pub use snapshot::SnapshotWriter;
pub use version::{Version, VersionChain};

pub use strata_core::{Algorithm, Error, Result};
