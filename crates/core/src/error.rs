//! Error taxonomy shared by the strata crates

use std::path::PathBuf;

/// Common result type used throughout strata
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure surfaced by the engine maps to one of these kinds, so a
/// caller can tell "nothing to do" from "operation unsafe" from
/// "environment broken" without parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Archive, version, or path absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Invariant violation detected when loading a version chain
    #[error("version chain corrupted: {0}")]
    ChainCorruption(String),

    /// Operation attempted against an invariant precondition
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Filesystem failure during copy/move/mkdir
    #[error("snapshot I/O failure: {0}")]
    SnapshotIo(#[from] std::io::Error),

    /// Requested digest algorithm is not in the supported set
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Logical-view resolution failed (broken archive)
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Persisted metadata record could not be decoded
    #[error("malformed metadata record at {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
