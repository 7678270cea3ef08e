//! Strata Core - Digest primitives and filesystem helpers
//!
//! This crate provides the foundational layer shared by the archive engine:
//! - File digests over a closed set of algorithms
//! - Byte-equality comparison of files via digests
//! - Atomic replace-on-write for metadata records
//! - Relative-path handling for mirrored directory trees

pub mod digest;
pub mod error;
pub mod fsutil;

// Re-export main types for convenience
pub use digest::{digest_file, same_content, Algorithm, Digest};
pub use error::{Error, Result};
pub use fsutil::atomic_write;
