//! File digests over a closed set of algorithms
//!
//! The archive engine never inspects digest values; it only compares them
//! for equality to decide whether two files hold the same bytes. The
//! algorithm an archive uses is fixed at creation time and dispatched
//! through [`Algorithm`] rather than by name lookup at each call site.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use digest::Digest as _;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::error::{Error, Result};

/// Read buffer for streaming file digests
const CHUNK_SIZE: usize = 8192;

/// Supported digest algorithms
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Crc32,
    Blake3,
}

impl Algorithm {
    /// Every supported algorithm, in display order
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Sha512,
        Algorithm::Crc32,
        Algorithm::Blake3,
    ];

    /// Canonical lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
            Algorithm::Crc32 => "crc32",
            Algorithm::Blake3 => "blake3",
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            "sha512" => Ok(Algorithm::Sha512),
            "crc32" => Ok(Algorithm::Crc32),
            "blake3" => Ok(Algorithm::Blake3),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An opaque digest value
///
/// Width depends on the algorithm (4 bytes for CRC32, up to 64 for
/// SHA-512). Values are only meaningful for equality comparison against
/// digests produced by the same algorithm.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest(Box<[u8]>);

impl Digest {
    /// Get the digest as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the digest of a file, streaming chunk by chunk
pub fn digest_file(path: &Path, algorithm: Algorithm) -> Result<Digest> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let bytes = match algorithm {
        Algorithm::Md5 => hash_reader::<Md5>(&mut reader)?,
        Algorithm::Sha1 => hash_reader::<Sha1>(&mut reader)?,
        Algorithm::Sha256 => hash_reader::<Sha256>(&mut reader)?,
        Algorithm::Sha512 => hash_reader::<Sha512>(&mut reader)?,
        Algorithm::Crc32 => crc32_reader(&mut reader)?,
        Algorithm::Blake3 => blake3_reader(&mut reader)?,
    };

    Ok(Digest(bytes.into_boxed_slice()))
}

/// Compare two files for byte-equality by digest
pub fn same_content(a: &Path, b: &Path, algorithm: Algorithm) -> Result<bool> {
    Ok(digest_file(a, algorithm)? == digest_file(b, algorithm)?)
}

fn hash_reader<D: digest::Digest>(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut hasher = D::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize().to_vec())
}

fn crc32_reader(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize().to_be_bytes().to_vec())
}

fn blake3_reader(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize().as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest::Digest as _;
    use std::io::Write;

    fn write_temp(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_algorithm_parse_roundtrip() {
        for algorithm in Algorithm::ALL {
            let parsed: Algorithm = algorithm.name().parse().unwrap();
            assert_eq!(parsed, algorithm);
        }
    }

    #[test]
    fn test_algorithm_parse_case_insensitive() {
        assert_eq!("SHA256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
        assert_eq!("Md5".parse::<Algorithm>().unwrap(), Algorithm::Md5);
    }

    #[test]
    fn test_algorithm_parse_unsupported() {
        let err = "whirlpool".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(name) if name == "whirlpool"));
    }

    #[test]
    fn test_digest_consistency() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = write_temp(temp_dir.path(), "a.txt", b"hello world");

        for algorithm in Algorithm::ALL {
            let first = digest_file(&path, algorithm)?;
            let second = digest_file(&path, algorithm)?;
            assert_eq!(first, second, "{} digest not stable", algorithm);
        }
        Ok(())
    }

    #[test]
    fn test_digest_widths() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = write_temp(temp_dir.path(), "a.txt", b"abc");

        assert_eq!(digest_file(&path, Algorithm::Md5)?.as_bytes().len(), 16);
        assert_eq!(digest_file(&path, Algorithm::Sha1)?.as_bytes().len(), 20);
        assert_eq!(digest_file(&path, Algorithm::Sha256)?.as_bytes().len(), 32);
        assert_eq!(digest_file(&path, Algorithm::Sha512)?.as_bytes().len(), 64);
        assert_eq!(digest_file(&path, Algorithm::Crc32)?.as_bytes().len(), 4);
        assert_eq!(digest_file(&path, Algorithm::Blake3)?.as_bytes().len(), 32);
        Ok(())
    }

    #[test]
    fn test_hex_is_lowercase() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = write_temp(temp_dir.path(), "a.txt", b"deadbeef");

        let hex = digest_file(&path, Algorithm::Sha256)?.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        Ok(())
    }

    #[test]
    fn test_same_content_equal_files() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let a = write_temp(temp_dir.path(), "a.txt", b"identical bytes");
        let b = write_temp(temp_dir.path(), "b.txt", b"identical bytes");

        for algorithm in Algorithm::ALL {
            assert!(same_content(&a, &b, algorithm)?);
        }
        Ok(())
    }

    #[test]
    fn test_same_content_different_files() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let a = write_temp(temp_dir.path(), "a.txt", b"one content");
        let b = write_temp(temp_dir.path(), "b.txt", b"another content");

        for algorithm in Algorithm::ALL {
            assert!(!same_content(&a, &b, algorithm)?);
        }
        Ok(())
    }

    #[test]
    fn test_digest_large_file_streams() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("large.bin");

        // Several chunks worth of data so the read loop actually iterates
        let mut file = std::fs::File::create(&path)?;
        let chunk = vec![0xAB; CHUNK_SIZE];
        for _ in 0..5 {
            file.write_all(&chunk)?;
        }
        drop(file);

        let streamed = digest_file(&path, Algorithm::Sha256)?;
        let direct = {
            let mut hasher = Sha256::new();
            hasher.update(std::fs::read(&path)?);
            hasher.finalize().to_vec()
        };
        assert_eq!(streamed.as_bytes(), direct.as_slice());
        Ok(())
    }

    #[test]
    fn test_digest_missing_file() {
        let result = digest_file(Path::new("/nonexistent/missing.txt"), Algorithm::Sha1);
        assert!(matches!(result, Err(Error::SnapshotIo(_))));
    }
}
