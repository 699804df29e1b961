//! Content digests and file comparison.
//!
//! Files are streamed through a fixed buffer, so file size is unbounded.
//! Both supported algorithms produce 256-bit digests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::error::EngineError;
use crate::log::{EventLog, LogCategory};

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 32;

const BUFFER_SIZE: usize = 64 * 1024;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// SHA-256 (cryptographic, 256-bit)
    #[default]
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown digest algorithm '{0}' (expected sha256 or blake3)")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for ChecksumAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            _ => Err(UnknownAlgorithm(s.to_string())),
        }
    }
}

/// A computed 256-bit digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: ChecksumAlgorithm,
    bytes: [u8; DIGEST_LEN],
}

impl Digest {
    pub fn new(algorithm: ChecksumAlgorithm, bytes: [u8; DIGEST_LEN]) -> Self {
        Digest { algorithm, bytes }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.bytes
    }

    /// Lowercase hex representation
    pub fn hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex())
    }
}

/// Incremental hasher
pub trait ChecksumHasher {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize and return the digest
    fn finalize(self: Box<Self>) -> Digest;
}

struct Sha256Hasher {
    hasher: sha2::Sha256,
}

impl ChecksumHasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        use sha2::Digest as _;
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> Digest {
        use sha2::Digest as _;
        let out = self.hasher.finalize();
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&out);
        Digest::new(ChecksumAlgorithm::Sha256, bytes)
    }
}

struct Blake3Hasher {
    hasher: blake3::Hasher,
}

impl ChecksumHasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> Digest {
        Digest::new(ChecksumAlgorithm::Blake3, *self.hasher.finalize().as_bytes())
    }
}

/// Create a new hasher for the given algorithm
pub fn create_hasher(algorithm: ChecksumAlgorithm) -> Box<dyn ChecksumHasher> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => Box::new(Sha256Hasher {
            hasher: <sha2::Sha256 as sha2::Digest>::new(),
        }),
        ChecksumAlgorithm::Blake3 => Box::new(Blake3Hasher {
            hasher: blake3::Hasher::new(),
        }),
    }
}

/// Compute the digest of a file.
///
/// The file handle is released before returning.
pub fn digest(path: &Path, algorithm: ChecksumAlgorithm) -> Result<Digest, EngineError> {
    let read_error = |source: io::Error| EngineError::ReadError {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_error)?;
    let mut hasher = create_hasher(algorithm);
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e)),
        }
    }

    Ok(hasher.finalize())
}

/// Digest both files and compare them.
///
/// Errors propagate; see [`content_equals`] for the fail-soft variant.
pub fn compare_files(
    a: &Path,
    b: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<bool, EngineError> {
    let first = digest(a, algorithm)?;
    let second = digest(b, algorithm)?;
    Ok(first == second)
}

/// True if both files have identical content.
///
/// A read failure on either file yields `false` and is reported to `log`.
pub fn content_equals(
    a: &Path,
    b: &Path,
    algorithm: ChecksumAlgorithm,
    log: &EventLog<'_>,
) -> bool {
    match compare_files(a, b, algorithm) {
        Ok(equal) => equal,
        Err(e) => {
            log.emit(
                LogCategory::HashCompare,
                format!("of \"{}\" and \"{}\": {}", a.display(), b.display(), e),
            );
            false
        }
    }
}
