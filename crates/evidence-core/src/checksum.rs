//! Checksum utility
//!
//! Streams file content through SHA-256 (the engine's canonical digest) or
//! BLAKE3 (accepted for collector provenance). Digests are lowercase hex,
//! optionally prefixed with an algorithm tag (`sha256:...`).

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{EvidenceError, Result};

const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 of a file, lowercase hex
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut hasher = Sha256::new();
    stream_file(path, |chunk| hasher.update(chunk))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// BLAKE3 of a file, lowercase hex
pub fn blake3_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut hasher = blake3::Hasher::new();
    stream_file(path, |chunk| {
        hasher.update(chunk);
    })?;
    Ok(hasher.finalize().to_hex().to_string())
}

pub fn sha256_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn stream_file(path: &Path, mut sink: impl FnMut(&[u8])) -> Result<()> {
    let mut file = File::open(path).map_err(|e| open_error(path, e))?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| EvidenceError::io("read", path, e))?;
        if n == 0 {
            return Ok(());
        }
        sink(&buf[..n]);
    }
}

fn open_error(path: &Path, err: std::io::Error) -> EvidenceError {
    if err.kind() == std::io::ErrorKind::NotFound {
        EvidenceError::not_found("file", path)
    } else {
        EvidenceError::io("open", path, err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Blake3,
}

impl ChecksumAlgorithm {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    pub fn digest_file(self, path: impl AsRef<Path>) -> Result<String> {
        match self {
            Self::Sha256 => sha256_file(path),
            Self::Blake3 => blake3_file(path),
        }
    }
}

/// A digest together with the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedChecksum {
    pub algorithm: ChecksumAlgorithm,
    pub digest: String,
}

impl TaggedChecksum {
    /// Parse `sha256:<hex>`, `blake3:<hex>`, or a bare hex digest (taken as SHA-256).
    ///
    /// Returns `None` for empty input, unknown tags, or non-hex digests.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let (algorithm, digest) = match raw.split_once(':') {
            Some((tag, digest)) => {
                let algorithm = match tag.to_ascii_lowercase().as_str() {
                    "sha256" | "sha-256" => ChecksumAlgorithm::Sha256,
                    "blake3" => ChecksumAlgorithm::Blake3,
                    _ => return None,
                };
                (algorithm, digest)
            }
            None => (ChecksumAlgorithm::Sha256, raw),
        };
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self {
            algorithm,
            digest: digest.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for TaggedChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.tag(), self.digest)
    }
}

/// Result of comparing a recorded digest against the file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumVerdict {
    Verified,
    Mismatch { expected: String, actual: String },
    /// Nothing usable was recorded, so nothing was proven.
    Unverified,
}

impl ChecksumVerdict {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Recompute a file's digest and compare it with what was recorded.
pub fn verify_file(path: impl AsRef<Path>, recorded: &str) -> Result<ChecksumVerdict> {
    let path = path.as_ref();
    let Some(expected) = TaggedChecksum::parse(recorded) else {
        debug!(path = %path.display(), "no usable checksum recorded");
        return Ok(ChecksumVerdict::Unverified);
    };
    let actual = expected.algorithm.digest_file(path)?;
    if actual == expected.digest {
        Ok(ChecksumVerdict::Verified)
    } else {
        Ok(ChecksumVerdict::Mismatch {
            expected: expected.digest,
            actual,
        })
    }
}
