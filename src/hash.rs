//! Content hashing for build-step inputs
//!
//! Every variable-length field is written with a fixed-width length prefix
//! (little-endian `u64`), so adjacent fields can never run into each other:
//! `"ab" + "c"` and `"a" + "bc"` hash differently. Directory contents are
//! hashed in sorted relative-path order, never in filesystem order.

use crate::error::{DockenvError, DockenvResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Number of hex characters shown for abbreviated digests.
const SHORT_LEN: usize = 12;

/// Length of a hex-encoded SHA-256 digest.
const HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Wrap an already computed hex digest (e.g. a key read from disk)
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Accept only a full lowercase hex SHA-256 digest
    pub fn parse(hex: &str) -> Option<Self> {
        let valid = hex.len() == HEX_LEN
            && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines and tables
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(SHORT_LEN)
            .map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental hasher with length-framed writes.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a variable-length byte field, prefixed with its length
    pub fn frame(&mut self, bytes: &[u8]) {
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
    }

    pub fn frame_str(&mut self, value: &str) {
        self.frame(value.as_bytes());
    }

    /// Write a fixed-width count
    pub fn count(&mut self, n: u64) {
        self.inner.update(n.to_le_bytes());
    }

    /// Write an argument vector: element count, then each framed element
    pub fn args(&mut self, args: &[String]) {
        self.count(args.len() as u64);
        for arg in args {
            self.frame_str(arg);
        }
    }

    pub fn digest(&mut self, digest: &Digest) {
        self.frame_str(digest.as_str());
    }

    /// Write the content digest of a file or directory.
    ///
    /// A file contributes `H(bytes) ‖ len`; a directory contributes
    /// `H(Σ frame(relpath) ‖ content(file)) ‖ file_count`. Symlinks are
    /// followed; a symlink cycle is reported as an error.
    pub fn path(&mut self, path: &Path) -> DockenvResult<()> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DockenvError::PathNotFound(path.to_path_buf()),
            _ => DockenvError::io(format!("reading metadata of {}", path.display()), e),
        })?;

        if metadata.is_dir() {
            self.frame(b"dir");
            let (digest, count) = hash_dir(path)?;
            self.inner.update(digest);
            self.count(count);
        } else {
            self.frame(b"file");
            self.file(path)?;
        }
        Ok(())
    }

    fn file(&mut self, path: &Path) -> DockenvResult<()> {
        let (digest, len) = hash_file(path)?;
        self.inner.update(digest);
        self.count(len);
        Ok(())
    }

    pub fn finish(self) -> Digest {
        Digest(hex::encode(self.inner.finalize()))
    }
}

fn hash_file(path: &Path) -> DockenvResult<([u8; 32], u64)> {
    let mut file = fs::File::open(path)
        .map_err(|e| DockenvError::io(format!("opening {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    let len = std::io::copy(&mut file, &mut hasher)
        .map_err(|e| DockenvError::io(format!("reading {}", path.display()), e))?;
    Ok((to_array(hasher.finalize().as_slice()), len))
}

fn to_array(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    out
}

fn hash_dir(root: &Path) -> DockenvResult<([u8; 32], u64)> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| DockenvError::Hash {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relpath = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| DockenvError::Internal(e.to_string()))?
            .to_string_lossy()
            .into_owned();
        files.push((relpath, entry.into_path()));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut sub = ContentHasher::new();
    for (relpath, path) in &files {
        sub.frame_str(relpath);
        sub.file(path)?;
    }
    Ok((to_array(sub.inner.finalize().as_slice()), files.len() as u64))
}
