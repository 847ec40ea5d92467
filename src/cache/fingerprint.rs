//! File-set fingerprints used to validate provider set cache entries.
//!
//! Two strengths are offered:
//!
//! - [`content_fingerprint`] hashes every file's bytes with SHA-256. A changed
//!   byte always changes the fingerprint.
//! - [`MetadataFingerprint`] only records size and modification time. It is
//!   much cheaper but reports a false match when a file is rewritten with the
//!   same size within the filesystem's timestamp resolution.
//!
//! Both are independent of the order the files are given in. A file that
//! cannot be read contributes a fixed marker instead of failing, so a file that
//! disappears changes the fingerprint rather than producing an error.
//!
//! A loader that already holds the bytes it parsed builds the fingerprint with
//! [`FingerprintBuilder`], so the fingerprint describes exactly the content
//! the declarations came from and not whatever is on disk later.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const MISSING_MARKER: &[u8] = b"<missing>";

type FileStat = (u64, Option<SystemTime>);

fn stat(metadata: &Metadata) -> FileStat {
    (metadata.len(), metadata.modified().ok())
}

fn sorted(files: &[PathBuf]) -> Vec<&Path> {
    let mut paths: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
    paths.sort();
    paths.dedup();
    paths
}

/// SHA-256 over the sorted file set, in the form `sha256:<hex>`.
pub fn content_fingerprint(files: &[PathBuf]) -> String {
    FileSetFingerprint::compute(files).content
}

/// Size and modification time of each file in a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFingerprint(Vec<(PathBuf, Option<FileStat>)>);

impl MetadataFingerprint {
    /// Stat every file in the set.
    pub fn compute(files: &[PathBuf]) -> Self {
        Self(
            sorted(files)
                .into_iter()
                .map(|path| (path.to_path_buf(), fs::metadata(path).ok().as_ref().map(stat)))
                .collect(),
        )
    }
}

/// Both fingerprints of a file set, taken at the same moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSetFingerprint {
    /// `sha256:<hex>` over file contents
    pub content: String,
    /// Size and mtime per file
    pub metadata: MetadataFingerprint,
}

impl FileSetFingerprint {
    /// Fingerprint a file set by reading it from disk.
    pub fn compute(files: &[PathBuf]) -> Self {
        let mut builder = FingerprintBuilder::new();
        for path in sorted(files) {
            let metadata = fs::metadata(path).ok();
            match fs::read(path) {
                Ok(content) => builder.add(path, metadata.as_ref(), &content),
                Err(_) => builder.add_missing(path),
            }
        }
        builder.finish()
    }
}

#[derive(Debug)]
struct FileState {
    digest: Option<Vec<u8>>,
    stat: Option<FileStat>,
}

/// Builds a [`FileSetFingerprint`] from file contents already in memory.
///
/// The metadata passed with each file should be taken before its bytes were
/// read: a write that lands in between then shows up as a metadata change on
/// the next fast lookup instead of going unnoticed.
#[derive(Debug, Default)]
pub struct FingerprintBuilder {
    files: BTreeMap<PathBuf, FileState>,
}

impl FingerprintBuilder {
    /// Start an empty file set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the bytes of `path`.
    pub fn add(&mut self, path: impl Into<PathBuf>, metadata: Option<&Metadata>, content: &[u8]) {
        self.files.insert(
            path.into(),
            FileState {
                digest: Some(Sha256::digest(content).to_vec()),
                stat: metadata.map(stat),
            },
        );
    }

    /// Record a file that could not be read.
    pub fn add_missing(&mut self, path: impl Into<PathBuf>) {
        self.files.insert(
            path.into(),
            FileState {
                digest: None,
                stat: None,
            },
        );
    }

    /// Hash the recorded set.
    pub fn finish(self) -> FileSetFingerprint {
        let mut hasher = Sha256::new();
        let mut metadata = Vec::with_capacity(self.files.len());
        for (path, state) in self.files {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            match &state.digest {
                Some(digest) => hasher.update(digest),
                None => hasher.update(MISSING_MARKER),
            }
            hasher.update([0u8]);
            metadata.push((path, state.stat));
        }
        FileSetFingerprint {
            content: format!("sha256:{}", hex::encode(hasher.finalize())),
            metadata: MetadataFingerprint(metadata),
        }
    }
}
