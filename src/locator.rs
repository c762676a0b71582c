//! Storage locator: classify a path string as local or GCS.
//!
//! ```text
//! data/python_corpus.jsonl.gz          -> Local("data/python_corpus.jsonl.gz")
//! gs://corpora/v2/go_0001.jsonl.gz     -> Remote { bucket: "corpora", key: "v2/go_0001.jsonl.gz" }
//! gs://corpora                         -> root only: Remote { bucket: "corpora", prefix: "" }
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::error::{IngestError, Result};

/// URL scheme that selects the Google Cloud Storage backend.
pub const GCS_SCHEME: &str = "gs://";

/// Address of a single compressed archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArchiveAddress {
    Local(PathBuf),
    Remote { bucket: String, key: String },
}

/// Root location to enumerate archives under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArchiveRoot {
    Local(PathBuf),
    Remote { bucket: String, prefix: String },
}

/// Classify `path` as the address of one archive.
///
/// A `gs://` address must name both a bucket and an object key.
pub fn classify(path: &str) -> Result<ArchiveAddress> {
    let Some(rest) = path.strip_prefix(GCS_SCHEME) else {
        return Ok(ArchiveAddress::Local(PathBuf::from(path)));
    };

    let Some((bucket, key)) = rest.split_once('/') else {
        return Err(invalid(path, "expected 'gs://bucket/object'"));
    };
    if bucket.is_empty() {
        return Err(invalid(path, "bucket name is empty"));
    }
    if key.is_empty() {
        return Err(invalid(path, "object key is empty"));
    }

    Ok(ArchiveAddress::Remote {
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

/// Classify `path` as an enumeration root.
///
/// Unlike [`classify`], `gs://bucket` is accepted and lists the whole bucket.
pub fn classify_root(path: &str) -> Result<ArchiveRoot> {
    let Some(rest) = path.strip_prefix(GCS_SCHEME) else {
        return Ok(ArchiveRoot::Local(PathBuf::from(path)));
    };

    let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(invalid(path, "bucket name is empty"));
    }

    Ok(ArchiveRoot::Remote {
        bucket: bucket.to_string(),
        prefix: prefix.to_string(),
    })
}

fn invalid(path: &str, reason: &'static str) -> IngestError {
    IngestError::InvalidAddressFormat {
        address: path.to_string(),
        reason,
    }
}

impl ArchiveAddress {
    /// Final path segment of the address, ignoring trailing slashes.
    pub fn file_name(&self) -> String {
        let full = self.to_string();
        let trimmed = full.trim_end_matches(['/', std::path::MAIN_SEPARATOR]);
        trimmed
            .rsplit(['/', std::path::MAIN_SEPARATOR])
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

impl fmt::Display for ArchiveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveAddress::Local(path) => write!(f, "{}", path.display()),
            ArchiveAddress::Remote { bucket, key } => write!(f, "{}{}/{}", GCS_SCHEME, bucket, key),
        }
    }
}

impl fmt::Display for ArchiveRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveRoot::Local(path) => write!(f, "{}", path.display()),
            ArchiveRoot::Remote { bucket, prefix } => {
                write!(f, "{}{}/{}", GCS_SCHEME, bucket, prefix)
            }
        }
    }
}
