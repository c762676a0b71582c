use std::fs::File;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{IngestError, Result};
use crate::locator::{ArchiveAddress, ArchiveRoot};
use crate::traits::{ArchiveStream, StorageBackend};

/// Local filesystem backend.
#[derive(Debug, Clone, Default)]
pub struct FsStorage {
    follow_symlinks: bool,
}

impl FsStorage {
    pub fn new(follow_symlinks: bool) -> Self {
        Self { follow_symlinks }
    }
}

impl StorageBackend for FsStorage {
    fn kind(&self) -> &'static str {
        "fs"
    }

    fn open(&self, address: &ArchiveAddress) -> Result<ArchiveStream> {
        let ArchiveAddress::Local(path) = address else {
            return Err(IngestError::open(address, anyhow::anyhow!("not a local path")));
        };
        let file = File::open(path).map_err(|e| IngestError::open(address, e))?;
        Ok(Box::new(file))
    }

    fn list(&self, root: &ArchiveRoot, suffix: &str) -> Result<Vec<ArchiveAddress>> {
        let ArchiveRoot::Local(dir) = root else {
            return Err(IngestError::enumeration(
                root,
                anyhow::anyhow!("not a local directory"),
            ));
        };
        scan_directory(dir, suffix, self.follow_symlinks)
            .map_err(|e| IngestError::enumeration(root, e))
    }
}

fn scan_directory(
    root: &Path,
    suffix: &str,
    follow_symlinks: bool,
) -> anyhow::Result<Vec<ArchiveAddress>> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        // Suffix is matched against the file name only, byte-for-byte.
        if !entry.file_name().to_string_lossy().ends_with(suffix) {
            continue;
        }
        paths.push(entry.into_path());
    }

    // Sort for reproducible logs
    paths.sort();

    Ok(paths.into_iter().map(ArchiveAddress::Local).collect())
}
