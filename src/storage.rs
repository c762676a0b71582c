//! Backend dispatch for archive discovery and opening.
//!
//! [`Storage`] owns one [`FsStorage`] and, created on first use, one
//! [`GcsStorage`]. Every operation picks the backend from the address tag,
//! so a run over local archives never touches the network or needs
//! credentials.

use std::sync::OnceLock;

use tracing::debug;

use crate::config::{Config, GcsConfig};
use crate::error::{IngestError, Result};
use crate::locator::{ArchiveAddress, ArchiveRoot};
use crate::storage_fs::FsStorage;
use crate::storage_gcs::GcsStorage;
use crate::traits::{ArchiveStream, StorageBackend};

pub struct Storage {
    fs: FsStorage,
    gcs: OnceLock<GcsStorage>,
    gcs_config: GcsConfig,
}

impl Storage {
    pub fn new(config: &Config) -> Self {
        Self {
            fs: FsStorage::new(config.storage.follow_symlinks),
            gcs: OnceLock::new(),
            gcs_config: config.gcs.clone(),
        }
    }

    fn gcs(&self) -> anyhow::Result<&GcsStorage> {
        if let Some(gcs) = self.gcs.get() {
            return Ok(gcs);
        }
        let gcs = GcsStorage::connect(&self.gcs_config)?;
        Ok(self.gcs.get_or_init(|| gcs))
    }

    /// List every archive under `root` whose name ends with `suffix`.
    pub fn enumerate(&self, root: &ArchiveRoot, suffix: &str) -> Result<Vec<ArchiveAddress>> {
        let backend: &dyn StorageBackend = match root {
            ArchiveRoot::Local(_) => &self.fs,
            ArchiveRoot::Remote { .. } => {
                self.gcs().map_err(|e| IngestError::enumeration(root, e))?
            }
        };
        let addresses = backend.list(root, suffix)?;
        debug!(
            root = %root,
            backend = backend.kind(),
            count = addresses.len(),
            "enumerated archives"
        );
        Ok(addresses)
    }

    /// Open the raw (still compressed) stream of one archive.
    pub fn open(&self, address: &ArchiveAddress) -> Result<ArchiveStream> {
        let backend: &dyn StorageBackend = match address {
            ArchiveAddress::Local(_) => &self.fs,
            ArchiveAddress::Remote { .. } => {
                self.gcs().map_err(|e| IngestError::open(address, e))?
            }
        };
        debug!(archive = %address, backend = backend.kind(), "opening archive");
        backend.open(address)
    }
}
