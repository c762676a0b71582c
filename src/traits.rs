//! Extension seams of the pipeline.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │           Storage            │
//! │  ┌──────────┐ ┌───────────┐  │
//! │  │ FsStorage│ │ GcsStorage│  │   open() / list()
//! │  └──────────┘ └───────────┘  │
//! └──────────────┬───────────────┘
//!                ▼
//!        Ingestor (decode, name, tag)
//!                ▼
//!     ┌──────────────────────┐
//!     │     IndexBuilder     │   add() / finish()
//!     └──────────────────────┘
//! ```
//!
//! Each storage backend implements [`StorageBackend`] exactly once; the
//! [`Storage`](crate::storage::Storage) dispatcher picks one from the
//! address tag. [`IndexBuilder`] is the narrow contract of the search index
//! that receives documents.

use std::io::Read;

use crate::error::Result;
use crate::locator::{ArchiveAddress, ArchiveRoot};
use crate::models::Document;

/// Raw (still compressed) byte stream of one archive.
///
/// Dropping it releases the file handle or HTTP connection.
pub type ArchiveStream = Box<dyn Read + Send>;

/// A storage backend that can list and open archives.
pub trait StorageBackend {
    /// Short backend identifier used in logs (`"fs"`, `"gcs"`).
    fn kind(&self) -> &'static str;

    /// Open the raw byte stream of a single archive.
    fn open(&self, address: &ArchiveAddress) -> Result<ArchiveStream>;

    /// List every archive under `root` whose name ends with `suffix`.
    ///
    /// A failure part-way aborts the whole listing.
    fn list(&self, root: &ArchiveRoot, suffix: &str) -> Result<Vec<ArchiveAddress>>;
}

/// The search index builder documents are submitted to.
///
/// Calls arrive from a single thread, in decode order. [`finish`](Self::finish)
/// is called exactly once per run, after the last [`add`](Self::add), even
/// if an earlier step failed.
pub trait IndexBuilder {
    fn add(&mut self, document: Document) -> anyhow::Result<()>;

    fn finish(&mut self) -> anyhow::Result<()>;
}

impl<B: IndexBuilder + ?Sized> IndexBuilder for &mut B {
    fn add(&mut self, document: Document) -> anyhow::Result<()> {
        (**self).add(document)
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        (**self).finish()
    }
}

impl<B: IndexBuilder + ?Sized> IndexBuilder for Box<B> {
    fn add(&mut self, document: Document) -> anyhow::Result<()> {
        (**self).add(document)
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        (**self).finish()
    }
}

/// Builder that discards every document. Backs `--dry-run`; the run's
/// `IngestSummary` carries the counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBuilder;

impl IndexBuilder for NullBuilder {
    fn add(&mut self, _document: Document) -> anyhow::Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
