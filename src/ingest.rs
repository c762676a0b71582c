//! Ingestion pipeline orchestration.
//!
//! Coordinates the full run: locate → enumerate → open → decompress →
//! decode → submit. Everything happens on the calling thread, one archive and
//! one record at a time. The first error stops the run; documents already
//! submitted stay in the builder.

use tracing::{debug, info, warn};

use crate::archive::open_archive;
use crate::decode::decode;
use crate::error::{IngestError, Result};
use crate::locator::{classify, classify_root, ArchiveAddress};
use crate::models::Document;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::storage::Storage;
use crate::traits::IndexBuilder;

/// What to ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A single archive: a local path or `gs://bucket/key`.
    File(String),
    /// Every archive matching the suffix under a directory or `gs://` prefix.
    Dir(String),
}

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub archives: u64,
    pub documents: u64,
    pub bytes: u64,
}

/// Drives one ingest run into an [`IndexBuilder`].
pub struct Ingestor<'a, B: IndexBuilder> {
    storage: &'a Storage,
    builder: B,
    suffix: String,
    progress: Box<dyn ProgressReporter>,
}

impl<'a, B: IndexBuilder> Ingestor<'a, B> {
    /// `suffix` filters archive names in directory mode.
    pub fn new(storage: &'a Storage, builder: B, suffix: impl Into<String>) -> Self {
        Self {
            storage,
            builder,
            suffix: suffix.into(),
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Ingest `input`, then finalize the builder.
    ///
    /// `finish` runs exactly once whether or not ingestion succeeded. When
    /// both fail, the ingestion error wins and the finish error is logged.
    pub fn run(mut self, input: &Input) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        let outcome = self.ingest(input, &mut summary);
        let finished = self.builder.finish();

        match (outcome, finished) {
            (Ok(()), Ok(())) => Ok(summary),
            (Ok(()), Err(source)) => Err(IngestError::Finish { source }),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(finish_err)) => {
                warn!("index finalization also failed: {:#}", finish_err);
                Err(err)
            }
        }
    }

    fn ingest(&mut self, input: &Input, summary: &mut IngestSummary) -> Result<()> {
        match input {
            Input::File(path) => {
                let address = classify(path)?;
                info!("Indexing {}", address);
                self.progress.report(ProgressEvent::Archive {
                    address: address.to_string(),
                    n: 1,
                    total: 1,
                });
                self.index_archive(&address, summary)
            }
            Input::Dir(dir) => {
                let root = classify_root(dir)?;
                self.progress.report(ProgressEvent::Discovering {
                    root: root.to_string(),
                });
                let addresses = self.storage.enumerate(&root, &self.suffix)?;
                info!("Indexing {} files from dir {}", addresses.len(), dir);

                let total = addresses.len() as u64;
                for (i, address) in addresses.iter().enumerate() {
                    info!("Indexing {}", address);
                    self.progress.report(ProgressEvent::Archive {
                        address: address.to_string(),
                        n: i as u64 + 1,
                        total,
                    });
                    self.index_archive(address, summary)?;
                }
                Ok(())
            }
        }
    }

    /// Stream one archive into the builder. The archive stream is dropped on
    /// return, on success and on error alike.
    fn index_archive(
        &mut self,
        address: &ArchiveAddress,
        summary: &mut IngestSummary,
    ) -> Result<()> {
        let language = language_for(address, &self.suffix);
        let stream = open_archive(self.storage, address)?;
        let mut records = decode(address, stream);

        let mut documents = 0u64;
        while let Some(record) = records.next() {
            let record = record?;
            let bytes = record.content.len() as u64;
            let document = Document::from_record(record, &language);

            self.builder
                .add(document)
                .map_err(|source| IngestError::Submit {
                    address: address.to_string(),
                    record: records.decoded(),
                    source,
                })?;

            documents += 1;
            summary.documents += 1;
            summary.bytes += bytes;
        }

        summary.archives += 1;
        debug!(archive = %address, documents, language = %language, "archive indexed");
        self.progress.report(ProgressEvent::ArchiveDone {
            address: address.to_string(),
            documents,
        });
        Ok(())
    }
}

/// Language tag for every document of an archive.
///
/// Archives are named `<language>_<anything>.jsonl.gz`: the file name is cut at
/// the first `_` and lowercased. A name without `_` is used whole, minus the
/// archive `suffix` when it ends with it.
pub fn language_for(address: &ArchiveAddress, suffix: &str) -> String {
    let file_name = address.file_name();
    let tag = match file_name.split_once('_') {
        Some((head, _)) => head,
        None => file_name.strip_suffix(suffix).unwrap_or(&file_name),
    };
    tag.to_lowercase()
}
