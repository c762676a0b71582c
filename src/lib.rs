//! # Corpus Indexer
//!
//! Streams gzip-compressed JSONL source-code corpora from local disk or
//! Google Cloud Storage into a full-text search index.
//!
//! Each archive holds a sequence of JSON objects
//! `{"content": ..., "repository": ..., "file_path": ...}`. Every object
//! becomes one document named `repository/file_path`, tagged with the
//! language encoded in the archive's file name (`python_0001.jsonl.gz` →
//! `python`).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │ Locator  │──▶│  Storage    │──▶│ Archive  │──▶│ Decoder  │──▶│   Ingestor   │
//! │ path/gs: │   │  FS / GCS   │   │  gzip    │   │  JSONL   │   │ name + lang  │
//! └──────────┘   └─────────────┘   └──────────┘   └──────────┘   └──────┬───────┘
//!                                                                        ▼
//!                                                                ┌──────────────┐
//!                                                                │ IndexBuilder │
//!                                                                └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`locator`] | Classify local paths and `gs://` addresses |
//! | [`storage`] | Backend dispatch for enumeration and opening |
//! | [`storage_fs`] | Local filesystem backend |
//! | [`storage_gcs`] | Google Cloud Storage backend |
//! | [`archive`] | Gzip validation and decompression |
//! | [`decode`] | Streaming JSON record decoder |
//! | [`ingest`] | Run orchestration, naming and language tagging |
//! | [`traits`] | `StorageBackend` and `IndexBuilder` seams |
//! | [`index_sqlite`] | SQLite FTS5 index builder |
//! | [`config`] | TOML configuration |
//! | [`error`] | Error kinds |
//! | [`models`] | `Record` and `Document` |
//! | [`progress`] | Progress reporting on stderr |
//! | [`logging`] | `tracing` subscriber setup |

pub mod archive;
pub mod config;
pub mod decode;
pub mod error;
pub mod index_sqlite;
pub mod ingest;
pub mod locator;
pub mod logging;
pub mod models;
pub mod progress;
pub mod storage;
pub mod storage_fs;
pub mod storage_gcs;
pub mod traits;
