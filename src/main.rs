//! # Corpus Indexer CLI (`jsonl-index`)
//!
//! Builds a full-text search index from gzip-compressed JSONL source-code
//! archives stored on local disk or in Google Cloud Storage.
//!
//! ## Usage
//!
//! ```bash
//! jsonl-index --index-dir <DIR> (--file <PATH> | --dir <PATH>) [--config <TOML>]
//! ```
//!
//! ## Examples
//!
//! ```bash
//! # Index a single local archive
//! jsonl-index --index-dir ./index --file data/python_0001.jsonl.gz
//!
//! # Index every archive under a directory
//! jsonl-index --index-dir ./index --dir data/
//!
//! # Index every archive under a GCS prefix
//! jsonl-index --index-dir ./index --dir gs://corpora/v2/
//!
//! # Count documents without writing an index
//! jsonl-index --index-dir ./index --dir data/ --dry-run
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use tracing::info;

use corpus_indexer::config::{self, Config};
use corpus_indexer::index_sqlite::SqliteIndexBuilder;
use corpus_indexer::ingest::{IngestSummary, Ingestor, Input};
use corpus_indexer::logging::init_logging;
use corpus_indexer::progress::ProgressMode;
use corpus_indexer::storage::Storage;
use corpus_indexer::traits::NullBuilder;

/// Index gzip-compressed JSONL source-code corpora for full-text search.
///
/// Each archive line is a JSON object with `content`, `repository` and
/// `file_path`. Documents are named `repository/file_path` and tagged with
/// the language prefix of the archive's file name.
#[derive(Parser)]
#[command(
    name = "jsonl-index",
    about = "Index gzip-compressed JSONL source-code corpora from disk or GCS",
    version,
    group(ArgGroup::new("input").required(true).multiple(false).args(["file", "dir"]))
)]
struct Cli {
    /// Optional configuration file (TOML). Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the index is written to.
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// A single archive: a local path or `gs://bucket/object`.
    #[arg(long)]
    file: Option<String>,

    /// A directory or `gs://bucket/prefix`; every archive ending in the
    /// suffix is indexed.
    #[arg(long)]
    dir: Option<String>,

    /// Archive suffix matched in `--dir` mode.
    #[arg(long)]
    suffix: Option<String>,

    /// Decode and count documents without writing an index.
    #[arg(long)]
    dry_run: bool,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, value_enum)]
    progress: Option<ProgressMode>,
}

impl Cli {
    fn input(&self) -> anyhow::Result<Input> {
        match (&self.file, &self.dir) {
            (Some(file), None) => Ok(Input::File(file.clone())),
            (None, Some(dir)) => Ok(Input::Dir(dir.clone())),
            _ => anyhow::bail!("exactly one of --file or --dir is required"),
        }
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config(path)?,
            None => Config::default(),
        };
        if let Some(dir) = &self.index_dir {
            cfg.index.dir = dir.clone();
        }
        if let Some(suffix) = &self.suffix {
            cfg.input.suffix = suffix.clone();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let cfg = cli.load_config()?;
    let input = cli.input()?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
    let storage = Storage::new(&cfg);

    if cli.dry_run {
        let summary = Ingestor::new(&storage, NullBuilder, &cfg.input.suffix)
            .with_progress(progress.reporter())
            .run(&input)?;
        print_summary(&format!("{} (dry-run)", cfg.index.dir.display()), &summary);
        return Ok(());
    }

    let builder = SqliteIndexBuilder::create(&cfg.index.dir, &cfg.index.name, cfg.index.batch_size)
        .with_context(|| format!("Failed to open index in {}", cfg.index.dir.display()))?;
    let index_path = builder.path().to_path_buf();

    let summary = Ingestor::new(&storage, builder, &cfg.input.suffix)
        .with_progress(progress.reporter())
        .run(&input)?;
    info!("Index written to {}", index_path.display());

    print_summary(&index_path.display().to_string(), &summary);
    Ok(())
}

fn print_summary(target: &str, summary: &IngestSummary) {
    println!("index {}", target);
    println!("  archives: {}", summary.archives);
    println!("  documents: {}", summary.documents);
    println!("  bytes: {}", summary.bytes);
    println!("ok");
}
