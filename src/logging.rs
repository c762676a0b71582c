use tracing_subscriber::EnvFilter;

/// Install the stderr `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `info` for the library and the
/// `jsonl-index` binary. Safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("corpus_indexer=info,jsonl_index=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
