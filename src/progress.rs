//! Ingest progress reporting.
//!
//! Reports which archive is being indexed and how many are left. Progress is
//! emitted on **stderr** so the stdout summary stays parseable for scripts.

use std::io::Write;

use serde::Serialize;

/// A single progress event for an ingest run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Listing archives under a root (no total yet).
    Discovering { root: String },
    /// Starting archive `n` of `total` (1-based).
    #[serde(rename = "indexing")]
    Archive {
        #[serde(rename = "archive")]
        address: String,
        n: u64,
        total: u64,
    },
    /// Archive finished with `documents` submitted.
    ArchiveDone {
        #[serde(rename = "archive")]
        address: String,
        documents: u64,
    },
}

pub trait ProgressReporter {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress: `[ 2/14] gs://corpora/go_0002.jsonl.gz`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        write_stderr(&human_line(&event));
    }
}

/// One JSON object per line, tagged with `"event": "progress"`.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        if let Some(line) = json_line(&event) {
            write_stderr(&line);
        }
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn human_line(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Discovering { root } => format!("listing archives under {}", root),
        ProgressEvent::Archive { address, n, total } => {
            let width = total.to_string().len();
            format!("[{:>width$}/{}] {}", n, total, address, width = width)
        }
        ProgressEvent::ArchiveDone { address, documents } => {
            format!("      {} documents from {}", format_number(*documents), address)
        }
    }
}

fn json_line(event: &ProgressEvent) -> Option<String> {
    let mut value = serde_json::to_value(event).ok()?;
    value
        .as_object_mut()?
        .insert("event".to_string(), "progress".into());
    serde_json::to_string(&value).ok()
}

fn write_stderr(line: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
    let _ = stderr.flush();
}

/// `1234567` → `1,234,567`.
pub(crate) fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Progress mode for the CLI.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a terminal, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
