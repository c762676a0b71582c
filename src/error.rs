//! Error kinds surfaced by the ingestion pipeline.
//!
//! Every variant carries the address (or root) it concerns so that a failed
//! run can be traced back to the offending archive. All of them are fatal:
//! the driver never retries and never skips.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// A `gs://` string that cannot be split into bucket and key.
    #[error("invalid storage address '{address}': {reason}")]
    InvalidAddressFormat { address: String, reason: &'static str },

    /// The backend could not provide a byte stream for the address.
    #[error("failed to open {address}")]
    OpenFailed {
        address: String,
        #[source]
        source: anyhow::Error,
    },

    /// The stream does not start with a gzip member header.
    #[error("failed to initialize gzip decoder for {address}: {reason}")]
    DecompressionInitFailed { address: String, reason: String },

    /// Malformed JSON, wrong field types, or a corrupt compressed body.
    #[error("failed to decode record #{record} of {address}")]
    DecodeFailed {
        address: String,
        record: u64,
        #[source]
        source: serde_json::Error,
    },

    /// Directory walk or bucket listing failed part-way.
    #[error("failed to enumerate archives under {root}")]
    EnumerationFailed {
        root: String,
        #[source]
        source: anyhow::Error,
    },

    /// The index builder rejected a document.
    #[error("index builder rejected record #{record} of {address}")]
    Submit {
        address: String,
        record: u64,
        #[source]
        source: anyhow::Error,
    },

    /// The index builder failed to finalize.
    #[error("failed to finalize index")]
    Finish {
        #[source]
        source: anyhow::Error,
    },
}

impl IngestError {
    pub(crate) fn open(address: impl ToString, source: impl Into<anyhow::Error>) -> Self {
        IngestError::OpenFailed {
            address: address.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn enumeration(root: impl ToString, source: impl Into<anyhow::Error>) -> Self {
        IngestError::EnumerationFailed {
            root: root.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
