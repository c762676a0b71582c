//! Core data models that flow through the ingestion pipeline.
//!
//! A [`Record`] is one JSON object decoded from an archive; a [`Document`] is
//! what the index builder receives for it.

use serde::{Deserialize, Deserializer};

/// One source file as stored in a JSONL archive.
///
/// Missing fields and explicit `null`s decode as empty strings; unknown
/// fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repository: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub file_path: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A document submission handed to an [`IndexBuilder`](crate::traits::IndexBuilder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// `repository/file_path`; `/` when both are empty.
    pub name: String,
    /// Language tag derived from the archive name, shared by every record in it.
    pub language: String,
    /// Raw file content, byte-for-byte as it appeared in the record.
    pub content: Vec<u8>,
}

impl Document {
    pub fn from_record(record: Record, language: &str) -> Self {
        Document {
            name: document_name(&record),
            language: language.to_string(),
            content: record.content.into_bytes(),
        }
    }
}

/// Deterministic document name for a record.
pub fn document_name(record: &Record) -> String {
    format!("{}/{}", record.repository, record.file_path)
}
