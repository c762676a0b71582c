//! Streaming record decoder.
//!
//! Archives hold a sequence of self-delimiting JSON objects, usually one per
//! line. [`RecordStream`] pulls them one at a time from a buffered reader, so
//! memory stays bounded by the largest single record rather than the archive.

use std::io::Read;

use serde_json::de::IoRead;
use serde_json::{Deserializer, StreamDeserializer};

use crate::error::{IngestError, Result};
use crate::locator::ArchiveAddress;
use crate::models::Record;

/// Lazy, non-restartable sequence of records decoded from one archive.
///
/// Ends with `None` at a clean end of input. After the first `Err` the
/// iterator is exhausted.
pub struct RecordStream<R: Read> {
    inner: StreamDeserializer<'static, IoRead<R>, Record>,
    address: String,
    decoded: u64,
    done: bool,
}

impl<R: Read> RecordStream<R> {
    pub fn new(address: &ArchiveAddress, reader: R) -> Self {
        Self {
            inner: Deserializer::from_reader(reader).into_iter::<Record>(),
            address: address.to_string(),
            decoded: 0,
            done: false,
        }
    }

    /// Number of records yielded so far.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(record)) => {
                self.decoded += 1;
                Some(Ok(record))
            }
            Some(Err(source)) => {
                self.done = true;
                Some(Err(IngestError::DecodeFailed {
                    address: self.address.clone(),
                    record: self.decoded + 1,
                    source,
                }))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for RecordStream<R> {}

/// Decode every record of `reader`.
pub fn decode<R: Read>(address: &ArchiveAddress, reader: R) -> RecordStream<R> {
    RecordStream::new(address, reader)
}
