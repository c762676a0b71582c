//! Archive reader: raw backend stream → validated gzip → decompressed bytes.

use std::io::{BufReader, Chain, Cursor, Read};

use flate2::read::MultiGzDecoder;

use crate::error::{IngestError, Result};
use crate::locator::ArchiveAddress;
use crate::storage::Storage;
use crate::traits::ArchiveStream;

/// Fixed part of a gzip member header (RFC 1952 §2.3).
const GZIP_HEADER_LEN: usize = 10;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_DEFLATE: u8 = 0x08;

/// Decompressed, buffered view of one archive.
///
/// Owns the backend stream; dropping it closes the file or connection.
pub type DecodedStream = BufReader<MultiGzDecoder<Chain<Cursor<Vec<u8>>, ArchiveStream>>>;

/// Open `address` through `storage` and wrap it in a gzip decoder.
pub fn open_archive(storage: &Storage, address: &ArchiveAddress) -> Result<DecodedStream> {
    let raw = storage.open(address)?;
    decompress(address, raw)
}

/// Validate the gzip header of `raw` and return the decompressed stream.
///
/// Concatenated gzip members are read as one stream.
pub fn decompress(address: &ArchiveAddress, mut raw: ArchiveStream) -> Result<DecodedStream> {
    let header = read_header(&mut raw).map_err(|e| IngestError::DecompressionInitFailed {
        address: address.to_string(),
        reason: e.to_string(),
    })?;

    if let Err(reason) = check_header(&header) {
        return Err(IngestError::DecompressionInitFailed {
            address: address.to_string(),
            reason,
        });
    }

    let stream = Cursor::new(header).chain(raw);
    Ok(BufReader::new(MultiGzDecoder::new(stream)))
}

/// Read up to [`GZIP_HEADER_LEN`] bytes, stopping early only at end of input.
fn read_header(raw: &mut ArchiveStream) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(GZIP_HEADER_LEN);
    raw.by_ref()
        .take(GZIP_HEADER_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}

fn check_header(header: &[u8]) -> std::result::Result<(), String> {
    if header.is_empty() {
        return Err("archive is empty".to_string());
    }
    if header.len() < GZIP_HEADER_LEN {
        return Err(format!("truncated gzip header ({} bytes)", header.len()));
    }
    if header[..2] != GZIP_MAGIC {
        return Err(format!(
            "invalid gzip magic {:02x}{:02x}",
            header[0], header[1]
        ));
    }
    if header[2] != GZIP_DEFLATE {
        return Err(format!("unsupported compression method {}", header[2]));
    }
    Ok(())
}
