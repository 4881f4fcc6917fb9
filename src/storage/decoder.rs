//! Segment decoding
//!
//! A `SegmentDecoder` turns the bytes named by one index record into traces
//! restricted to the requested window. Retrieval reads each byte range with
//! `read_segment` and hands it to the decoder.

use crate::index::SegmentLocator;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::mseed;
use crate::storage::types::{TimeWindow, Trace};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// Decodes a byte buffer into traces within a window
pub trait SegmentDecoder {
    fn decode(&self, buf: &[u8], window: &TimeWindow) -> StorageResult<Vec<Trace>>;
}

impl<F> SegmentDecoder for F
where
    F: Fn(&[u8], &TimeWindow) -> StorageResult<Vec<Trace>>,
{
    fn decode(&self, buf: &[u8], window: &TimeWindow) -> StorageResult<Vec<Trace>> {
        self(buf, window)
    }
}

/// miniSEED 2 decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct MseedDecoder;

impl SegmentDecoder for MseedDecoder {
    fn decode(&self, buf: &[u8], window: &TimeWindow) -> StorageResult<Vec<Trace>> {
        let mut traces = mseed::decode_records(buf)?;
        for trace in &mut traces {
            trace.trim(window);
        }
        traces.retain(|t| !t.is_empty());
        Ok(traces)
    }
}

/// Read exactly the byte range a locator names
pub fn read_segment(locator: &SegmentLocator) -> StorageResult<Vec<u8>> {
    let mut file = File::open(&locator.path)?;
    file.seek(SeekFrom::Start(locator.byte_offset))?;

    let len = usize::try_from(locator.byte_length).map_err(|_| {
        StorageError::Corruption(format!("byte length {} too large", locator.byte_length))
    })?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
