//! Stream output
//!
//! Format is picked from the file extension: `.json` gets the serde
//! representation of the stream, everything else is written as miniSEED.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::mseed;
use crate::storage::types::Stream;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Record length used for written miniSEED
pub const OUTPUT_RECORD_LENGTH: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Mseed,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Mseed,
        }
    }
}

/// Write every trace of `stream` to `path`
///
/// Output goes to `<path>.part` first and is renamed into place once
/// complete, so a failure leaves any existing file at `path` untouched.
pub fn write_stream(stream: &Stream, path: &Path) -> StorageResult<OutputFormat> {
    let format = OutputFormat::from_path(path);
    let partial = partial_path(path);

    let written = write_to(stream, &partial, format)
        .and_then(|()| fs::rename(&partial, path).map_err(StorageError::from));
    if let Err(e) = written {
        if partial.exists() {
            if let Err(cleanup) = fs::remove_file(&partial) {
                tracing::warn!(
                    path = %partial.display(),
                    error = %cleanup,
                    "Failed to remove partial output"
                );
            }
        }
        return Err(e);
    }

    tracing::debug!(path = %path.display(), traces = stream.len(), ?format, "Wrote stream");
    Ok(format)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn write_to(stream: &Stream, path: &Path, format: OutputFormat) -> StorageResult<()> {
    let mut out = BufWriter::new(File::create(path)?);

    match format {
        OutputFormat::Json => serde_json::to_writer_pretty(&mut out, stream)?,
        OutputFormat::Mseed => {
            let mut sequence = 1u32;
            for trace in stream.iter() {
                let bytes = mseed::encode_trace(trace, OUTPUT_RECORD_LENGTH, sequence)?;
                sequence += (bytes.len() / OUTPUT_RECORD_LENGTH) as u32;
                out.write_all(&bytes)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
