//! Waveform storage layer
//!
//! Everything between an index locator and a `Stream`:
//!
//! - **types**: time windows, channel ids, traces and streams
//! - **mseed**: miniSEED 2 record codec (Steim-1/2, integer and float data)
//! - **decoder**: the `SegmentDecoder` seam and byte-range reads
//! - **inventory**: StationXML channel responses
//! - **writer**: stream output as miniSEED or JSON
//! - **error**: error types
//!
//! # Read path
//!
//! ```text
//! SegmentLocator → read_segment (seek + read_exact) → SegmentDecoder → [Trace] → Stream::merge
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use seisarchive::index::SegmentLocator;
//! use seisarchive::storage::{parse_time, read_segment, MseedDecoder, SegmentDecoder, TimeWindow};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let locator = SegmentLocator {
//!         path: "/archive/2023/060/UW.RCM..HHZ.2023.060".into(),
//!         byte_offset: 4096,
//!         byte_length: 8192,
//!     };
//!     let window = TimeWindow::try_new(
//!         parse_time("2023-03-01T00:00:00").unwrap(),
//!         parse_time("2023-03-01T00:10:00").unwrap(),
//!     )
//!     .unwrap();
//!
//!     let bytes = read_segment(&locator)?;
//!     let traces = MseedDecoder.decode(&bytes, &window)?;
//!     println!("{} traces", traces.len());
//!     Ok(())
//! }
//! ```

pub mod decoder;
pub mod error;
pub mod inventory;
pub mod mseed;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use decoder::{read_segment, MseedDecoder, SegmentDecoder};
pub use error::{StorageError, StorageResult};
pub use inventory::{ChannelResponse, Inventory};
pub use types::{parse_time, Nslc, Samples, Stream, TimeWindow, Trace};
pub use writer::{write_stream, OutputFormat};
