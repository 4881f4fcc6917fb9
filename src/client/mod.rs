//! Archive clients
//!
//! - **waveform**: `WaveformClient` for retrieval, bulk retrieval and availability
//! - **catalog**: `QuakeClient` and `PickClient` for the event and pick tables
//! - **table**: tabular results with CSV and JSON output
//! - **outcome**: results of the best-effort post-processing steps
//!
//! # Example
//!
//! ```rust,no_run
//! use seisarchive::client::{WaveformClient, WaveformRequest};
//! use seisarchive::storage::parse_time;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WaveformClient::open("/archive/timeseries.sqlite", "tsindex")?;
//!     let request = WaveformRequest::new(
//!         "UW",
//!         "MBW*,JCW",
//!         "*",
//!         "?HZ",
//!         parse_time("2023-03-01T00:00:00").unwrap(),
//!         parse_time("2023-03-01T01:00:00").unwrap(),
//!     );
//!
//!     let response = client.get_waveforms(&request)?;
//!     for trace in response.stream.iter() {
//!         println!("{} {} samples", trace.id, trace.len());
//!     }
//!     Ok(())
//! }
//! ```

mod catalog;
mod outcome;
mod table;
mod waveform;

pub use catalog::{PickClient, QuakeClient, DEFAULT_CATALOG_TABLE, PICK_TABLE_PREFIX};
pub use outcome::{OutcomeStatus, PostProcessOutcome, PostProcessStep};
pub use table::{Cell, Table};
pub use waveform::{
    BulkFailure, BulkItem, BulkResponse, DecodeFailurePolicy, InventorySource, RecordFailure,
    WaveformClient, WaveformRequest, WaveformResponse,
};
