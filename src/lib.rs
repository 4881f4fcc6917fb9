//! # seisarchive
//!
//! Read access to an indexed seismic waveform archive and to the event and
//! phase pick catalogs stored next to it.
//!
//! ## Features
//!
//! - **Segment index**: SQLite `tsindex` tables locate byte ranges of miniSEED files
//! - **Filter compilation**: `*`/`?` wildcards and comma lists become bound SQL predicates
//! - **Waveform retrieval**: decode, trim and merge segments into continuous traces
//! - **Bulk requests**: per-request failures are isolated and reported
//! - **Catalogs**: event and per-contributor pick tables with schema discovery
//!
//! ## Modules
//!
//! - [`query`]: Filter to predicate compiler
//! - [`index`]: Segment index access
//! - [`storage`]: Traces, miniSEED codec, StationXML inventory, file output
//! - [`client`]: Waveform, catalog and pick clients
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seisarchive::client::{WaveformClient, WaveformRequest};
//! use seisarchive::storage::parse_time;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WaveformClient::open("/archive/timeseries.sqlite", "tsindex")?;
//!
//!     let request = WaveformRequest::new(
//!         "UW",
//!         "RCM",
//!         "*",
//!         "HHZ",
//!         parse_time("2023-03-01T00:00:00").unwrap(),
//!         parse_time("2023-03-01T00:10:00").unwrap(),
//!     )
//!     .filename("rcm.mseed");
//!
//!     let response = client.get_waveforms(&request)?;
//!     println!(
//!         "{} traces, {} failed records",
//!         response.stream.len(),
//!         response.failed_records.len()
//!     );
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod index;
pub mod query;
pub mod storage;

#[cfg(test)]
mod testutil;

// Re-export top-level types for convenience
pub use client::{
    BulkItem, BulkResponse, DecodeFailurePolicy, PickClient, QuakeClient, Table, WaveformClient,
    WaveformRequest, WaveformResponse,
};

pub use index::{IndexRecord, SegmentIndex, SegmentLocator};

pub use query::{FilterSchema, Filters, Predicate, QueryError, QueryResult};

pub use storage::{Inventory, Stream, StorageError, StorageResult, TimeWindow, Trace};

pub use config::{Config, ConfigError};
