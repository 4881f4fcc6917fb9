//! Segment index access
//!
//! The segment index is a relational table mapping channel codes and a time
//! span to a byte range inside a segment file:
//!
//! ```text
//! network station location channel quality version
//! starttime endtime samplerate filename byteoffset bytes
//! hash timeindex timespans timerates format filemodtime updated scanned
//! ```
//!
//! - **schema**: identifier validation and table introspection
//! - **segment_index**: read-only queries returning locators or full records
//!
//! # Query flow
//!
//! ```text
//! Filters ──compile──▶ Predicate ──SELECT byteoffset, bytes, filename──▶ [SegmentLocator]
//!                                                                         │
//!                                              open, seek, read_exact ◀───┘
//! ```

pub mod schema;
mod segment_index;

pub use segment_index::SegmentIndex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default name of the segment index table
pub const DEFAULT_INDEX_TABLE: &str = "tsindex";

/// Where the bytes of one index record live
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentLocator {
    pub path: PathBuf,
    pub byte_offset: u64,
    pub byte_length: u64,
}

impl std::fmt::Display for SegmentLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}+{}",
            self.path.display(),
            self.byte_offset,
            self.byte_length
        )
    }
}

/// One row of the segment index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub quality: Option<String>,
    pub version: Option<i64>,
    pub starttime: DateTime<Utc>,
    pub endtime: DateTime<Utc>,
    pub samplerate: Option<f64>,
    pub locator: SegmentLocator,
    pub hash: Option<String>,
    pub timeindex: Option<String>,
    pub timespans: Option<String>,
    pub timerates: Option<String>,
    pub format: Option<String>,
    pub filemodtime: Option<String>,
    pub updated: Option<String>,
    pub scanned: Option<String>,
}

impl IndexRecord {
    /// "N.S.L.C" code of the record
    pub fn nslc(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}
