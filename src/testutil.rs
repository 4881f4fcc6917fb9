//! Fixtures shared by unit tests: a throwaway segment archive and catalog.

use crate::index::{SegmentIndex, SegmentLocator, DEFAULT_INDEX_TABLE};
use crate::storage::mseed;
use crate::storage::types::{format_index_time, Nslc, Samples, Trace};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) const TSINDEX_SCHEMA: &str = "CREATE TABLE tsindex (
    network TEXT, station TEXT, location TEXT, channel TEXT,
    quality TEXT, version INTEGER, starttime TEXT, endtime TEXT,
    samplerate REAL, filename TEXT, byteoffset INTEGER, bytes INTEGER,
    hash TEXT, timeindex TEXT, timespans TEXT, timerates TEXT,
    format TEXT, filemodtime TEXT, updated TEXT, scanned TEXT
)";

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()
}

/// `UW.<station>..HHZ`, 10 Hz, samples `0..n`
pub(crate) fn test_trace(station: &str, start: DateTime<Utc>, n: i32) -> Trace {
    Trace::new(
        Nslc::new("UW", station, "", "HHZ"),
        start,
        10.0,
        Samples::Int((0..n).collect()),
    )
}

/// Segment files plus an index database in a temporary directory
pub(crate) struct Archive {
    dir: TempDir,
    conn: Connection,
}

impl Archive {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("index.sqlite")).unwrap();
        conn.execute_batch(TSINDEX_SCHEMA).unwrap();
        Self { dir, conn }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("index.sqlite")
    }

    pub fn index(&self) -> SegmentIndex {
        SegmentIndex::open(self.db_path(), DEFAULT_INDEX_TABLE).unwrap()
    }

    /// Append raw bytes to `file` and index them under the trace's id and span
    pub fn add_bytes(&self, file: &str, trace: &Trace, bytes: &[u8]) -> SegmentLocator {
        let path = self.dir.path().join(file);
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        let offset = out.metadata().unwrap().len();
        out.write_all(bytes).unwrap();

        self.conn
            .execute(
                "INSERT INTO tsindex (network, station, location, channel, quality, version,
                    starttime, endtime, samplerate, filename, byteoffset, bytes, format)
                 VALUES (?, ?, ?, ?, 'D', 1, ?, ?, ?, ?, ?, ?, 'mseed')",
                params![
                    trace.id.network,
                    trace.id.station,
                    trace.id.location,
                    trace.id.channel,
                    format_index_time(trace.start),
                    format_index_time(trace.end()),
                    trace.sample_rate,
                    path.to_string_lossy(),
                    offset as i64,
                    bytes.len() as i64,
                ],
            )
            .unwrap();

        SegmentLocator {
            path,
            byte_offset: offset,
            byte_length: bytes.len() as u64,
        }
    }

    /// Write the trace as miniSEED to `file` and index it
    pub fn add_trace(&self, file: &str, trace: &Trace) -> SegmentLocator {
        let bytes = mseed::encode_trace(trace, 512, 1).unwrap();
        self.add_bytes(file, trace, &bytes)
    }
}

pub(crate) const CATALOG_SCHEMA: &str = "
CREATE TABLE catalog (
    evid INTEGER, timestamp REAL, latitude REAL, longitude REAL,
    depth REAL, magnitude REAL, magnitude_type TEXT, event_type TEXT,
    contributor TEXT, source_id TEXT
);
INSERT INTO catalog VALUES (1, 1677628800.0, 46.85, -121.76, 5.0, 2.1, 'l', 'eq', 'UW', 'uw61901'),
                           (2, 1677672000.0, 47.60, -122.33, 22.0, 3.4, 'l', 'eq', 'UW', 'uw61902'),
                           (3, 1677715200.0, 45.37, -121.69, 1.5, 1.0, 'd', 'px', 'CC', 'cc1001');
CREATE TABLE picks_uw (
    source_id TEXT, timestamp REAL, network TEXT, station TEXT, location TEXT,
    channel TEXT, phase TEXT, evaluation_mode TEXT
);
INSERT INTO picks_uw VALUES ('uw61901', 1677628802.5, 'UW', 'RCM', '', 'HHZ', 'P', 'manual'),
                            ('uw61901', 1677628805.1, 'UW', 'RCM', '', 'HHN', 'S', 'manual'),
                            ('uw61902', 1677672004.0, 'UW', 'JCW', '', 'EHZ', 'P', 'automatic');
CREATE TABLE picks_cc (source_id TEXT, timestamp REAL, phase TEXT);
";

/// Catalog database with a few events and picks
pub(crate) fn catalog_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(CATALOG_SCHEMA).unwrap();
    (dir, path)
}
