//! Segment index reader
//!
//! Read-only view of the segment index table. Queries take a compiled
//! predicate and return either byte-range locators (for retrieval) or full
//! records (for availability listings).

use crate::index::schema::{self, text_value};
use crate::index::{IndexRecord, SegmentLocator};
use crate::query::{Predicate, QueryResult, SqlValue};
use crate::storage::types::{from_epoch_seconds, parse_time};
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, Row};
use std::path::{Path, PathBuf};

const RECORD_COLUMNS: &str = "network, station, location, channel, quality, version, \
     starttime, endtime, samplerate, filename, byteoffset, bytes, hash, timeindex, \
     timespans, timerates, format, filemodtime, updated, scanned";

/// Read-only segment index
pub struct SegmentIndex {
    conn: Connection,
    table: String,
    path: Option<PathBuf>,
}

impl SegmentIndex {
    /// Open the index database read-only
    ///
    /// Fails when the table name is not a plain identifier or the table is
    /// missing.
    pub fn open(path: impl AsRef<Path>, table: &str) -> QueryResult<Self> {
        let path = path.as_ref();
        let conn = schema::open_read_only(path)?;
        let mut index = Self::from_connection(conn, table)?;
        index.path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), table, "Opened segment index");
        Ok(index)
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection, table: &str) -> QueryResult<Self> {
        schema::require_table(&conn, table)?;
        Ok(Self {
            conn,
            table: table.to_string(),
            path: None,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Database file, if opened from one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn select_sql(&self, columns: &str, predicate: &Predicate) -> (String, Vec<SqlValue>) {
        let (clause, params) = predicate.to_sql();
        let sql = if clause.is_empty() {
            format!("SELECT {} FROM {}", columns, self.table)
        } else {
            format!("SELECT {} FROM {} WHERE {}", columns, self.table, clause)
        };
        tracing::debug!(sql = %sql, predicate = %predicate, "Index query");
        (sql, params)
    }

    /// Byte ranges of the records matching `predicate`
    pub fn locators(&self, predicate: &Predicate) -> QueryResult<Vec<SegmentLocator>> {
        let (sql, params) = self.select_sql("byteoffset, bytes, filename", predicate);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok(SegmentLocator {
                byte_offset: unsigned(row, 0)?,
                byte_length: unsigned(row, 1)?,
                path: PathBuf::from(row.get::<_, String>(2)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Full records matching `predicate`, ordered by code and start time
    pub fn records(&self, predicate: &Predicate) -> QueryResult<Vec<IndexRecord>> {
        let (sql, params) = self.select_sql(RECORD_COLUMNS, predicate);
        let sql = format!("{} ORDER BY network, station, location, channel, starttime", sql);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of rows in the index
    pub fn count(&self) -> QueryResult<u64> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })?;
        Ok(n.max(0) as u64)
    }
}

fn unsigned(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let v: i64 = row.get(idx)?;
    u64::try_from(v).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, v))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value = row.get_ref(idx)?;
    let parsed = match value {
        ValueRef::Text(t) => parse_time(&String::from_utf8_lossy(t)),
        ValueRef::Real(r) => from_epoch_seconds(r),
        ValueRef::Integer(i) => from_epoch_seconds(i as f64),
        _ => None,
    };
    parsed.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            value.data_type(),
            format!("column {} is not a timestamp", idx).into(),
        )
    })
}

fn text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(text_value(row.get_ref(idx)?))
}

fn code_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(text_column(row, idx)?.unwrap_or_default())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<IndexRecord> {
    let version = match row.get_ref(5)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i),
        other => text_value(other).and_then(|s| s.trim().parse().ok()),
    };
    let samplerate = match row.get_ref(8)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(r) => Some(r),
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                8,
                "samplerate".to_string(),
                other.data_type(),
            ))
        }
    };

    Ok(IndexRecord {
        network: code_column(row, 0)?,
        station: code_column(row, 1)?,
        location: code_column(row, 2)?,
        channel: code_column(row, 3)?,
        quality: text_column(row, 4)?,
        version,
        starttime: time_column(row, 6)?,
        endtime: time_column(row, 7)?,
        samplerate,
        locator: SegmentLocator {
            path: PathBuf::from(row.get::<_, String>(9)?),
            byte_offset: unsigned(row, 10)?,
            byte_length: unsigned(row, 11)?,
        },
        hash: text_column(row, 12)?,
        timeindex: text_column(row, 13)?,
        timespans: text_column(row, 14)?,
        timerates: text_column(row, 15)?,
        format: text_column(row, 16)?,
        filemodtime: text_column(row, 17)?,
        updated: text_column(row, 18)?,
        scanned: text_column(row, 19)?,
    })
}
