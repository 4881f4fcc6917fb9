//! Event catalog and phase pick queries
//!
//! Both tables have a flat schema that is discovered on first use and cached
//! for the lifetime of the client. Filters go through the shared predicate
//! compiler with a per-table field table:
//!
//! | key                          | column      | operator |
//! |------------------------------|-------------|----------|
//! | `mintime` / `maxtime`        | `timestamp` | `>=` / `<=` (epoch seconds) |
//! | `min*` / `max*` (lat, lon, depth, magnitude) | same name | `>=` / `<=` |
//! | `contributor`, `source_id`, `event_type` | same name | `=` |
//!
//! Picks use the channel codes, `evaluation_mode`, `source_id` (all with
//! `*`/`?`), `phase` (upper-cased) and the time bounds. Unknown keys are
//! skipped with a warning for the catalog and rejected for picks.

use crate::client::table::{Cell, Table};
use crate::index::schema;
use crate::query::{FilterSchema, Filters, QueryError, QueryResult};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

/// Default catalog table name
pub const DEFAULT_CATALOG_TABLE: &str = "catalog";

/// Prefix of the per-contributor pick tables
pub const PICK_TABLE_PREFIX: &str = "picks_";

/// One queryable table with a cached column list
struct TableQuery {
    conn: Connection,
    table: String,
    filters: FilterSchema,
    columns: Option<Vec<String>>,
}

impl TableQuery {
    fn new(conn: Connection, table: String, filters: FilterSchema) -> Self {
        Self {
            conn,
            table,
            filters,
            columns: None,
        }
    }

    fn ensure_schema_loaded(&mut self) -> QueryResult<&[String]> {
        if self.columns.is_none() {
            let columns = schema::table_columns(&self.conn, &self.table)?;
            tracing::debug!(table = %self.table, columns = columns.len(), "Loaded table schema");
            self.columns = Some(columns);
        }
        Ok(self.columns.as_deref().unwrap_or_default())
    }

    fn query(&mut self, columns: &[String], filters: &Filters) -> QueryResult<Table> {
        let predicate = self.filters.compile(filters, Vec::new())?;

        let known = self.ensure_schema_loaded()?.to_vec();
        let selected: Vec<String> = if columns.is_empty() {
            known
        } else {
            for column in columns {
                schema::validate_identifier(column)?;
                if !known.iter().any(|k| k == column) {
                    return Err(QueryError::InvalidIdentifier(format!(
                        "{} is not a column of {}",
                        column, self.table
                    )));
                }
            }
            columns.to_vec()
        };

        let (clause, params) = predicate.to_sql();
        let mut sql = format!("SELECT {} FROM {}", selected.join(", "), self.table);
        if !clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        tracing::debug!(sql = %sql, predicate = %predicate, "Table query");

        let mut stmt = self.conn.prepare(&sql)?;
        let width = selected.len();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(Cell::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(table = %self.table, rows = rows.len(), "Query finished");
        Ok(Table {
            columns: selected,
            rows,
        })
    }
}

/// Event catalog client
///
/// Owns one connection and is `Send` but not `Sync`; use one client per
/// thread or wrap it in a `Mutex`.
pub struct QuakeClient {
    inner: TableQuery,
}

impl QuakeClient {
    /// Open the catalog database read-only
    pub fn open(path: impl AsRef<Path>, table: &str) -> QueryResult<Self> {
        Self::from_connection(schema::open_read_only(path.as_ref())?, table)
    }

    pub fn from_connection(conn: Connection, table: &str) -> QueryResult<Self> {
        schema::require_table(&conn, table)?;
        Ok(Self {
            inner: TableQuery::new(conn, table.to_string(), FilterSchema::catalog()),
        })
    }

    pub fn table(&self) -> &str {
        &self.inner.table
    }

    /// Column names, loaded on first call
    pub fn columns(&mut self) -> QueryResult<&[String]> {
        self.inner.ensure_schema_loaded()
    }

    /// Select `columns` (all when empty) of the events matching `filters`
    pub fn query(&mut self, columns: &[String], filters: &Filters) -> QueryResult<Table> {
        self.inner.query(columns, filters)
    }
}

/// Phase pick client bound to one contributor
///
/// Like `QuakeClient`, one connection per client, `Send` but not `Sync`.
pub struct PickClient {
    inner: TableQuery,
    contributor: String,
}

impl PickClient {
    /// Open the pick tables read-only
    ///
    /// Fails with `UnsupportedContributor` when `picks_<contributor>` does
    /// not exist.
    pub fn open(path: impl AsRef<Path>, contributor: &str) -> QueryResult<Self> {
        Self::from_connection(schema::open_read_only(path.as_ref())?, contributor)
    }

    pub fn from_connection(conn: Connection, contributor: &str) -> QueryResult<Self> {
        let table = format!("{}{}", PICK_TABLE_PREFIX, contributor.to_lowercase());
        let unsupported = || QueryError::UnsupportedContributor(contributor.to_lowercase());

        if schema::validate_identifier(&table).is_err() || !schema::table_exists(&conn, &table)? {
            return Err(unsupported());
        }

        Ok(Self {
            inner: TableQuery::new(conn, table, FilterSchema::picks()),
            contributor: contributor.to_string(),
        })
    }

    pub fn contributor(&self) -> &str {
        &self.contributor
    }

    pub fn table(&self) -> &str {
        &self.inner.table
    }

    /// Contributors that have a pick table, upper-cased
    pub fn available_contributors(&self) -> QueryResult<Vec<String>> {
        Ok(schema::tables_with_prefix(&self.inner.conn, PICK_TABLE_PREFIX)?
            .into_iter()
            .map(|t| t[PICK_TABLE_PREFIX.len()..].to_uppercase())
            .collect())
    }

    pub fn columns(&mut self) -> QueryResult<&[String]> {
        self.inner.ensure_schema_loaded()
    }

    /// Select `columns` (all when empty) of the picks matching `filters`
    pub fn query(&mut self, columns: &[String], filters: &Filters) -> QueryResult<Table> {
        self.inner.query(columns, filters)
    }
}
