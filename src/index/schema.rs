//! Schema helpers
//!
//! Table and column names cannot be bound as parameters, so every name that
//! reaches SQL text is validated here first.

use crate::query::{QueryError, QueryResult};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;

/// Open a database read-only
pub fn open_read_only(path: &Path) -> QueryResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

/// Check that `name` is a plain identifier: `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(name: &str) -> QueryResult<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(QueryError::InvalidIdentifier(name.to_string()))
    }
}

pub fn table_exists(conn: &Connection, table: &str) -> QueryResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Validate `table` and fail when it does not exist
pub fn require_table(conn: &Connection, table: &str) -> QueryResult<()> {
    validate_identifier(table)?;
    if table_exists(conn, table)? {
        Ok(())
    } else {
        Err(QueryError::MissingTable(table.to_string()))
    }
}

/// Table names starting with `prefix`, sorted
pub fn tables_with_prefix(conn: &Connection, prefix: &str) -> QueryResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.into_iter().filter(|n| n.starts_with(prefix)).collect())
}

/// Column names of `table` in declaration order
pub fn table_columns(conn: &Connection, table: &str) -> QueryResult<Vec<String>> {
    validate_identifier(table)?;
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err(QueryError::MissingTable(table.to_string()));
    }
    Ok(columns)
}

/// Any column value as text, `None` for NULL
pub fn text_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(r) => Some(r.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}
