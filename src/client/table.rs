//! Tabular query results

use crate::storage::StorageResult;
use rusqlite::types::ValueRef;
use serde::Serialize;
use std::io::Write;

/// One value of a result row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<ValueRef<'_>> for Cell {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(r) => Cell::Real(r),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Cell::Text(String::from_utf8_lossy(t).into_owned())
            }
        }
    }
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(i) => Some(*i as f64),
            Cell::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{}", r),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Rows returned by a catalog or pick query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in column `name`
    pub fn get(&self, row: usize, name: &str) -> Option<&Cell> {
        let col = self.column_index(name)?;
        self.rows.get(row)?.get(col)
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|c| serde_json::to_value(c).unwrap_or_default()))
                    .collect()
            })
            .collect()
    }

    pub fn write_csv<W: Write>(&self, out: W) -> StorageResult<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|c| c.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_json<W: Write>(&self, out: W) -> StorageResult<()> {
        serde_json::to_writer_pretty(out, &self.to_records())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table {
            columns: vec!["evid".into(), "magnitude".into(), "event_type".into()],
            rows: vec![
                vec![Cell::Integer(1), Cell::Real(2.1), Cell::Text("eq".into())],
                vec![Cell::Integer(3), Cell::Null, Cell::Text("px, quarry".into())],
            ],
        }
    }

    #[test]
    fn test_lookup() {
        let t = table();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(0, "magnitude").and_then(Cell::as_f64), Some(2.1));
        assert_eq!(t.get(1, "event_type").and_then(Cell::as_str), Some("px, quarry"));
        assert!(t.get(0, "depth").is_none());
    }

    #[test]
    fn test_csv_quotes_fields() {
        let mut out = Vec::new();
        table().write_csv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "evid,magnitude,event_type\n1,2.1,eq\n3,,\"px, quarry\"\n"
        );
    }

    #[test]
    fn test_json_records() {
        let mut out = Vec::new();
        table().write_json(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["evid"], 1);
        assert_eq!(value[1]["magnitude"], serde_json::Value::Null);
    }
}
