//! Predicate tree
//!
//! Compiled filters are kept as a tree of (column, operator, value)
//! comparisons joined by AND/OR. The tree renders to SQL text with `?`
//! placeholders plus the values to bind; values never end up inside the SQL
//! text that is executed. A literal rendering (via `Display`) exists for logs.
//!
//! ```text
//! station LIKE 'RCM%' AND (channel = 'HHZ' OR channel LIKE 'E_Z') AND endtime > '...'
//! ```

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

/// A value bound into a predicate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl SqlValue {
    /// Literal form, for diagnostics only
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Real(r) => r.to_string(),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
        })
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal to
    Eq,
    /// Greater than
    Gt,
    /// Greater than or equal to
    Gte,
    /// Less than
    Lt,
    /// Less than or equal to
    Lte,
    /// SQL pattern match
    Like,
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
        }
    }
}

/// Boolean predicate over table columns
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column op value`
    Compare {
        column: String,
        op: Operator,
        value: SqlValue,
    },
    /// Alternatives, rendered parenthesized and joined with OR
    Any(Vec<Predicate>),
    /// Conjunction, joined with AND
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(column: impl Into<String>, op: Operator, value: impl Into<SqlValue>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(column, Operator::Eq, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, Operator::Like, SqlValue::Text(pattern.into()))
    }

    /// True when nothing constrains the rows
    pub fn is_empty(&self) -> bool {
        match self {
            Predicate::Compare { .. } => false,
            Predicate::Any(items) | Predicate::All(items) => items.iter().all(Predicate::is_empty),
        }
    }

    /// Top-level AND terms
    pub fn conjuncts(&self) -> Vec<&Predicate> {
        match self {
            Predicate::All(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// SQL text with `?` placeholders and the values to bind, in order
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render(&mut sql, &mut Some(&mut params), false);
        (sql, params)
    }

    fn render(&self, out: &mut String, params: &mut Option<&mut Vec<SqlValue>>, nested: bool) {
        match self {
            Predicate::Compare { column, op, value } => {
                out.push_str(column);
                out.push(' ');
                out.push_str(&op.to_string());
                out.push(' ');
                match params {
                    Some(binds) => {
                        out.push('?');
                        binds.push(value.clone());
                    }
                    None => out.push_str(&value.to_literal()),
                }
            }
            Predicate::Any(items) => {
                let items: Vec<&Predicate> = items.iter().filter(|p| !p.is_empty()).collect();
                if items.len() == 1 {
                    items[0].render(out, params, nested);
                    return;
                }
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" OR ");
                    }
                    item.render(out, params, true);
                }
                out.push(')');
            }
            Predicate::All(items) => {
                let items: Vec<&Predicate> = items.iter().filter(|p| !p.is_empty()).collect();
                let wrap = nested && items.len() > 1;
                if wrap {
                    out.push('(');
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" AND ");
                    }
                    item.render(out, params, true);
                }
                if wrap {
                    out.push(')');
                }
            }
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        self.render(&mut out, &mut None, false);
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_renders_placeholder() {
        let p = Predicate::eq("network", "UW");
        let (sql, params) = p.to_sql();
        assert_eq!(sql, "network = ?");
        assert_eq!(params, vec![SqlValue::Text("UW".into())]);
        assert_eq!(p.to_string(), "network = 'UW'");
    }

    #[test]
    fn test_any_is_parenthesized_inside_all() {
        let p = Predicate::All(vec![
            Predicate::eq("network", "UW"),
            Predicate::Any(vec![
                Predicate::like("station", "MBW%"),
                Predicate::eq("station", "JCW"),
            ]),
        ]);
        assert_eq!(
            p.to_string(),
            "network = 'UW' AND (station LIKE 'MBW%' OR station = 'JCW')"
        );
        let (sql, params) = p.to_sql();
        assert_eq!(sql, "network = ? AND (station LIKE ? OR station = ?)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_single_alternative_is_not_wrapped() {
        let p = Predicate::Any(vec![Predicate::eq("channel", "HHZ")]);
        assert_eq!(p.to_string(), "channel = 'HHZ'");
    }

    #[test]
    fn test_empty_conjunction() {
        let p = Predicate::All(vec![]);
        assert!(p.is_empty());
        assert_eq!(p.to_sql().0, "");
    }

    #[test]
    fn test_literal_quotes_are_escaped() {
        let p = Predicate::eq("station", "O'X");
        assert_eq!(p.to_string(), "station = 'O''X'");
        // Executed form keeps the raw value as a bound parameter
        assert_eq!(p.to_sql().1, vec![SqlValue::Text("O'X".into())]);
    }

    #[test]
    fn test_numeric_comparisons() {
        let p = Predicate::All(vec![
            Predicate::compare("latitude", Operator::Gte, 45.5),
            Predicate::compare("depth", Operator::Lte, 10_i64),
        ]);
        assert_eq!(p.to_string(), "latitude >= 45.5 AND depth <= 10");
    }
}
