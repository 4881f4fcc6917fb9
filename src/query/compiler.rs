//! Predicate compiler
//!
//! Turns named filter values into one `Predicate` using a per-table field
//! table. The same compiler serves the segment index, the event catalog and
//! the pick tables; they differ only in their `FilterSchema`:
//!
//! | schema   | unknown keys | raw `%`/`_`  | wildcards on                          |
//! |----------|--------------|--------------|---------------------------------------|
//! | waveform | rejected     | pass through | network, station, location, channel   |
//! | catalog  | skipped      | rejected     | none                                  |
//! | picks    | rejected     | rejected     | NSLC, evaluation_mode, source_id, phase |

use crate::query::ast::{Operator, Predicate, SqlValue};
use crate::query::error::{QueryError, QueryResult};
use crate::query::wildcard::{self, Term};
use crate::storage::types::{epoch_seconds, format_index_time, parse_time, TimeWindow};
use chrono::{DateTime, Utc};

/// A raw filter value as supplied by a caller
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    Text(String),
    Number(f64),
    Time(DateTime<Utc>),
}

impl std::fmt::Display for FilterArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterArg::Text(s) => write!(f, "{}", s),
            FilterArg::Number(n) => write!(f, "{}", n),
            FilterArg::Time(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<&str> for FilterArg {
    fn from(s: &str) -> Self {
        FilterArg::Text(s.to_string())
    }
}

impl From<String> for FilterArg {
    fn from(s: String) -> Self {
        FilterArg::Text(s)
    }
}

impl From<f64> for FilterArg {
    fn from(v: f64) -> Self {
        FilterArg::Number(v)
    }
}

impl From<i64> for FilterArg {
    fn from(v: i64) -> Self {
        FilterArg::Number(v as f64)
    }
}

impl From<DateTime<Utc>> for FilterArg {
    fn from(t: DateTime<Utc>) -> Self {
        FilterArg::Time(t)
    }
}

/// Ordered set of named filter values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    entries: Vec<(String, FilterArg)>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a filter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterArg>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterArg>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterArg)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<FilterArg>> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Filters::new();
        for (k, v) in iter {
            filters.insert(k, v);
        }
        filters
    }
}

/// How a field's value becomes a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Text code: exact match, optionally with `*`/`?` and comma lists
    Text {
        wildcards: bool,
        lists: bool,
        uppercase: bool,
    },
    /// Numeric bound compared with `op`
    Number(Operator),
    /// Time bound stored as epoch seconds, compared with `op`
    Time(Operator),
}

impl FieldKind {
    pub const CODE: FieldKind = FieldKind::Text {
        wildcards: true,
        lists: true,
        uppercase: false,
    };

    pub const CATEGORY: FieldKind = FieldKind::Text {
        wildcards: false,
        lists: false,
        uppercase: false,
    };
}

/// One entry of a field table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Filter key callers use
    pub key: &'static str,
    /// Column the key maps to
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(key: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { key, column, kind }
    }
}

/// What to do with keys missing from the field table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeyPolicy {
    /// Log and continue with the remaining filters
    Skip,
    /// Fail the whole compilation
    Reject,
}

/// Field semantics for one table
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSchema {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
    pub unknown_keys: UnknownKeyPolicy,
    /// Refuse raw `%` and `_` in text values
    pub reject_engine_wildcards: bool,
}

impl FilterSchema {
    /// Segment index NSLC fields
    pub fn waveform() -> Self {
        Self {
            name: "waveform",
            fields: vec![
                FieldSpec::new("network", "network", FieldKind::CODE),
                FieldSpec::new("station", "station", FieldKind::CODE),
                FieldSpec::new("location", "location", FieldKind::CODE),
                FieldSpec::new("channel", "channel", FieldKind::CODE),
            ],
            unknown_keys: UnknownKeyPolicy::Reject,
            reject_engine_wildcards: false,
        }
    }

    /// Event catalog fields
    pub fn catalog() -> Self {
        use Operator::{Gte, Lte};
        Self {
            name: "catalog",
            fields: vec![
                FieldSpec::new("mintime", "timestamp", FieldKind::Time(Gte)),
                FieldSpec::new("maxtime", "timestamp", FieldKind::Time(Lte)),
                FieldSpec::new("contributor", "contributor", FieldKind::CATEGORY),
                FieldSpec::new("minlatitude", "latitude", FieldKind::Number(Gte)),
                FieldSpec::new("maxlatitude", "latitude", FieldKind::Number(Lte)),
                FieldSpec::new("minlongitude", "longitude", FieldKind::Number(Gte)),
                FieldSpec::new("maxlongitude", "longitude", FieldKind::Number(Lte)),
                FieldSpec::new("mindepth", "depth", FieldKind::Number(Gte)),
                FieldSpec::new("maxdepth", "depth", FieldKind::Number(Lte)),
                FieldSpec::new("minmagnitude", "magnitude", FieldKind::Number(Gte)),
                FieldSpec::new("maxmagnitude", "magnitude", FieldKind::Number(Lte)),
                FieldSpec::new("source_id", "source_id", FieldKind::CATEGORY),
                FieldSpec::new("event_type", "event_type", FieldKind::CATEGORY),
            ],
            unknown_keys: UnknownKeyPolicy::Skip,
            reject_engine_wildcards: true,
        }
    }

    /// Phase pick fields
    pub fn picks() -> Self {
        use Operator::{Gte, Lte};
        Self {
            name: "picks",
            fields: vec![
                FieldSpec::new("network", "network", FieldKind::CODE),
                FieldSpec::new("station", "station", FieldKind::CODE),
                FieldSpec::new("location", "location", FieldKind::CODE),
                FieldSpec::new("channel", "channel", FieldKind::CODE),
                FieldSpec::new("evaluation_mode", "evaluation_mode", FieldKind::CODE),
                FieldSpec::new("source_id", "source_id", FieldKind::CODE),
                FieldSpec::new(
                    "phase",
                    "phase",
                    FieldKind::Text {
                        wildcards: true,
                        lists: true,
                        uppercase: true,
                    },
                ),
                FieldSpec::new("mintime", "timestamp", FieldKind::Time(Gte)),
                FieldSpec::new("maxtime", "timestamp", FieldKind::Time(Lte)),
            ],
            unknown_keys: UnknownKeyPolicy::Reject,
            reject_engine_wildcards: true,
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Compile filters plus extra conditions into one conjunction
    pub fn compile(&self, filters: &Filters, extra: Vec<Predicate>) -> QueryResult<Predicate> {
        compile(filters, self, extra)
    }
}

/// Compile `filters` against `schema`, AND-ing `extra` after the fields
pub fn compile(
    filters: &Filters,
    schema: &FilterSchema,
    extra: Vec<Predicate>,
) -> QueryResult<Predicate> {
    let mut conjuncts = Vec::with_capacity(filters.len() + extra.len());

    for (key, value) in filters.iter() {
        let spec = match schema.field(key) {
            Some(spec) => spec,
            None => match schema.unknown_keys {
                UnknownKeyPolicy::Skip => {
                    tracing::warn!(schema = schema.name, key, %value, "query by {} not implemented, skipping", key);
                    continue;
                }
                UnknownKeyPolicy::Reject => {
                    return Err(QueryError::UnknownFilterKey {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
            },
        };

        conjuncts.push(compile_field(spec, value, schema.reject_engine_wildcards)?);
    }

    conjuncts.extend(extra);
    Ok(Predicate::All(conjuncts))
}

fn compile_field(spec: &FieldSpec, value: &FilterArg, reject_engine: bool) -> QueryResult<Predicate> {
    match spec.kind {
        FieldKind::Text {
            wildcards,
            lists,
            uppercase,
        } => {
            let raw = match value {
                FilterArg::Text(s) => s.clone(),
                FilterArg::Number(n) => format_number(*n),
                FilterArg::Time(_) => {
                    return Err(QueryError::InvalidFilterValue {
                        key: spec.key.to_string(),
                        reason: "expected a text code, got a timestamp".to_string(),
                    })
                }
            };
            compile_text(spec, &raw, wildcards, lists, uppercase, reject_engine)
        }
        FieldKind::Number(op) => {
            let number = match value {
                FilterArg::Number(n) => *n,
                FilterArg::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                    QueryError::InvalidFilterValue {
                        key: spec.key.to_string(),
                        reason: format!("expected a number, got {}", s),
                    }
                })?,
                FilterArg::Time(_) => {
                    return Err(QueryError::InvalidFilterValue {
                        key: spec.key.to_string(),
                        reason: "expected a number, got a timestamp".to_string(),
                    })
                }
            };
            Ok(Predicate::compare(spec.column, op, SqlValue::Real(number)))
        }
        FieldKind::Time(op) => {
            let seconds = match value {
                FilterArg::Time(t) => epoch_seconds(*t),
                FilterArg::Number(n) => *n,
                FilterArg::Text(s) => parse_time(s).map(epoch_seconds).ok_or_else(|| {
                    QueryError::InvalidTimestamp {
                        key: spec.key.to_string(),
                        value: s.clone(),
                    }
                })?,
            };
            Ok(Predicate::compare(spec.column, op, SqlValue::Real(seconds)))
        }
    }
}

fn compile_text(
    spec: &FieldSpec,
    raw: &str,
    wildcards: bool,
    lists: bool,
    uppercase: bool,
    reject_engine: bool,
) -> QueryResult<Predicate> {
    let unsupported = || QueryError::UnsupportedWildcard {
        key: spec.key.to_string(),
        value: raw.to_string(),
    };

    if reject_engine && wildcard::has_engine_wildcard(raw) {
        return Err(unsupported());
    }
    if !wildcards && wildcard::has_user_wildcard(raw) {
        return Err(unsupported());
    }

    let terms = if lists {
        wildcard::parse_terms(raw)
    } else if wildcard::has_user_wildcard(raw) {
        vec![Term::Pattern(wildcard::translate(raw))]
    } else {
        vec![Term::Exact(raw.to_string())]
    };

    let mut alternatives: Vec<Predicate> = terms
        .into_iter()
        .map(|term| match term {
            Term::Exact(code) if uppercase => Predicate::eq(spec.column, code.to_uppercase()),
            Term::Exact(code) => Predicate::eq(spec.column, code),
            Term::Pattern(pattern) => Predicate::like(spec.column, pattern),
        })
        .collect();

    if alternatives.len() == 1 {
        Ok(alternatives.remove(0))
    } else {
        Ok(Predicate::Any(alternatives))
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Overlap of index spans `[starttime, endtime)` with the window
///
/// Always two strict comparisons so partially overlapping spans match.
pub fn time_overlap(window: &TimeWindow) -> Vec<Predicate> {
    vec![
        Predicate::compare("endtime", Operator::Gt, format_index_time(window.start)),
        Predicate::compare("starttime", Operator::Lt, format_index_time(window.end)),
    ]
}
