//! Predicate compiler
//!
//! Translates human-facing filters into SQL predicates:
//!
//! - **wildcard**: `*`/`?` translation and comma-list splitting
//! - **ast**: predicate tree rendered with bound parameters
//! - **compiler**: per-table field semantics and compilation
//!
//! # Filter syntax
//!
//! ```text
//! network="UW"              network = 'UW'
//! station="RCM*"            station LIKE 'RCM%'
//! channel="?HZ"             channel LIKE '_HZ'
//! station="MBW*,JCW"        (station LIKE 'MBW%' OR station = 'JCW')
//! ```
//!
//! Fields are AND-ed together with any extra conditions such as the index
//! time overlap `endtime > start AND starttime < end`.
//!
//! # Example
//!
//! ```rust
//! use seisarchive::query::{FilterSchema, Filters};
//!
//! let filters = Filters::new()
//!     .with("network", "UW")
//!     .with("station", "MBW*,JCW")
//!     .with("location", "*")
//!     .with("channel", "HHZ");
//! let predicate = FilterSchema::waveform().compile(&filters, vec![]).unwrap();
//! assert_eq!(
//!     predicate.to_string(),
//!     "network = 'UW' AND (station LIKE 'MBW%' OR station = 'JCW') AND location LIKE '%' AND channel = 'HHZ'"
//! );
//! ```

mod ast;
mod compiler;
mod error;
pub mod wildcard;

pub use ast::{Operator, Predicate, SqlValue};
pub use compiler::{
    compile, time_overlap, FieldKind, FieldSpec, FilterArg, FilterSchema, Filters,
    UnknownKeyPolicy,
};
pub use error::{QueryError, QueryResult};
