//! Core data types for waveform retrieval
//!
//! This module defines the fundamental types shared by the storage layer and
//! the clients:
//! - `TimeWindow`: a requested time interval
//! - `Nslc`: network/station/location/channel identifier
//! - `Trace`: one contiguous run of samples
//! - `Stream`: the ordered, mergeable result collection

use crate::query::wildcard;
use crate::storage::inventory::ChannelResponse;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Text format of start/end times in the segment index
pub const INDEX_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Requested time window, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, returning None if start is after end
    pub fn try_new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Inclusive on both ends; used for sample trimming
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

fn relative_time_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^now-(\d+)([smhdw])$").ok())
        .as_ref()
}

/// Parse a user-supplied timestamp
///
/// Accepts RFC 3339, `YYYY-MM-DDThh:mm:ss[.f]` and `YYYY-MM-DD hh:mm:ss[.f]`
/// (taken as UTC), bare dates, epoch seconds, `now` and `now-<n><s|m|h|d|w>`.
pub fn parse_time(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if s.eq_ignore_ascii_case("now") {
        return Some(Utc::now());
    }

    if let Some(caps) = relative_time_regex().and_then(|re| re.captures(s)) {
        let amount: i64 = caps[1].parse().ok()?;
        let offset = match &caps[2] {
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            "w" => Duration::try_weeks(amount),
            _ => None,
        }?;
        return Utc::now().checked_sub_signed(offset);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    s.parse::<f64>().ok().and_then(from_epoch_seconds)
}

/// Convert epoch seconds to a timestamp
pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// Epoch seconds with sub-second precision
pub fn epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9
}

/// Render a timestamp the way the segment index stores it
pub fn format_index_time(t: DateTime<Utc>) -> String {
    t.format(INDEX_TIME_FORMAT).to_string()
}

/// Signed number of seconds from `from` to `to`
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let d = to - from;
    let whole = d.num_seconds();
    let rest = (d - Duration::seconds(whole)).num_nanoseconds().unwrap_or(0);
    whole as f64 + rest as f64 / 1e9
}

/// Shift a timestamp by a (possibly fractional) number of seconds
pub fn offset_seconds(t: DateTime<Utc>, secs: f64) -> DateTime<Utc> {
    t + Duration::nanoseconds((secs * 1e9).round() as i64)
}

/// Network/station/location/channel identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nslc {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl Nslc {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }

    /// Match against `*`/`?` patterns per code
    pub fn matches(&self, network: &str, station: &str, location: &str, channel: &str) -> bool {
        wildcard::glob_match(network, &self.network)
            && wildcard::glob_match(station, &self.station)
            && wildcard::glob_match(location, &self.location)
            && wildcard::glob_match(channel, &self.channel)
    }
}

impl std::fmt::Display for Nslc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// Decoded sample values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(v) => v.len(),
            Samples::Float(v) => v.len(),
            Samples::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the sample type
    pub fn kind(&self) -> &'static str {
        match self {
            Samples::Int(_) => "int",
            Samples::Float(_) => "float",
            Samples::Double(_) => "double",
        }
    }

    /// Keep only `range`
    fn retain_range(&mut self, range: std::ops::Range<usize>) {
        match self {
            Samples::Int(v) => {
                v.truncate(range.end);
                v.drain(..range.start);
            }
            Samples::Float(v) => {
                v.truncate(range.end);
                v.drain(..range.start);
            }
            Samples::Double(v) => {
                v.truncate(range.end);
                v.drain(..range.start);
            }
        }
    }

    /// Append samples of the same type; returns false on type mismatch
    fn append(&mut self, other: Samples) -> bool {
        match (self, other) {
            (Samples::Int(a), Samples::Int(b)) => a.extend(b),
            (Samples::Float(a), Samples::Float(b)) => a.extend(b),
            (Samples::Double(a), Samples::Double(b)) => a.extend(b),
            _ => return false,
        }
        true
    }

    /// Values widened to f64
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Samples::Int(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Samples::Float(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Samples::Double(v) => v.clone(),
        }
    }
}

/// One contiguous run of samples for a single channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: Nslc,
    /// Data quality indicator from the record header
    pub quality: Option<char>,
    /// Time of the first sample
    pub start: DateTime<Utc>,
    /// Samples per second
    pub sample_rate: f64,
    pub samples: Samples,
    /// Instrument response attached after retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ChannelResponse>,
}

impl Trace {
    pub fn new(id: Nslc, start: DateTime<Utc>, sample_rate: f64, samples: Samples) -> Self {
        Self {
            id,
            quality: None,
            start,
            sample_rate,
            samples,
            response: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample interval in seconds, zero for rate-less traces
    pub fn delta(&self) -> f64 {
        if self.sample_rate > 0.0 {
            1.0 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Time of sample `index`
    pub fn time_of(&self, index: usize) -> DateTime<Utc> {
        offset_seconds(self.start, index as f64 * self.delta())
    }

    /// Time of the last sample
    pub fn end(&self) -> DateTime<Utc> {
        self.time_of(self.len().saturating_sub(1))
    }

    /// Drop samples outside the inclusive window
    pub fn trim(&mut self, window: &TimeWindow) {
        let n = self.len();
        if n == 0 {
            return;
        }
        if self.sample_rate <= 0.0 {
            if !window.contains(self.start) {
                self.samples.retain_range(0..0);
            }
            return;
        }

        const EPS: f64 = 1e-6;
        let first = (seconds_between(self.start, window.start) * self.sample_rate - EPS).ceil();
        let last = (seconds_between(self.start, window.end) * self.sample_rate + EPS).floor();
        let first = first.max(0.0);
        let last = last.min((n - 1) as f64);

        if first > last {
            self.samples.retain_range(0..0);
            return;
        }

        let (first, last) = (first as usize, last as usize);
        self.start = self.time_of(first);
        self.samples.retain_range(first..last + 1);
    }

    /// Whether `next` continues this trace without gap or overlap
    pub fn is_contiguous_with(&self, next: &Trace) -> bool {
        if self.id != next.id || self.samples.kind() != next.samples.kind() {
            return false;
        }
        if self.sample_rate <= 0.0 || (self.sample_rate - next.sample_rate).abs() > 1e-9 * self.sample_rate {
            return false;
        }
        let expected = offset_seconds(self.end(), self.delta());
        seconds_between(expected, next.start).abs() <= 0.5 * self.delta()
    }

    /// Append a contiguous trace; returns false and leaves self untouched otherwise
    pub fn append(&mut self, next: Trace) -> bool {
        if !self.is_contiguous_with(&next) {
            return false;
        }
        self.samples.append(next.samples)
    }
}

/// Ordered collection of traces returned by a retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    traces: Vec<Trace>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    pub fn extend(&mut self, traces: impl IntoIterator<Item = Trace>) {
        self.traces.extend(traces);
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trace> {
        self.traces.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Trace> {
        self.traces.iter_mut()
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn into_traces(self) -> Vec<Trace> {
        self.traces
    }

    pub fn total_samples(&self) -> usize {
        self.traces.iter().map(Trace::len).sum()
    }

    /// Sort by id, then start time, then sample rate
    pub fn sort(&mut self) {
        self.traces.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then(a.start.cmp(&b.start))
                .then(a.sample_rate.total_cmp(&b.sample_rate))
        });
    }

    /// Sort, then join exactly contiguous traces
    ///
    /// Gaps and overlaps are left as separate traces.
    pub fn merge(&mut self) {
        self.sort();
        let mut merged: Vec<Trace> = Vec::with_capacity(self.traces.len());
        for trace in self.traces.drain(..) {
            match merged.iter_mut().rev().find(|t| t.is_contiguous_with(&trace)) {
                Some(prev) => {
                    prev.append(trace);
                }
                None => merged.push(trace),
            }
        }
        self.traces = merged;
    }

    /// Traces whose id matches the `*`/`?` patterns
    pub fn select(&self, network: &str, station: &str, location: &str, channel: &str) -> Stream {
        Stream {
            traces: self
                .traces
                .iter()
                .filter(|t| t.id.matches(network, station, location, channel))
                .cloned()
                .collect(),
        }
    }

    /// Trim every trace and drop the ones left empty
    pub fn trim(&mut self, window: &TimeWindow) {
        for trace in &mut self.traces {
            trace.trim(window);
        }
        self.traces.retain(|t| !t.is_empty());
    }
}

impl IntoIterator for Stream {
    type Item = Trace;
    type IntoIter = std::vec::IntoIter<Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.into_iter()
    }
}

impl FromIterator<Trace> for Stream {
    fn from_iter<I: IntoIterator<Item = Trace>>(iter: I) -> Self {
        Stream {
            traces: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()
    }

    fn trace(start: DateTime<Utc>, n: i32) -> Trace {
        Trace::new(
            Nslc::new("UW", "RCM", "", "HHZ"),
            start,
            10.0,
            Samples::Int((0..n).collect()),
        )
    }

    #[test]
    fn test_time_window_validation() {
        assert!(TimeWindow::try_new(t0(), t0()).is_some());
        assert!(TimeWindow::try_new(t0() + Duration::seconds(1), t0()).is_none());
    }

    #[test]
    fn test_parse_time_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_time("2023-03-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_time("2023-03-01T12:30:00"), Some(expected));
        assert_eq!(parse_time("2023-03-01 12:30:00.000"), Some(expected));
        assert_eq!(parse_time("1677673800"), Some(expected));
        assert_eq!(parse_time("2023-03-01"), Some(t0()));
        assert!(parse_time("now-2d").is_some());
        assert!(parse_time("yesterday-ish").is_none());
        assert!(parse_time("").is_none());
    }

    #[test]
    fn test_relative_time_out_of_range() {
        assert!(parse_time("now-99999999999999w").is_none());
        assert!(parse_time("now-1000000000d").is_none());
        assert!(parse_time("now-99999999999999999999s").is_none());
        let hour_ago = parse_time("now-1h").unwrap();
        assert!(hour_ago < Utc::now());
    }

    #[test]
    fn test_format_index_time() {
        let t = t0() + Duration::milliseconds(1500);
        assert_eq!(format_index_time(t), "2023-03-01T00:00:01.500000");
    }

    #[test]
    fn test_epoch_round_trip_precision() {
        let t = from_epoch_seconds(1677628800.25).unwrap();
        assert_eq!(t, t0() + Duration::milliseconds(250));
        assert!((epoch_seconds(t) - 1677628800.25).abs() < 1e-6);
    }

    #[test]
    fn test_trace_end_and_trim() {
        let mut tr = trace(t0(), 100); // 10 s at 10 Hz
        assert_eq!(tr.end(), t0() + Duration::milliseconds(9900));

        let window = TimeWindow::try_new(
            t0() + Duration::milliseconds(2050),
            t0() + Duration::seconds(5),
        )
        .unwrap();
        tr.trim(&window);

        assert_eq!(tr.start, t0() + Duration::milliseconds(2100));
        assert_eq!(tr.end(), t0() + Duration::seconds(5));
        assert_eq!(tr.samples, Samples::Int((21..=50).collect()));
    }

    #[test]
    fn test_trim_outside_window_empties_trace() {
        let mut tr = trace(t0(), 10);
        let window = TimeWindow::try_new(
            t0() + Duration::seconds(5),
            t0() + Duration::seconds(6),
        )
        .unwrap();
        tr.trim(&window);
        assert!(tr.is_empty());
    }

    #[test]
    fn test_merge_joins_contiguous_and_keeps_gaps() {
        let mut stream = Stream::new();
        // Out of order on purpose
        stream.push(trace(t0() + Duration::seconds(1), 10));
        stream.push(trace(t0(), 10));
        stream.push(trace(t0() + Duration::seconds(5), 10));

        stream.merge();

        assert_eq!(stream.len(), 2);
        assert_eq!(stream.traces()[0].start, t0());
        assert_eq!(stream.traces()[0].len(), 20);
        assert_eq!(stream.traces()[1].start, t0() + Duration::seconds(5));
    }

    #[test]
    fn test_merge_keeps_different_channels_apart() {
        let mut other = trace(t0() + Duration::seconds(1), 10);
        other.id.channel = "HHN".to_string();

        let mut stream: Stream = vec![trace(t0(), 10), other].into_iter().collect();
        stream.merge();
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_select_with_wildcards() {
        let mut other = trace(t0(), 10);
        other.id.station = "JCW".to_string();
        let stream: Stream = vec![trace(t0(), 10), other].into_iter().collect();

        assert_eq!(stream.select("UW", "RC?", "*", "HH*").len(), 1);
        assert_eq!(stream.select("*", "*", "*", "*").len(), 2);
    }
}
