//! Waveform retrieval
//!
//! A request is compiled into an index predicate, the matching byte ranges
//! are read and decoded one by one, and the decoded traces are merged into a
//! single stream. A record that cannot be read or decoded does not abort the
//! request unless the client is configured to; it is reported in
//! `WaveformResponse::failed_records` instead.

use crate::client::outcome::{PostProcessOutcome, PostProcessStep};
use crate::index::{IndexRecord, SegmentIndex, SegmentLocator};
use crate::query::{time_overlap, FilterSchema, Filters, Predicate, QueryError, QueryResult};
use crate::storage::types::format_index_time;
use crate::storage::{
    read_segment, write_stream, Inventory, MseedDecoder, SegmentDecoder, StorageError, Stream,
    TimeWindow,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What to do when one index record fails to read or decode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeFailurePolicy {
    /// Log, record the failure and continue with the remaining records
    #[default]
    Skip,
    /// Fail the request with the first error
    Abort,
}

/// Inventory used for response attachment
#[derive(Debug, Clone)]
pub enum InventorySource {
    Loaded(Inventory),
    /// StationXML file read at attachment time
    Path(PathBuf),
}

impl From<Inventory> for InventorySource {
    fn from(inventory: Inventory) -> Self {
        InventorySource::Loaded(inventory)
    }
}

impl From<PathBuf> for InventorySource {
    fn from(path: PathBuf) -> Self {
        InventorySource::Path(path)
    }
}

impl From<&Path> for InventorySource {
    fn from(path: &Path) -> Self {
        InventorySource::Path(path.to_path_buf())
    }
}

/// Parameters of one waveform request
///
/// Codes accept exact values, `*`/`?` wildcards and comma lists.
#[derive(Debug, Clone)]
pub struct WaveformRequest {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Data quality indicator to match exactly
    pub quality: Option<String>,
    /// Reserved; setting it fails the request
    pub minimum_length: Option<f64>,
    /// Reserved; setting it fails the request
    pub longest_only: Option<bool>,
    /// Write the merged stream here after retrieval
    pub filename: Option<PathBuf>,
    pub attach_response: bool,
    pub inventory: Option<InventorySource>,
}

impl WaveformRequest {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
            start,
            end,
            quality: None,
            minimum_length: None,
            longest_only: None,
            filename: None,
            attach_response: false,
            inventory: None,
        }
    }

    pub fn quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn minimum_length(mut self, seconds: f64) -> Self {
        self.minimum_length = Some(seconds);
        self
    }

    pub fn longest_only(mut self, longest_only: bool) -> Self {
        self.longest_only = Some(longest_only);
        self
    }

    pub fn filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.filename = Some(path.into());
        self
    }

    /// Attach responses from `inventory` to the retrieved traces
    pub fn attach_response(mut self, inventory: impl Into<InventorySource>) -> Self {
        self.attach_response = true;
        self.inventory = Some(inventory.into());
        self
    }

    /// Requested window, failing when start is after end
    pub fn window(&self) -> QueryResult<TimeWindow> {
        TimeWindow::try_new(self.start, self.end).ok_or_else(|| QueryError::InvalidTimeRange {
            start: format_index_time(self.start),
            end: format_index_time(self.end),
        })
    }

    /// Reject everything that can be rejected without touching the index
    pub fn validate(&self) -> QueryResult<TimeWindow> {
        let window = self.window()?;
        if self.minimum_length.is_some() {
            return Err(QueryError::NotImplemented("minimum_length"));
        }
        if self.longest_only.is_some() {
            return Err(QueryError::NotImplemented("longest_only"));
        }
        Ok(window)
    }

    /// Index predicate: codes, time overlap and optional quality
    pub fn predicate(&self, window: &TimeWindow) -> QueryResult<Predicate> {
        let filters = Filters::new()
            .with("network", self.network.as_str())
            .with("station", self.station.as_str())
            .with("location", self.location.as_str())
            .with("channel", self.channel.as_str());

        let mut extra = time_overlap(window);
        if let Some(quality) = &self.quality {
            extra.push(Predicate::eq("quality", quality.as_str()));
        }
        FilterSchema::waveform().compile(&filters, extra)
    }
}

/// One request of a bulk retrieval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkItem {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BulkItem {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
            start,
            end,
        }
    }

    pub fn to_request(&self) -> WaveformRequest {
        WaveformRequest::new(
            self.network.clone(),
            self.station.clone(),
            self.location.clone(),
            self.channel.clone(),
            self.start,
            self.end,
        )
    }
}

impl std::fmt::Display for BulkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{} {} {}",
            self.network,
            self.station,
            self.location,
            self.channel,
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )
    }
}

/// An index record whose bytes could not be read or decoded
#[derive(Debug)]
pub struct RecordFailure {
    pub locator: SegmentLocator,
    pub error: StorageError,
}

/// A bulk item that failed as a whole
#[derive(Debug)]
pub struct BulkFailure {
    /// Position of the item in the bulk request
    pub index: usize,
    pub request: BulkItem,
    pub error: QueryError,
}

#[derive(Debug, Default)]
pub struct WaveformResponse {
    pub stream: Stream,
    pub failed_records: Vec<RecordFailure>,
    pub post_process: Vec<PostProcessOutcome>,
}

impl WaveformResponse {
    /// No failed record and no failed post-processing step
    pub fn is_complete(&self) -> bool {
        self.failed_records.is_empty() && self.post_process.iter().all(PostProcessOutcome::is_ok)
    }
}

#[derive(Debug, Default)]
pub struct BulkResponse {
    pub stream: Stream,
    pub failures: Vec<BulkFailure>,
    pub failed_records: Vec<RecordFailure>,
    pub post_process: Vec<PostProcessOutcome>,
}

/// Retrieves waveforms through a segment index
///
/// Holds one database connection. The client is `Send` but not `Sync`: move
/// it between threads, but share it only behind external synchronization.
/// Requests run sequentially on the calling thread.
pub struct WaveformClient<D = MseedDecoder> {
    index: SegmentIndex,
    decoder: D,
    failure_policy: DecodeFailurePolicy,
}

impl WaveformClient<MseedDecoder> {
    /// Open the index database read-only with the miniSEED decoder
    pub fn open(path: impl AsRef<Path>, table: &str) -> QueryResult<Self> {
        Ok(Self::new(SegmentIndex::open(path, table)?))
    }

    pub fn new(index: SegmentIndex) -> Self {
        Self::with_decoder(index, MseedDecoder)
    }
}

impl<D: SegmentDecoder> WaveformClient<D> {
    pub fn with_decoder(index: SegmentIndex, decoder: D) -> Self {
        Self {
            index,
            decoder,
            failure_policy: DecodeFailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: DecodeFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    pub fn failure_policy(&self) -> DecodeFailurePolicy {
        self.failure_policy
    }

    /// Retrieve, merge and post-process one request
    pub fn get_waveforms(&self, request: &WaveformRequest) -> QueryResult<WaveformResponse> {
        let (stream, failed_records) = self.retrieve(request)?;
        let mut response = WaveformResponse {
            stream,
            failed_records,
            post_process: Vec::new(),
        };

        if request.attach_response {
            let outcome = attach_response(&mut response.stream, request.inventory.as_ref());
            response.post_process.push(outcome.log());
        }
        if let Some(path) = &request.filename {
            response.post_process.push(write_output(&response.stream, path).log());
        }

        Ok(response)
    }

    /// Run every item, isolating failures, and merge the results
    ///
    /// The merged stream is written once to `filename` when given.
    pub fn get_waveforms_bulk(&self, items: &[BulkItem], filename: Option<&Path>) -> BulkResponse {
        let mut response = BulkResponse::default();

        for (index, item) in items.iter().enumerate() {
            match self.retrieve(&item.to_request()) {
                Ok((stream, failed_records)) => {
                    response.stream.extend(stream);
                    response.failed_records.extend(failed_records);
                }
                Err(error) => {
                    tracing::warn!(index, request = %item, error = %error, "Bulk request failed");
                    response.failures.push(BulkFailure {
                        index,
                        request: item.clone(),
                        error,
                    });
                }
            }
        }
        response.stream.merge();

        if let Some(path) = filename {
            response.post_process.push(write_output(&response.stream, path).log());
        }

        tracing::info!(
            items = items.len(),
            failed = response.failures.len(),
            traces = response.stream.len(),
            "Bulk retrieval finished"
        );
        response
    }

    /// Index records matching the request, without reading any segment
    pub fn availability(&self, request: &WaveformRequest) -> QueryResult<Vec<IndexRecord>> {
        let window = request.window()?;
        let predicate = request.predicate(&window)?;
        self.index.records(&predicate)
    }

    fn retrieve(&self, request: &WaveformRequest) -> QueryResult<(Stream, Vec<RecordFailure>)> {
        let started = Instant::now();
        let window = request.validate()?;
        let predicate = request.predicate(&window)?;
        let locators = self.index.locators(&predicate)?;

        let mut stream = Stream::new();
        let mut failures = Vec::new();

        for locator in locators.iter() {
            let decoded = read_segment(locator).and_then(|buf| self.decoder.decode(&buf, &window));
            match decoded {
                Ok(traces) => stream.extend(traces),
                Err(error) => match self.failure_policy {
                    DecodeFailurePolicy::Abort => return Err(error.into()),
                    DecodeFailurePolicy::Skip => {
                        tracing::warn!(locator = %locator, error = %error, "Failed to read segment");
                        failures.push(RecordFailure {
                            locator: locator.clone(),
                            error,
                        });
                    }
                },
            }
        }

        stream.merge();

        tracing::info!(
            records = locators.len(),
            failed = failures.len(),
            traces = stream.len(),
            samples = stream.total_samples(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Retrieved waveforms"
        );
        Ok((stream, failures))
    }
}

fn attach_response(stream: &mut Stream, source: Option<&InventorySource>) -> PostProcessOutcome {
    let step = PostProcessStep::AttachResponse;
    let loaded;
    let inventory = match source {
        None => return PostProcessOutcome::skipped(step, "no inventory given"),
        Some(InventorySource::Loaded(inventory)) => inventory,
        Some(InventorySource::Path(path)) => match Inventory::load(path) {
            Ok(inventory) => {
                loaded = inventory;
                &loaded
            }
            Err(e) => {
                return PostProcessOutcome::failed(
                    step,
                    format!("inventory {} unreadable: {}", path.display(), e),
                )
            }
        },
    };

    let unmatched = inventory.attach(stream);
    if unmatched.is_empty() {
        PostProcessOutcome::ok(step)
    } else {
        let ids: Vec<String> = unmatched.iter().map(ToString::to_string).collect();
        PostProcessOutcome::failed(step, format!("no response for {}", ids.join(", ")))
    }
}

fn write_output(stream: &Stream, path: &Path) -> PostProcessOutcome {
    match write_stream(stream, path) {
        Ok(_) => PostProcessOutcome::ok(PostProcessStep::WriteFile),
        Err(e) => PostProcessOutcome::failed(
            PostProcessStep::WriteFile,
            format!("writing {} failed: {}", path.display(), e),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::outcome::OutcomeStatus;
    use crate::storage::{ChannelResponse, Nslc, Samples, StorageResult, Trace};
    use crate::testutil::{t0, test_trace, Archive};
    use chrono::Duration;

    fn request(station: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> WaveformRequest {
        WaveformRequest::new("UW", station, "*", "?HZ", start, end)
    }

    #[test]
    fn test_partial_overlaps_are_merged() {
        let archive = Archive::new();
        // [T0 - 10 s, T0 + 5 s) and [T0 + 5 s, T0 + 20 s) at 10 Hz, contiguous
        archive.add_trace("a.mseed", &test_trace("RCM", t0() - Duration::seconds(10), 150));
        archive.add_trace("b.mseed", &test_trace("RCM", t0() + Duration::seconds(5), 150));
        // Other station, not requested
        archive.add_trace("a.mseed", &test_trace("JCW", t0(), 100));

        let client = WaveformClient::new(archive.index());
        let end = t0() + Duration::seconds(10);
        let response = client.get_waveforms(&request("RCM*", t0(), end)).unwrap();

        assert!(response.is_complete());
        assert_eq!(response.stream.len(), 1);
        let trace = &response.stream.traces()[0];
        assert_eq!(trace.id, Nslc::new("UW", "RCM", "", "HHZ"));
        assert_eq!(trace.start, t0());
        assert_eq!(trace.end(), end);
        assert_eq!(trace.len(), 101);
    }

    #[test]
    fn test_overlapping_records_are_both_read() {
        let archive = Archive::new();
        let t1 = t0() + Duration::seconds(60);
        // [T0 - 10 s, T0 + 5 s) and [T0 + 4 s, T1 + 20 s), overlapping by 1 s
        let first = test_trace("RCM", t0() - Duration::seconds(10), 150);
        let second = test_trace("RCM", t0() + Duration::seconds(4), 760);
        let first = archive.add_trace("a.mseed", &first);
        let second = archive.add_trace("b.mseed", &second);

        let client = WaveformClient::new(archive.index());
        let req = request("RCM*", t0(), t1);

        let located: Vec<_> = client
            .availability(&req)
            .unwrap()
            .into_iter()
            .map(|r| r.locator)
            .collect();
        assert_eq!(located, vec![first, second]);

        let response = client.get_waveforms(&req).unwrap();
        assert!(response.is_complete());
        let traces = response.stream.traces();
        assert_eq!(traces.len(), 2);

        // Head of the first record, trimmed at T0
        assert_eq!(traces[0].start, t0());
        assert_eq!(traces[0].len(), 50);
        assert_eq!(traces[0].samples, Samples::Int((100..150).collect()));

        // Second record, trimmed at T1
        assert_eq!(traces[1].start, t0() + Duration::seconds(4));
        assert_eq!(traces[1].end(), t1);
        assert_eq!(traces[1].len(), 561);
    }

    #[test]
    fn test_client_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WaveformClient>();
    }

    #[test]
    fn test_gap_keeps_two_traces() {
        let archive = Archive::new();
        archive.add_trace("a.mseed", &test_trace("RCM", t0(), 50));
        archive.add_trace("a.mseed", &test_trace("RCM", t0() + Duration::seconds(8), 50));

        let client = WaveformClient::new(archive.index());
        let response = client
            .get_waveforms(&request("RCM", t0(), t0() + Duration::seconds(20)))
            .unwrap();
        assert_eq!(response.stream.len(), 2);
        assert_eq!(response.stream.total_samples(), 100);
    }

    #[test]
    fn test_start_after_end_fails_before_io() {
        let archive = Archive::new();
        let client = WaveformClient::new(archive.index());

        let err = client
            .get_waveforms(&request("RCM", t0() + Duration::seconds(1), t0()))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidTimeRange { .. }));
    }

    #[test]
    fn test_reserved_options_are_rejected() {
        let archive = Archive::new();
        let client = WaveformClient::new(archive.index());
        let end = t0() + Duration::seconds(1);

        let err = client
            .get_waveforms(&request("RCM", t0(), end).minimum_length(10.0))
            .unwrap_err();
        assert!(matches!(err, QueryError::NotImplemented("minimum_length")));

        let err = client
            .get_waveforms(&request("RCM", t0(), end).longest_only(true))
            .unwrap_err();
        assert!(matches!(err, QueryError::NotImplemented("longest_only")));
    }

    #[test]
    fn test_quality_filter() {
        let archive = Archive::new();
        archive.add_trace("a.mseed", &test_trace("RCM", t0(), 50));
        let client = WaveformClient::new(archive.index());
        let end = t0() + Duration::seconds(5);

        let found = client.get_waveforms(&request("RCM", t0(), end).quality("D")).unwrap();
        assert_eq!(found.stream.len(), 1);
        let none = client.get_waveforms(&request("RCM", t0(), end).quality("M")).unwrap();
        assert!(none.stream.is_empty());
    }

    #[test]
    fn test_corrupt_record_is_reported_not_swallowed() {
        let archive = Archive::new();
        archive.add_trace("a.mseed", &test_trace("RCM", t0(), 50));
        let bad = archive.add_bytes("bad.mseed", &test_trace("RCM", t0() + Duration::seconds(10), 50), &[0u8; 512]);

        let client = WaveformClient::new(archive.index());
        let req = request("RCM", t0(), t0() + Duration::seconds(30));

        let response = client.get_waveforms(&req).unwrap();
        assert_eq!(response.stream.len(), 1);
        assert_eq!(response.failed_records.len(), 1);
        assert_eq!(response.failed_records[0].locator, bad);
        assert!(!response.is_complete());

        let client = client.with_failure_policy(DecodeFailurePolicy::Abort);
        assert!(matches!(client.get_waveforms(&req), Err(QueryError::Storage(_))));
    }

    #[test]
    fn test_missing_segment_file_is_a_record_failure() {
        let archive = Archive::new();
        let locator = archive.add_trace("gone.mseed", &test_trace("RCM", t0(), 50));
        std::fs::remove_file(&locator.path).unwrap();

        let client = WaveformClient::new(archive.index());
        let response = client
            .get_waveforms(&request("RCM", t0(), t0() + Duration::seconds(5)))
            .unwrap();
        assert!(response.stream.is_empty());
        assert!(matches!(response.failed_records[0].error, StorageError::Io(_)));
    }

    #[test]
    fn test_custom_decoder() {
        let archive = Archive::new();
        archive.add_trace("a.mseed", &test_trace("RCM", t0(), 50));

        let decoder = |buf: &[u8], _: &TimeWindow| -> StorageResult<Vec<Trace>> {
            Ok(vec![Trace::new(
                Nslc::new("XX", "BUF", "", "LEN"),
                t0(),
                1.0,
                Samples::Int(vec![buf.len() as i32]),
            )])
        };
        let client = WaveformClient::with_decoder(archive.index(), decoder);
        let response = client
            .get_waveforms(&request("RCM", t0(), t0() + Duration::seconds(5)))
            .unwrap();
        assert_eq!(response.stream.traces()[0].samples, Samples::Int(vec![512]));
    }

    #[test]
    fn test_bulk_isolates_failures() {
        let archive = Archive::new();
        archive.add_trace("a.mseed", &test_trace("RCM", t0(), 50));
        archive.add_trace("a.mseed", &test_trace("JCW", t0(), 50));

        let end = t0() + Duration::seconds(5);
        let items = vec![
            BulkItem::new("UW", "RCM", "", "HHZ", t0(), end),
            BulkItem::new("UW", "MBW", "", "HHZ", end, t0()),
            BulkItem::new("UW", "JCW", "", "HHZ", t0(), end),
        ];
        let out = archive.dir().join("bulk.mseed");

        let client = WaveformClient::new(archive.index());
        let response = client.get_waveforms_bulk(&items, Some(&out));

        assert_eq!(response.stream.len(), 2);
        assert_eq!(response.failures.len(), 1);
        assert_eq!(response.failures[0].index, 1);
        assert!(matches!(response.failures[0].error, QueryError::InvalidTimeRange { .. }));
        assert!(response.post_process[0].is_ok());
        assert!(out.exists());
    }

    #[test]
    fn test_availability_lists_records() {
        let archive = Archive::new();
        archive.add_trace("a.mseed", &test_trace("RCM", t0(), 50));
        archive.add_trace("a.mseed", &test_trace("JCW", t0(), 50));

        let client = WaveformClient::new(archive.index());
        let records = client
            .availability(&request("RCM,JCW", t0(), t0() + Duration::seconds(5)))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.samplerate == Some(10.0)));
    }

    #[test]
    fn test_post_processing_outcomes() {
        let archive = Archive::new();
        archive.add_trace("a.mseed", &test_trace("RCM", t0(), 50));
        let client = WaveformClient::new(archive.index());
        let end = t0() + Duration::seconds(5);

        let mut response_for = ChannelResponse::new(Nslc::new("UW", "RCM", "", "HHZ"));
        response_for.sensitivity = Some(1.0e9);
        let inventory: Inventory = vec![response_for].into_iter().collect();

        let req = request("RCM", t0(), end)
            .attach_response(inventory)
            .filename(archive.dir().join("out.json"));
        let response = client.get_waveforms(&req).unwrap();
        assert!(response.is_complete());
        assert_eq!(
            response.stream.traces()[0].response.as_ref().and_then(|r| r.sensitivity),
            Some(1.0e9)
        );

        // Unreadable inventory and unwritable output still return the data
        let req = request("RCM", t0(), end)
            .attach_response(archive.dir().join("missing.xml"))
            .filename(archive.dir().join("no").join("out.mseed"));
        let response = client.get_waveforms(&req).unwrap();
        assert_eq!(response.stream.len(), 1);
        assert_eq!(response.post_process.len(), 2);
        assert!(response
            .post_process
            .iter()
            .all(|o| matches!(o.status, OutcomeStatus::Failed(_))));

        let mut req = request("RCM", t0(), end);
        req.attach_response = true;
        let response = client.get_waveforms(&req).unwrap();
        assert!(matches!(response.post_process[0].status, OutcomeStatus::Skipped(_)));
    }
}
