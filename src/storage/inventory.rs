//! Channel metadata from StationXML
//!
//! Only the parts needed to annotate retrieved traces are kept: the channel
//! epoch and its overall instrument sensitivity.
//!
//! ```text
//! FDSNStationXML
//!   └─ Network code
//!        └─ Station code
//!             └─ Channel code locationCode startDate endDate
//!                  └─ Response
//!                       └─ InstrumentSensitivity
//!                            ├─ Value
//!                            ├─ Frequency
//!                            └─ InputUnits/Name
//! ```

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{parse_time, Nslc, Stream};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Response summary of one channel epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResponse {
    pub id: Nslc,
    /// Epoch start, open when absent
    pub start: Option<DateTime<Utc>>,
    /// Epoch end (exclusive), open when absent
    pub end: Option<DateTime<Utc>>,
    /// Overall sensitivity (counts per input unit)
    pub sensitivity: Option<f64>,
    /// Frequency at which the sensitivity is valid
    pub frequency: Option<f64>,
    pub input_units: Option<String>,
}

impl ChannelResponse {
    pub fn new(id: Nslc) -> Self {
        Self {
            id,
            start: None,
            end: None,
            sensitivity: None,
            frequency: None,
            input_units: None,
        }
    }

    /// Whether the epoch covers `t`
    pub fn covers(&self, t: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| s <= t) && self.end.map_or(true, |e| t < e)
    }
}

/// Set of channel responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    channels: Vec<ChannelResponse>,
}

impl Inventory {
    pub fn new(channels: Vec<ChannelResponse>) -> Self {
        Self { channels }
    }

    /// Read and parse a StationXML file
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path)?;
        let inventory = Self::from_stationxml(&xml)?;
        tracing::debug!(path = %path.display(), channels = inventory.len(), "Loaded inventory");
        Ok(inventory)
    }

    /// Parse StationXML text
    pub fn from_stationxml(xml: &str) -> StorageResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut path: Vec<String> = Vec::new();
        let mut network = String::new();
        let mut station = String::new();
        let mut current: Option<ChannelResponse> = None;
        let mut channels = Vec::new();
        let mut saw_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    if path.is_empty() {
                        saw_root = name == "FDSNStationXML";
                    }
                    match name.as_str() {
                        "Network" => network = attribute(&e, "code")?.unwrap_or_default(),
                        "Station" => station = attribute(&e, "code")?.unwrap_or_default(),
                        "Channel" => current = Some(channel_from(&e, &network, &station)?),
                        _ => {}
                    }
                    path.push(name);
                }
                Event::Empty(e) => {
                    if local_name(&e) == "Channel" {
                        channels.push(channel_from(&e, &network, &station)?);
                    }
                }
                Event::Text(t) => {
                    if let Some(channel) = current.as_mut() {
                        let text = t.unescape()?;
                        apply_text(channel, &path, text.trim())?;
                    }
                }
                Event::End(_) => {
                    if path.pop().as_deref() == Some("Channel") {
                        channels.extend(current.take());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(StorageError::Inventory(
                "document is not FDSN StationXML".to_string(),
            ));
        }

        Ok(Self { channels })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[ChannelResponse] {
        &self.channels
    }

    /// Response of `id` whose epoch covers `t`
    pub fn find(&self, id: &Nslc, t: DateTime<Utc>) -> Option<&ChannelResponse> {
        self.channels.iter().find(|c| &c.id == id && c.covers(t))
    }

    /// Attach a response to every trace with a matching channel epoch
    ///
    /// Returns the ids of traces left without a response.
    pub fn attach(&self, stream: &mut Stream) -> Vec<Nslc> {
        let mut unmatched = Vec::new();
        for trace in stream.iter_mut() {
            match self.find(&trace.id, trace.start) {
                Some(response) => trace.response = Some(response.clone()),
                None => unmatched.push(trace.id.clone()),
            }
        }
        unmatched
    }
}

impl FromIterator<ChannelResponse> for Inventory {
    fn from_iter<I: IntoIterator<Item = ChannelResponse>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> StorageResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| StorageError::Inventory(err.to_string()))?;
        if attr.key.local_name().as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn time_attribute(e: &BytesStart<'_>, key: &str) -> StorageResult<Option<DateTime<Utc>>> {
    match attribute(e, key)? {
        None => Ok(None),
        Some(raw) => parse_time(&raw)
            .map(Some)
            .ok_or_else(|| StorageError::Inventory(format!("invalid {} {:?}", key, raw))),
    }
}

fn channel_from(e: &BytesStart<'_>, network: &str, station: &str) -> StorageResult<ChannelResponse> {
    let code = attribute(e, "code")?
        .ok_or_else(|| StorageError::Inventory("channel without code".to_string()))?;
    let location = attribute(e, "locationCode")?.unwrap_or_default();

    let mut channel = ChannelResponse::new(Nslc::new(network, station, location.trim(), code));
    channel.start = time_attribute(e, "startDate")?;
    channel.end = time_attribute(e, "endDate")?;
    Ok(channel)
}

fn apply_text(channel: &mut ChannelResponse, path: &[String], text: &str) -> StorageResult<()> {
    let tail: Vec<&str> = path.iter().rev().take(3).map(String::as_str).collect();
    let number = || {
        text.parse::<f64>()
            .map_err(|_| StorageError::Inventory(format!("invalid number {:?}", text)))
    };

    match tail.as_slice() {
        ["Value", "InstrumentSensitivity", ..] => channel.sensitivity = Some(number()?),
        ["Frequency", "InstrumentSensitivity", ..] => channel.frequency = Some(number()?),
        ["Name", "InputUnits", "InstrumentSensitivity"] => {
            channel.input_units = Some(text.to_string())
        }
        _ => {}
    }
    Ok(())
}
