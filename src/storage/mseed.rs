//! miniSEED 2 record codec
//!
//! Segment files hold fixed-length miniSEED records laid back to back. An
//! index byte range covers one or more whole records of a single channel.
//!
//! Layout of one record:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ FIXED HEADER (48 bytes)                 │
//! │   sequence: [u8; 6]   quality: u8       │
//! │   station: [u8; 5]    location: [u8; 2] │
//! │   channel: [u8; 3]    network: [u8; 2]  │
//! │   start: BTIME (10 bytes)               │
//! │   sample_count: u16                     │
//! │   rate_factor: i16  rate_multiplier: i16│
//! │   flags: [u8; 3]  blockette_count: u8   │
//! │   time_correction: i32                  │
//! │   data_offset: u16  blockette_offset:u16│
//! ├─────────────────────────────────────────┤
//! │ BLOCKETTES                              │
//! │   1000: encoding, word order, length    │
//! │   100:  actual sample rate (optional)   │
//! ├─────────────────────────────────────────┤
//! │ DATA (from data_offset to record end)   │
//! └─────────────────────────────────────────┘
//! ```

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{offset_seconds, Nslc, Samples, Trace};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};

/// Fixed header size in bytes
const FIXED_HEADER_LEN: usize = 48;

/// Data offset used when writing (header + blockette 1000, 64-byte aligned)
const WRITE_DATA_OFFSET: usize = 64;

/// Steim frame size in bytes
const STEIM_FRAME_LEN: usize = 64;

/// Activity flag: time correction already applied
const TIME_CORRECTION_APPLIED: u8 = 0x02;

/// Sample encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Encoding {
    Int16 = 1,
    Int32 = 3,
    Float32 = 4,
    Float64 = 5,
    Steim1 = 10,
    Steim2 = 11,
}

impl TryFrom<u8> for Encoding {
    type Error = StorageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Encoding::Int16),
            3 => Ok(Encoding::Int32),
            4 => Ok(Encoding::Float32),
            5 => Ok(Encoding::Float64),
            10 => Ok(Encoding::Steim1),
            11 => Ok(Encoding::Steim2),
            other => Err(StorageError::UnsupportedEncoding(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Big,
    Little,
}

/// Bounds-checked reads with a fixed byte order
struct Bytes<'a> {
    buf: &'a [u8],
    order: ByteOrder,
}

impl<'a> Bytes<'a> {
    fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self { buf, order }
    }

    fn array<const N: usize>(&self, at: usize) -> StorageResult<[u8; N]> {
        let slice = self
            .buf
            .get(at..at + N)
            .ok_or_else(|| StorageError::Corruption(format!("read of {} bytes at {} past end", N, at)))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        if self.order == ByteOrder::Little {
            out.reverse();
        }
        Ok(out)
    }

    fn u8(&self, at: usize) -> StorageResult<u8> {
        self.buf
            .get(at)
            .copied()
            .ok_or_else(|| StorageError::Corruption(format!("read at {} past end", at)))
    }

    fn u16(&self, at: usize) -> StorageResult<u16> {
        Ok(u16::from_be_bytes(self.array(at)?))
    }

    fn i16(&self, at: usize) -> StorageResult<i16> {
        Ok(i16::from_be_bytes(self.array(at)?))
    }

    fn u32(&self, at: usize) -> StorageResult<u32> {
        Ok(u32::from_be_bytes(self.array(at)?))
    }

    fn i32(&self, at: usize) -> StorageResult<i32> {
        Ok(i32::from_be_bytes(self.array(at)?))
    }

    fn f32(&self, at: usize) -> StorageResult<f32> {
        Ok(f32::from_be_bytes(self.array(at)?))
    }

    fn f64(&self, at: usize) -> StorageResult<f64> {
        Ok(f64::from_be_bytes(self.array(at)?))
    }
}

/// Parsed fixed header and blockettes of one record
#[derive(Debug, Clone)]
pub struct RecordHeader {
    pub id: Nslc,
    pub quality: char,
    pub start: DateTime<Utc>,
    pub sample_count: usize,
    pub sample_rate: f64,
    pub encoding: u8,
    pub record_len: usize,
    pub data_offset: usize,
    data_order: ByteOrder,
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn detect_order(rec: &[u8]) -> StorageResult<ByteOrder> {
    let plausible = |year: u16, day: u16| (1900..=2100).contains(&year) && (1..=366).contains(&day);

    for order in [ByteOrder::Big, ByteOrder::Little] {
        let b = Bytes::new(rec, order);
        if plausible(b.u16(20)?, b.u16(22)?) {
            return Ok(order);
        }
    }
    Err(StorageError::InvalidRecord(
        "start time is not plausible in either byte order".to_string(),
    ))
}

fn rate_from_factors(factor: i16, multiplier: i16) -> f64 {
    let (f, m) = (f64::from(factor), f64::from(multiplier));
    match (factor.signum(), multiplier.signum()) {
        (1, 1) => f * m,
        (1, -1) => -f / m,
        (-1, 1) => -m / f,
        (-1, -1) => 1.0 / (f * m),
        _ => 0.0,
    }
}

/// Parse the header of the record at the start of `rec`
pub fn parse_header(rec: &[u8]) -> StorageResult<RecordHeader> {
    if rec.len() < FIXED_HEADER_LEN {
        return Err(StorageError::Corruption(format!(
            "{} bytes is shorter than a record header",
            rec.len()
        )));
    }

    let quality = rec[6] as char;
    if !matches!(quality, 'D' | 'R' | 'Q' | 'M') {
        return Err(StorageError::InvalidRecord(format!(
            "unknown quality indicator {:?}",
            quality
        )));
    }

    let order = detect_order(rec)?;
    let b = Bytes::new(rec, order);

    let id = Nslc::new(
        ascii_field(&rec[18..20]),
        ascii_field(&rec[8..13]),
        ascii_field(&rec[13..15]),
        ascii_field(&rec[15..18]),
    );

    let year = b.u16(20)?;
    let day = b.u16(22)?;
    let ticks = b.u16(28)?;
    let start = NaiveDate::from_yo_opt(i32::from(year), u32::from(day))
        .and_then(|d| d.and_hms_opt(u32::from(rec[24]), u32::from(rec[25]), 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| StorageError::InvalidRecord("invalid start time".to_string()))?;
    let mut start = start
        + Duration::seconds(i64::from(rec[26]))
        + Duration::microseconds(i64::from(ticks) * 100);

    let sample_count = usize::from(b.u16(30)?);
    let factor = b.i16(32)?;
    let multiplier = b.i16(34)?;
    let activity = rec[36];
    let blockette_count = rec[39];
    let time_correction = b.i32(40)?;
    let data_offset = usize::from(b.u16(44)?);
    let mut next_blockette = usize::from(b.u16(46)?);

    let mut b1000: Option<(u8, u8, u8)> = None;
    let mut actual_rate: Option<f64> = None;

    for _ in 0..blockette_count {
        if next_blockette < FIXED_HEADER_LEN || next_blockette + 4 > rec.len() {
            break;
        }
        let kind = b.u16(next_blockette)?;
        let following = usize::from(b.u16(next_blockette + 2)?);
        match kind {
            1000 => {
                b1000 = Some((
                    b.u8(next_blockette + 4)?,
                    b.u8(next_blockette + 5)?,
                    b.u8(next_blockette + 6)?,
                ));
            }
            100 => actual_rate = Some(f64::from(b.f32(next_blockette + 4)?)),
            _ => {}
        }
        if following == 0 || following <= next_blockette {
            break;
        }
        next_blockette = following;
    }

    let (encoding, word_order, exponent) = b1000
        .ok_or_else(|| StorageError::InvalidRecord("missing blockette 1000".to_string()))?;

    if !(7..=20).contains(&exponent) {
        return Err(StorageError::InvalidRecord(format!(
            "record length exponent {} out of range",
            exponent
        )));
    }
    let record_len = 1usize << exponent;
    if record_len > rec.len() {
        return Err(StorageError::Corruption(format!(
            "record of {} bytes truncated to {}",
            record_len,
            rec.len()
        )));
    }
    if sample_count > 0 && (data_offset < FIXED_HEADER_LEN || data_offset >= record_len) {
        return Err(StorageError::InvalidRecord(format!(
            "data offset {} outside record",
            data_offset
        )));
    }

    if activity & TIME_CORRECTION_APPLIED == 0 && time_correction != 0 {
        start += Duration::microseconds(i64::from(time_correction) * 100);
    }

    Ok(RecordHeader {
        id,
        quality,
        start,
        sample_count,
        sample_rate: actual_rate.unwrap_or_else(|| rate_from_factors(factor, multiplier)),
        encoding,
        record_len,
        data_offset,
        data_order: if word_order == 0 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        },
    })
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn unpack(word: u32, bits: u32, count: u32, out: &mut Vec<i32>) {
    let mask = (1u32 << bits) - 1;
    for i in (0..count).rev() {
        out.push(sign_extend((word >> (i * bits)) & mask, bits));
    }
}

fn decode_steim(data: &[u8], count: usize, order: ByteOrder, steim2: bool) -> StorageResult<Vec<i32>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let b = Bytes::new(data, order);
    let mut diffs: Vec<i32> = Vec::with_capacity(count + 8);
    let mut first = None;
    let mut last = None;

    for frame in 0..data.len() / STEIM_FRAME_LEN {
        let base = frame * STEIM_FRAME_LEN;
        let control = b.u32(base)?;

        for w in 1..16 {
            let nibble = (control >> (30 - 2 * w)) & 0x3;
            let word = b.u32(base + 4 * w as usize)?;

            if frame == 0 && w == 1 {
                first = Some(word as i32);
                continue;
            }
            if frame == 0 && w == 2 {
                last = Some(word as i32);
                continue;
            }

            match (nibble, steim2) {
                (0, _) => {}
                (1, _) => unpack(word, 8, 4, &mut diffs),
                (2, false) => unpack(word, 16, 2, &mut diffs),
                (3, false) => diffs.push(word as i32),
                (2, true) => match word >> 30 {
                    1 => unpack(word, 30, 1, &mut diffs),
                    2 => unpack(word, 15, 2, &mut diffs),
                    3 => unpack(word, 10, 3, &mut diffs),
                    d => {
                        return Err(StorageError::Corruption(format!(
                            "invalid Steim-2 decode nibble {} for code 2",
                            d
                        )))
                    }
                },
                (3, true) => match word >> 30 {
                    0 => unpack(word, 6, 5, &mut diffs),
                    1 => unpack(word, 5, 6, &mut diffs),
                    2 => unpack(word, 4, 7, &mut diffs),
                    d => {
                        return Err(StorageError::Corruption(format!(
                            "invalid Steim-2 decode nibble {} for code 3",
                            d
                        )))
                    }
                },
                _ => unreachable!("two-bit nibble"),
            }
        }

        if diffs.len() >= count {
            break;
        }
    }

    let first = first.ok_or_else(|| StorageError::Corruption("empty Steim data".to_string()))?;
    if diffs.len() < count {
        return Err(StorageError::Corruption(format!(
            "Steim frames hold {} differences, header says {} samples",
            diffs.len(),
            count
        )));
    }

    let mut samples = Vec::with_capacity(count);
    samples.push(first);
    for d in &diffs[1..count] {
        let prev = samples[samples.len() - 1];
        samples.push(i32::wrapping_add(prev, *d));
    }

    if let (Some(expected), Some(&actual)) = (last, samples.last()) {
        if expected != actual {
            tracing::warn!(expected, actual, "Steim reverse integration constant mismatch");
        }
    }

    Ok(samples)
}

fn decode_fixed<T, const N: usize>(
    data: &[u8],
    count: usize,
    order: ByteOrder,
    read: impl Fn([u8; N]) -> T,
) -> StorageResult<Vec<T>> {
    if data.len() < count * N {
        return Err(StorageError::Corruption(format!(
            "{} samples need {} bytes, record holds {}",
            count,
            count * N,
            data.len()
        )));
    }
    let b = Bytes::new(data, order);
    (0..count).map(|i| b.array::<N>(i * N).map(&read)).collect()
}

/// Decode the data section of a record
pub fn decode_samples(header: &RecordHeader, record: &[u8]) -> StorageResult<Samples> {
    let data = record
        .get(header.data_offset..header.record_len)
        .ok_or_else(|| StorageError::Corruption("data section outside record".to_string()))?;
    let n = header.sample_count;
    let order = header.data_order;

    Ok(match Encoding::try_from(header.encoding)? {
        Encoding::Int16 => Samples::Int(decode_fixed(data, n, order, |b| {
            i32::from(i16::from_be_bytes(b))
        })?),
        Encoding::Int32 => Samples::Int(decode_fixed(data, n, order, i32::from_be_bytes)?),
        Encoding::Float32 => Samples::Float(decode_fixed(data, n, order, f32::from_be_bytes)?),
        Encoding::Float64 => Samples::Double(decode_fixed(data, n, order, f64::from_be_bytes)?),
        Encoding::Steim1 => Samples::Int(decode_steim(data, n, order, false)?),
        Encoding::Steim2 => Samples::Int(decode_steim(data, n, order, true)?),
    })
}

/// Decode every record in `buf`, joining contiguous records of a channel
pub fn decode_records(buf: &[u8]) -> StorageResult<Vec<Trace>> {
    let mut traces: Vec<Trace> = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let rest = &buf[offset..];
        let header = parse_header(rest)?;
        let record = &rest[..header.record_len];
        offset += header.record_len;

        if header.sample_count == 0 || header.sample_rate <= 0.0 {
            continue;
        }

        let samples = decode_samples(&header, record)?;
        let mut trace = Trace::new(header.id, header.start, header.sample_rate, samples);
        trace.quality = Some(header.quality);

        match traces.last_mut() {
            Some(prev) if prev.is_contiguous_with(&trace) => {
                prev.append(trace);
            }
            _ => traces.push(trace),
        }
    }

    Ok(traces)
}

fn rate_to_factors(rate: f64) -> StorageResult<(i16, i16)> {
    let fits = |v: f64| v.fract().abs() < 1e-9 && v >= 1.0 && v <= f64::from(i16::MAX);

    if fits(rate) {
        return Ok((rate as i16, 1));
    }
    if rate > 0.0 && rate < 1.0 {
        let period = (1.0 / rate * 1e6).round() / 1e6;
        if fits(period) {
            return Ok((-(period as i16), 1));
        }
    }
    for scale in [10.0, 100.0, 1000.0] {
        let scaled = (rate * scale * 1e6).round() / 1e6;
        if fits(scaled) {
            return Ok((scaled as i16, -(scale as i16)));
        }
    }
    Err(StorageError::UnsupportedSampleRate(rate))
}

fn put_code(out: &mut [u8], code: &str, what: &str) -> StorageResult<()> {
    if code.len() > out.len() || !code.is_ascii() {
        return Err(StorageError::InvalidRecord(format!(
            "{} code {:?} does not fit in {} ASCII bytes",
            what,
            code,
            out.len()
        )));
    }
    out.fill(b' ');
    out[..code.len()].copy_from_slice(code.as_bytes());
    Ok(())
}

/// Encode a trace as big-endian, uncompressed records of `record_len` bytes
///
/// Integer samples are written as INT32, float as FLOAT32, double as FLOAT64.
pub fn encode_trace(trace: &Trace, record_len: usize, first_sequence: u32) -> StorageResult<Vec<u8>> {
    if !record_len.is_power_of_two() || !(256..=4096).contains(&record_len) {
        return Err(StorageError::InvalidRecord(format!(
            "record length {} must be a power of two in 256..=4096",
            record_len
        )));
    }

    let (encoding, width, bytes): (Encoding, usize, Vec<u8>) = match &trace.samples {
        Samples::Int(v) => (Encoding::Int32, 4, v.iter().flat_map(|x| x.to_be_bytes()).collect()),
        Samples::Float(v) => (Encoding::Float32, 4, v.iter().flat_map(|x| x.to_be_bytes()).collect()),
        Samples::Double(v) => (Encoding::Float64, 8, v.iter().flat_map(|x| x.to_be_bytes()).collect()),
    };

    let (factor, multiplier) = rate_to_factors(trace.sample_rate)?;
    let per_record = (record_len - WRITE_DATA_OFFSET) / width;
    let exponent = record_len.trailing_zeros() as u8;
    let mut out = Vec::with_capacity(trace.len().div_ceil(per_record) * record_len);

    for (k, chunk) in bytes.chunks(per_record * width).enumerate() {
        let mut rec = vec![0u8; record_len];
        let sequence = (first_sequence as usize + k) % 1_000_000;
        rec[0..6].copy_from_slice(format!("{:06}", sequence).as_bytes());
        rec[6] = trace.quality.unwrap_or('D') as u8;
        rec[7] = b' ';
        put_code(&mut rec[8..13], &trace.id.station, "station")?;
        put_code(&mut rec[13..15], &trace.id.location, "location")?;
        put_code(&mut rec[15..18], &trace.id.channel, "channel")?;
        put_code(&mut rec[18..20], &trace.id.network, "network")?;

        let start = offset_seconds(trace.start, (k * per_record) as f64 * trace.delta());
        rec[20..22].copy_from_slice(&(start.year() as u16).to_be_bytes());
        rec[22..24].copy_from_slice(&(start.ordinal() as u16).to_be_bytes());
        rec[24] = start.hour() as u8;
        rec[25] = start.minute() as u8;
        rec[26] = start.second() as u8;
        rec[28..30].copy_from_slice(&((start.nanosecond() % 1_000_000_000 / 100_000) as u16).to_be_bytes());

        rec[30..32].copy_from_slice(&((chunk.len() / width) as u16).to_be_bytes());
        rec[32..34].copy_from_slice(&factor.to_be_bytes());
        rec[34..36].copy_from_slice(&multiplier.to_be_bytes());
        rec[39] = 1;
        rec[44..46].copy_from_slice(&(WRITE_DATA_OFFSET as u16).to_be_bytes());
        rec[46..48].copy_from_slice(&(FIXED_HEADER_LEN as u16).to_be_bytes());

        rec[48..50].copy_from_slice(&1000u16.to_be_bytes());
        rec[52] = encoding as u8;
        rec[53] = 1;
        rec[54] = exponent;

        rec[WRITE_DATA_OFFSET..WRITE_DATA_OFFSET + chunk.len()].copy_from_slice(chunk);
        out.extend_from_slice(&rec);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap() + Duration::milliseconds(250)
    }

    fn int_trace(n: i32) -> Trace {
        Trace::new(
            Nslc::new("UW", "RCM", "", "HHZ"),
            t0(),
            100.0,
            Samples::Int((0..n).map(|i| i * 3 - 50).collect()),
        )
    }

    /// One 512-byte record whose data section is replaced by a Steim frame
    fn steim_record(encoding: Encoding, sample_count: u16, frame: [u32; 16]) -> Vec<u8> {
        let mut rec = encode_trace(&int_trace(1), 512, 1).unwrap();
        rec[30..32].copy_from_slice(&sample_count.to_be_bytes());
        rec[52] = encoding as u8;
        for (i, word) in frame.iter().enumerate() {
            let at = WRITE_DATA_OFFSET + i * 4;
            rec[at..at + 4].copy_from_slice(&word.to_be_bytes());
        }
        rec
    }

    #[test]
    fn test_header_fields() {
        let rec = encode_trace(&int_trace(10), 512, 7).unwrap();
        let header = parse_header(&rec).unwrap();

        assert_eq!(&rec[0..6], b"000007");
        assert_eq!(header.id, Nslc::new("UW", "RCM", "", "HHZ"));
        assert_eq!(header.quality, 'D');
        assert_eq!(header.start, t0());
        assert_eq!(header.sample_count, 10);
        assert_eq!(header.sample_rate, 100.0);
        assert_eq!(header.record_len, 512);
        assert_eq!(header.encoding, Encoding::Int32 as u8);
    }

    #[test]
    fn test_multi_record_trace_decodes_as_one() {
        // (512 - 64) / 4 = 112 samples per record, so three records
        let trace = int_trace(300);
        let buf = encode_trace(&trace, 512, 1).unwrap();
        assert_eq!(buf.len(), 3 * 512);

        let decoded = decode_records(&buf).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].samples, trace.samples);
        assert_eq!(decoded[0].start, trace.start);
        assert_eq!(decoded[0].quality, Some('D'));
    }

    #[test]
    fn test_double_samples_and_fractional_rates() {
        let mut trace = int_trace(0);
        trace.samples = Samples::Double(vec![0.5, -1.25, 3.0]);
        trace.sample_rate = 12.5;

        let decoded = decode_records(&encode_trace(&trace, 256, 1).unwrap()).unwrap();
        assert_eq!(decoded[0].samples, trace.samples);
        assert_eq!(decoded[0].sample_rate, 12.5);

        trace.sample_rate = 0.1;
        let decoded = decode_records(&encode_trace(&trace, 256, 1).unwrap()).unwrap();
        assert!((decoded[0].sample_rate - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_little_endian_header_and_int16_data() {
        let mut rec = encode_trace(&int_trace(1), 256, 1).unwrap();
        // Rewrite header words little-endian
        for range in [20..22, 22..24, 28..30, 30..32, 32..34, 34..36, 44..46, 46..48, 48..50] {
            rec[range].reverse();
        }
        rec[30..32].copy_from_slice(&3u16.to_le_bytes());
        rec[52] = Encoding::Int16 as u8;
        rec[53] = 0;
        for (i, v) in [7i16, -8, 300].iter().enumerate() {
            let at = WRITE_DATA_OFFSET + i * 2;
            rec[at..at + 2].copy_from_slice(&v.to_le_bytes());
        }

        let decoded = decode_records(&rec).unwrap();
        assert_eq!(decoded[0].samples, Samples::Int(vec![7, -8, 300]));
        assert_eq!(decoded[0].start, t0());
    }

    #[test]
    fn test_steim1_frame() {
        let mut frame = [0u32; 16];
        frame[0] = 0x0180_0000; // w3: four 8-bit, w4: two 16-bit
        frame[1] = 10; // first sample
        frame[2] = 100; // last sample
        frame[3] = 0x0002_FD00; // 0, +2, -3, 0
        frame[4] = 0x005B_0000; // +91, 0

        let rec = steim_record(Encoding::Steim1, 5, frame);
        let decoded = decode_records(&rec).unwrap();
        assert_eq!(decoded[0].samples, Samples::Int(vec![10, 12, 9, 9, 100]));
    }

    #[test]
    fn test_steim2_frame() {
        let mut frame = [0u32; 16];
        frame[0] = 0x0380_0000; // w3: code 3, w4: code 2
        frame[1] = 5;
        frame[2] = (-11i32) as u32;
        frame[3] = 0x0007_E010; // five 6-bit: 0, +1, -2, 0, +16
        frame[4] = 0x7FFF_FFE1; // one 30-bit: -31

        let rec = steim_record(Encoding::Steim2, 6, frame);
        let decoded = decode_records(&rec).unwrap();
        assert_eq!(decoded[0].samples, Samples::Int(vec![5, 6, 4, 4, 20, -11]));
    }

    #[test]
    fn test_truncated_and_garbage_buffers() {
        let rec = encode_trace(&int_trace(10), 512, 1).unwrap();
        assert!(matches!(
            decode_records(&rec[..300]),
            Err(StorageError::Corruption(_))
        ));
        assert!(matches!(
            decode_records(&[b'x'; 64]),
            Err(StorageError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_unsupported_encoding() {
        let mut rec = encode_trace(&int_trace(10), 512, 1).unwrap();
        rec[52] = 19;
        assert!(matches!(
            decode_records(&rec),
            Err(StorageError::UnsupportedEncoding(19))
        ));
    }

    #[test]
    fn test_rate_factors() {
        assert_eq!(rate_to_factors(100.0).unwrap(), (100, 1));
        assert_eq!(rate_to_factors(0.1).unwrap(), (-10, 1));
        assert_eq!(rate_to_factors(12.5).unwrap(), (125, -10));
        assert!(rate_to_factors(1e9).is_err());

        assert_eq!(rate_from_factors(100, 1), 100.0);
        assert_eq!(rate_from_factors(-10, 1), 0.1);
        assert_eq!(rate_from_factors(125, -10), 12.5);
        assert_eq!(rate_from_factors(0, 1), 0.0);
    }
}
