// ABOUTME: Splits outbound bodies into concatenated SMS segments and reassembles inbound ones
// ABOUTME: Segments carry a six octet User Data Header (05 00 03 ref total index)

use crate::datatypes::{BodyFormat, ESM_CLASS_UDHI, MAX_SHORT_MESSAGE_LENGTH};
use crate::{gsm, hex};
use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use rand::Rng;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const SINGLE_ASCII_LENGTH: usize = 160;
pub const ASCII_SPLIT_BASE: usize = 153;
pub const SINGLE_UCS2_LENGTH: usize = 70;
pub const UCS2_SPLIT_BASE: usize = 63;
pub const SINGLE_OCTET_LENGTH: usize = 140;
pub const OCTET_SPLIT_BASE: usize = 134;

/// Default time an incomplete multipart set is kept
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

/// What to do with a body longer than one short message
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum LargeMessageMethod {
    /// Refuse bodies over the single part limit
    Reject = 0,
    /// Concatenated SMS with a User Data Header per part
    #[default]
    Multipart = 1,
    /// Whole body in the message_payload TLV
    Payload = 2,
    /// Cut the body at the single part limit
    Truncate = 3,
}

impl LargeMessageMethod {
    /// Method for a configured code; codes outside 1..=3 reject.
    pub fn from_code(code: u8) -> Self {
        LargeMessageMethod::try_from(code).unwrap_or(LargeMessageMethod::Reject)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("body of {length} units exceeds the single part limit of {limit}")]
    TooLong { length: usize, limit: usize },

    #[error("split base must be at least 1")]
    InvalidSplitBase,

    #[error("body needs {0} parts, a concatenated message holds at most 255")]
    TooManyParts(usize),
}

/// Concatenation header of one segment
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Udh {
    pub reference: u8,
    pub total: u8,
    /// 1-based position of this part
    pub index: u8,
}

impl Udh {
    pub const SIZE: usize = 6;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [0x05, 0x00, 0x03, self.reference, self.total, self.index]
    }

    /// Read a concatenation header from the front of `data`
    pub fn parse(data: &[u8]) -> Option<Self> {
        match data {
            [0x05, 0x00, 0x03, reference, total, index, ..] => Some(Udh {
                reference: *reference,
                total: *total,
                index: *index,
            }),
            _ => None,
        }
    }
}

/// Part-size limits, in the units of each body format
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub single_ascii: usize,
    pub split_ascii: usize,
    pub single_ucs2: usize,
    pub split_ucs2: usize,
    pub single_octet: usize,
    pub split_octet: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            single_ascii: SINGLE_ASCII_LENGTH,
            split_ascii: ASCII_SPLIT_BASE,
            single_ucs2: SINGLE_UCS2_LENGTH,
            split_ucs2: UCS2_SPLIT_BASE,
            single_octet: SINGLE_OCTET_LENGTH,
            split_octet: OCTET_SPLIT_BASE,
        }
    }
}

impl Limits {
    fn for_format(&self, format: BodyFormat) -> (usize, usize) {
        match format {
            BodyFormat::Ascii => (self.single_ascii, self.split_ascii),
            BodyFormat::Unicode => (self.single_ucs2, self.split_ucs2),
            BodyFormat::Latin | BodyFormat::Binary | BodyFormat::WapPush => {
                (self.single_octet, self.split_octet)
            }
        }
    }
}

/// Per-call segmentation settings
#[derive(Clone, Debug)]
pub struct SegmentOptions {
    pub method: LargeMessageMethod,
    pub limits: Limits,
    /// Pack default-alphabet text into septets
    pub use_8bit: bool,
    /// Reference shared by all parts of this message
    pub reference: u8,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            method: LargeMessageMethod::default(),
            limits: Limits::default(),
            use_8bit: false,
            reference: random_reference(),
        }
    }
}

impl SegmentOptions {
    pub fn with_method(mut self, method: LargeMessageMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_ascii_split_base(mut self, split_base: usize) -> Self {
        self.limits.split_ascii = split_base;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_8bit(mut self, use_8bit: bool) -> Self {
        self.use_8bit = use_8bit;
        self
    }

    pub fn with_reference(mut self, reference: u8) -> Self {
        self.reference = reference;
        self
    }
}

/// A random concatenation reference in 1..=254
pub fn random_reference() -> u8 {
    rand::thread_rng().gen_range(1..=254)
}

/// One short message worth of encoded user data
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub udh: Option<Udh>,
    /// Encoded user data, concatenation header included
    pub user_data: Bytes,
    /// Carry `user_data` in the message_payload TLV instead of short_message
    pub in_payload: bool,
    pub esm_class: u8,
}

impl Segment {
    fn single(user_data: Vec<u8>, in_payload: bool, force_udhi: bool) -> Self {
        let udhi = force_udhi || user_data.starts_with(&[0x05, 0x00, 0x03]);
        Segment {
            udh: None,
            in_payload,
            esm_class: if udhi { ESM_CLASS_UDHI } else { 0 },
            user_data: Bytes::from(user_data),
        }
    }
}

/// A body broken into the units its length limits count
enum Units {
    Chars(Vec<char>),
    Utf16(Vec<u16>),
    Octets(Vec<u8>),
}

impl Units {
    fn len(&self) -> usize {
        match self {
            Units::Chars(c) => c.len(),
            Units::Utf16(u) => u.len(),
            Units::Octets(o) => o.len(),
        }
    }

    fn truncate(&mut self, len: usize) {
        match self {
            Units::Chars(c) => c.truncate(len),
            Units::Utf16(u) => u.truncate(len),
            Units::Octets(o) => o.truncate(len),
        }
    }

    fn encode_range(&self, start: usize, end: usize, use_8bit: bool, fill_bits: u32) -> Vec<u8> {
        match self {
            Units::Chars(c) => {
                let text: String = c[start..end].iter().collect();
                if use_8bit {
                    gsm::pack_7bit_with_fill(&text, fill_bits)
                } else {
                    hex::latin1_bytes(&text)
                }
            }
            Units::Utf16(u) => u[start..end].iter().flat_map(|unit| unit.to_be_bytes()).collect(),
            Units::Octets(o) => o[start..end].to_vec(),
        }
    }
}

/// Encode `body` in `format`, splitting it according to `options.method`
/// when it exceeds the single part limit.
///
/// Bodies are text for ascii, latin and unicode. Binary bodies are hex text.
/// A wap_push body is a URL, or hex text already starting with `0605`.
pub fn segment(
    body: &str,
    format: BodyFormat,
    options: &SegmentOptions,
) -> Result<Vec<Segment>, SegmentError> {
    if format == BodyFormat::WapPush {
        let user_data = if body.starts_with("0605") {
            hex::decode_lenient(body)
        } else {
            gsm::wap_push_envelope(body)
        };
        let in_payload = user_data.len() > MAX_SHORT_MESSAGE_LENGTH;
        return Ok(vec![Segment::single(user_data, in_payload, true)]);
    }

    let use_8bit = options.use_8bit && format == BodyFormat::Ascii;
    let mut units = match format {
        BodyFormat::Ascii | BodyFormat::Latin => Units::Chars(body.chars().collect()),
        BodyFormat::Unicode => Units::Utf16(body.encode_utf16().collect()),
        _ => Units::Octets(hex::decode_lenient(body)),
    };
    let (single_limit, split_base) = options.limits.for_format(format);
    let length = units.len();

    if length <= single_limit {
        let user_data = units.encode_range(0, length, use_8bit, 0);
        return Ok(vec![Segment::single(user_data, false, false)]);
    }

    match options.method {
        LargeMessageMethod::Reject => Err(SegmentError::TooLong {
            length,
            limit: single_limit,
        }),
        LargeMessageMethod::Truncate => {
            units.truncate(single_limit);
            let user_data = units.encode_range(0, single_limit, use_8bit, 0);
            Ok(vec![Segment::single(user_data, false, false)])
        }
        LargeMessageMethod::Payload => {
            let user_data = units.encode_range(0, length, use_8bit, 0);
            Ok(vec![Segment::single(user_data, true, false)])
        }
        LargeMessageMethod::Multipart => {
            if split_base == 0 {
                return Err(SegmentError::InvalidSplitBase);
            }
            let total = length.div_ceil(split_base);
            if total > u8::MAX as usize {
                return Err(SegmentError::TooManyParts(total));
            }

            let parts = (0..total)
                .map(|i| {
                    let start = i * split_base;
                    let end = (start + split_base).min(length);
                    let udh = Udh {
                        reference: options.reference,
                        total: total as u8,
                        index: (i + 1) as u8,
                    };

                    let mut user_data = udh.to_bytes().to_vec();
                    user_data.extend(units.encode_range(start, end, use_8bit, 1));

                    Segment {
                        udh: Some(udh),
                        user_data: Bytes::from(user_data),
                        in_payload: false,
                        esm_class: ESM_CLASS_UDHI,
                    }
                })
                .collect();
            Ok(parts)
        }
    }
}

#[derive(Clone, Debug)]
struct BufferedPart {
    udh: Udh,
    body: String,
    received_at: Instant,
}

/// Inbound segments waiting for the rest of their set.
///
/// Sets are keyed by reference alone. A repeated part index replaces the
/// earlier copy.
#[derive(Debug)]
pub struct MultipartBuffer {
    parts: Vec<BufferedPart>,
    retention: Duration,
}

impl Default for MultipartBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl MultipartBuffer {
    pub fn new(retention: Duration) -> Self {
        Self {
            parts: Vec::new(),
            retention,
        }
    }

    /// Add one decoded part, returning the whole body once every part of the
    /// set has arrived.
    pub fn ingest(&mut self, udh: Udh, body: String) -> Option<String> {
        self.ingest_at(udh, body, Instant::now())
    }

    pub fn ingest_at(&mut self, udh: Udh, body: String, now: Instant) -> Option<String> {
        self.expire(now);

        match self
            .parts
            .iter_mut()
            .find(|p| p.udh.reference == udh.reference && p.udh.index == udh.index)
        {
            Some(existing) => {
                existing.udh = udh;
                existing.body = body;
                existing.received_at = now;
            }
            None => self.parts.push(BufferedPart {
                udh,
                body,
                received_at: now,
            }),
        }

        let received = self
            .parts
            .iter()
            .filter(|p| p.udh.reference == udh.reference)
            .count();
        if received < udh.total as usize {
            return None;
        }

        let (mut set, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.parts)
            .into_iter()
            .partition(|p| p.udh.reference == udh.reference);
        self.parts = rest;

        set.sort_by_key(|p| p.udh.index);
        Some(set.into_iter().map(|p| p.body).collect())
    }

    /// Drop sets whose newest part is older than the retention window.
    /// Returns the references dropped.
    pub fn expire(&mut self, now: Instant) -> Vec<u8> {
        let retention = self.retention;
        let mut stale: Vec<u8> = self
            .parts
            .iter()
            .map(|p| p.udh.reference)
            .filter(|reference| {
                self.parts
                    .iter()
                    .filter(|p| p.udh.reference == *reference)
                    .all(|p| now.saturating_duration_since(p.received_at) > retention)
            })
            .collect();
        stale.sort_unstable();
        stale.dedup();

        if !stale.is_empty() {
            self.parts.retain(|p| !stale.contains(&p.udh.reference));
        }
        stale
    }

    /// Number of parts buffered across all sets
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }
}
