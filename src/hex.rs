// ABOUTME: Byte buffer to hexadecimal text conversion used for PDU tracing and test vectors
// ABOUTME: Also provides the single-byte ISO-8859-1 text helpers used for addresses and bodies

use thiserror::Error;

/// Strict hex decoding failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    #[error("hex string has odd length: {0}")]
    OddLength(usize),

    #[error("invalid hex digit {digit:?} at offset {offset}")]
    InvalidDigit { digit: char, offset: usize },
}

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Render bytes as uppercase hex, two characters per byte.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Parse a hex string, rejecting odd lengths and non-hex digits.
///
/// ASCII whitespace between pairs is ignored so conformance vectors can be
/// written with spaces.
pub fn decode(hex: &str) -> Result<Vec<u8>, HexError> {
    let digits: Vec<(usize, u8)> = hex
        .bytes()
        .enumerate()
        .filter(|(_, c)| !c.is_ascii_whitespace())
        .collect();

    if digits.len() % 2 != 0 {
        return Err(HexError::OddLength(digits.len()));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let (hi_at, hi) = pair[0];
            let (lo_at, lo) = pair[1];
            let hi = nibble(hi).ok_or(HexError::InvalidDigit {
                digit: hi as char,
                offset: hi_at,
            })?;
            let lo = nibble(lo).ok_or(HexError::InvalidDigit {
                digit: lo as char,
                offset: lo_at,
            })?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

/// Legacy tolerant decoding: a malformed pair yields a zero byte and a
/// trailing odd digit is dropped.
pub fn decode_lenient(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks_exact(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => (hi << 4) | lo,
            _ => 0,
        })
        .collect()
}

/// Encode text as ISO-8859-1, one byte per character. Characters outside
/// the Latin-1 range become `?`.
pub fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Decode ISO-8859-1 bytes; every byte maps to exactly one character.
pub fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Text to Latin-1 hex, the default wire form for ids, addresses and bodies.
pub fn text_to_hex(text: &str) -> String {
    encode(&latin1_bytes(text))
}

/// Inverse of [`text_to_hex`]; tolerant of malformed pairs.
pub fn hex_to_text(hex: &str) -> String {
    latin1_string(&decode_lenient(hex))
}
