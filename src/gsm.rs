// ABOUTME: GSM text transforms: 7-bit septet packing, UCS-2 big-endian and the WAP push envelope
// ABOUTME: Pure functions over bytes and strings with no protocol state

/// Pack 7-bit character codes into octets, least significant bit first.
///
/// Characters are truncated to their low seven bits. The final octet is
/// padded with zero bits.
pub fn pack_7bit(text: &str) -> Vec<u8> {
    pack_7bit_with_fill(text, 0)
}

/// Pack septets after `fill_bits` leading zero bits.
///
/// A six-octet concatenation header occupies 48 bits, so one fill bit puts
/// the first septet of the text on a septet boundary.
pub fn pack_7bit_with_fill(text: &str, fill_bits: u32) -> Vec<u8> {
    let septets = text.chars().count() as u32;
    let mut out = Vec::with_capacity(((septets * 7 + fill_bits + 7) / 8) as usize);
    let mut acc: u32 = 0;
    let mut bits = fill_bits % 8;

    for c in text.chars() {
        acc |= (u32::from(c) & 0x7F) << bits;
        bits += 7;
        while bits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }

    if bits > 0 {
        out.push(acc as u8);
    }

    out
}

/// Unpack octets into 7-bit characters.
///
/// Always yields `floor(8 * n / 7)` characters for `n` octets. When the
/// packed text was 7 characters short of a multiple of 8, the padding bits
/// form one extra septet and the result gains a trailing `'\0'`. Peers rely
/// on this, so it is not trimmed.
pub fn unpack_7bit(packed: &[u8]) -> String {
    unpack_7bit_with_fill(packed, 0)
}

/// Unpack septets that start after `fill_bits` leading bits.
pub fn unpack_7bit_with_fill(packed: &[u8], fill_bits: u32) -> String {
    let total_bits = (packed.len() as u32 * 8).saturating_sub(fill_bits);
    let count = (total_bits / 7) as usize;
    let mut out = String::with_capacity(count);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut skip = fill_bits;

    for &byte in packed {
        let mut value = u32::from(byte);
        let mut width = 8;
        if skip > 0 {
            let dropped = skip.min(8);
            value >>= dropped;
            width -= dropped;
            skip -= dropped;
        }

        acc |= value << bits;
        bits += width;

        while bits >= 7 && out.len() < count {
            out.push(char::from((acc & 0x7F) as u8));
            acc >>= 7;
            bits -= 7;
        }
    }

    out
}

/// Encode text as UCS-2 big-endian code units.
pub fn encode_ucs2(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

/// Decode big-endian UTF-16 code units. A trailing odd byte is ignored.
pub fn decode_ucs2(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Number of UTF-16 code units, the unit UCS-2 length limits are counted in.
pub fn ucs2_len(text: &str) -> usize {
    text.encode_utf16().count()
}

// WDP port header, WSP push PDU and SI document preamble up to the href attribute.
const WAP_PUSH_PREFIX: [u8; 17] = [
    0x06, 0x05, 0x04, 0x0B, 0x84, 0x23, 0xF0, 0x5F, 0x06, 0x01, 0xAE, 0x02, 0x05, 0x6A, 0x00,
    0x45, 0xC6,
];

const WAP_PUSH_SUFFIX: [u8; 6] = [0x07, 0x01, 0x03, 0x00, 0x01, 0x01];

/// Split a URL into its WBXML href token and the remaining text.
pub fn wap_href(url: &str) -> (u8, &str) {
    const PREFIXES: [(&str, u8); 4] = [
        ("http://www.", 0x0D),
        ("https://www.", 0x0F),
        ("http://", 0x0C),
        ("https://", 0x0E),
    ];

    PREFIXES
        .iter()
        .find_map(|&(prefix, token)| url.strip_prefix(prefix).map(|rest| (token, rest)))
        .unwrap_or((0x0C, url))
}

/// Wrap a URL in a Service Indication push envelope.
pub fn wap_push_envelope(url: &str) -> Vec<u8> {
    let (token, rest) = wap_href(url);
    let rest = crate::hex::latin1_bytes(rest);

    let mut out = Vec::with_capacity(WAP_PUSH_PREFIX.len() + rest.len() + 10);
    out.extend_from_slice(&WAP_PUSH_PREFIX);
    out.push(token);
    // inline string, terminated
    out.push(0x03);
    out.extend_from_slice(&rest);
    out.push(0x00);
    out.extend_from_slice(&WAP_PUSH_SUFFIX);
    out
}

/// True when the bytes already carry a WDP user data header.
pub fn is_wap_push(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x06, 0x05])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex;

    #[test]
    fn pack_hello() {
        // Classic GSM 03.38 example
        assert_eq!(hex::encode(&pack_7bit("hello")), "E8329BFD06");
    }

    #[test]
    fn pack_unpack_round_trip() {
        for text in ["", "a", "hello", "hellohello", "0123456789abcdef"] {
            assert_eq!(unpack_7bit(&pack_7bit(text)), text, "text {text:?}");
        }
    }

    #[test]
    fn unpack_adds_trailing_nul_at_seven_mod_eight() {
        let text = "My 7 bit message string";
        assert_eq!(text.len() % 8, 7);

        let packed = pack_7bit(text);
        assert_eq!(packed.len(), 21);
        assert_eq!(unpack_7bit(&packed), format!("{text}\0"));

        let seven = "1234567";
        assert_eq!(pack_7bit(seven).len(), 7);
        assert_eq!(unpack_7bit(&pack_7bit(seven)), "1234567\0");
    }

    #[test]
    fn eight_characters_fill_seven_octets_exactly() {
        let packed = pack_7bit("abcdefgh");
        assert_eq!(packed.len(), 7);
        assert_eq!(unpack_7bit(&packed), "abcdefgh");
    }

    #[test]
    fn fill_bit_alignment() {
        let text = "concatenated";
        let packed = pack_7bit_with_fill(text, 1);
        assert_eq!(packed.len(), (text.len() * 7 + 1).div_ceil(8));
        assert_eq!(unpack_7bit_with_fill(&packed, 1), text);
        assert_eq!(packed[0] & 0x01, 0);
    }

    #[test]
    fn ucs2_big_endian() {
        assert_eq!(encode_ucs2("Aø"), vec![0x00, 0x41, 0x00, 0xF8]);
        assert_eq!(decode_ucs2(&[0x04, 0x15, 0x04, 0x33, 0x00]), "Ег");
        assert_eq!(ucs2_len("Египет"), 6);
    }

    #[test]
    fn wap_href_tokens() {
        assert_eq!(wap_href("http://www.example.com"), (0x0D, "example.com"));
        assert_eq!(wap_href("https://www.example.com"), (0x0F, "example.com"));
        assert_eq!(wap_href("http://wap.job.am"), (0x0C, "wap.job.am"));
        assert_eq!(wap_href("https://wap.job.am"), (0x0E, "wap.job.am"));
        assert_eq!(wap_href("wap.job.am"), (0x0C, "wap.job.am"));
    }

    #[test]
    fn wap_envelope_layout() {
        let envelope = wap_push_envelope("http://wap.job.am");
        assert_eq!(
            hex::encode(&envelope),
            "0605040B8423F05F0601AE02056A0045C60C037761702E6A6F622E616D00070103000101"
        );
        assert!(is_wap_push(&envelope));
    }
}
