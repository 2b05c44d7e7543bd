// ABOUTME: Body formats understood by the gateway and their data_coding octets
// ABOUTME: Maps inbound data_coding values onto the format reported to observers

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// Format of a message body, as exchanged with the gateway's callers.
///
/// The discriminant is the data_coding octet written into outbound
/// submit_sm/deliver_sm/data_sm PDUs.
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum BodyFormat {
    /// GSM default alphabet / IA5
    #[default]
    Ascii = 0x00,
    /// Octet data, carried to and from callers as hex text
    Binary = 0x02,
    /// ISO-8859-1
    Latin = 0x03,
    /// UCS-2, big endian
    Unicode = 0x08,
    /// WAP push Service Indication wrapping a URL
    WapPush = 0xF5,
}

impl BodyFormat {
    /// Classify an inbound data_coding value.
    ///
    /// 0 and 1 are both treated as the default alphabet. Codings the gateway
    /// does not render as text are reported as binary.
    pub fn from_data_coding(data_coding: u8) -> Self {
        match data_coding {
            0x00 | 0x01 => BodyFormat::Ascii,
            0x03 => BodyFormat::Latin,
            0x08 => BodyFormat::Unicode,
            0xF5 => BodyFormat::WapPush,
            _ => BodyFormat::Binary,
        }
    }

    pub fn data_coding(&self) -> u8 {
        (*self).into()
    }

    pub fn name(&self) -> &'static str {
        match self {
            BodyFormat::Ascii => "ascii",
            BodyFormat::Binary => "binary",
            BodyFormat::Latin => "latin",
            BodyFormat::Unicode => "unicode",
            BodyFormat::WapPush => "wap_push",
        }
    }
}

impl fmt::Display for BodyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown body format: {0}")]
pub struct UnknownBodyFormat(pub String);

impl FromStr for BodyFormat {
    type Err = UnknownBodyFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" => Ok(BodyFormat::Ascii),
            "binary" => Ok(BodyFormat::Binary),
            "latin" => Ok(BodyFormat::Latin),
            "unicode" => Ok(BodyFormat::Unicode),
            "wap_push" => Ok(BodyFormat::WapPush),
            _ => Err(UnknownBodyFormat(s.to_string())),
        }
    }
}
