use num_enum::{IntoPrimitive, TryFromPrimitive};

/// This parameter is used to indicate the version of the SMPP protocol.
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum InterfaceVersion {
    SmppV33 = 0x33,
    #[default]
    SmppV34 = 0x34,
}

impl InterfaceVersion {
    /// Peers announcing anything else are treated as 3.4.
    pub fn from_octet(value: u8) -> Self {
        Self::try_from(value).unwrap_or_default()
    }
}
