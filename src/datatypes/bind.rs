// ABOUTME: bind_transmitter, bind_receiver and bind_transceiver requests and their responses
// ABOUTME: The three bind flavours share one body layout, so a macro generates each pair

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, cstring_size, decode_cstring, decode_u8,
    encode_cstring,
};
use crate::datatypes::tlv::{self, Tlv, TlvMap};
use crate::datatypes::{
    CommandId, CommandStatus, InterfaceVersion, NumericPlanIndicator, TypeOfNumber,
};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;

/// Which way a bound session may carry messages
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindType {
    Transmitter,
    Receiver,
    Transceiver,
}

impl BindType {
    /// Pick the bind flavour for a session's direction flags.
    ///
    /// A session that neither sends nor receives has nothing to bind as.
    pub fn from_direction(can_send: bool, can_receive: bool) -> Option<Self> {
        match (can_send, can_receive) {
            (true, true) => Some(BindType::Transceiver),
            (true, false) => Some(BindType::Transmitter),
            (false, true) => Some(BindType::Receiver),
            (false, false) => None,
        }
    }

    pub fn can_send(&self) -> bool {
        matches!(self, BindType::Transmitter | BindType::Transceiver)
    }

    pub fn can_receive(&self) -> bool {
        matches!(self, BindType::Receiver | BindType::Transceiver)
    }

    pub fn command_id(&self) -> CommandId {
        match self {
            BindType::Transmitter => CommandId::BindTransmitter,
            BindType::Receiver => CommandId::BindReceiver,
            BindType::Transceiver => CommandId::BindTransceiver,
        }
    }

    pub fn response_id(&self) -> CommandId {
        match self {
            BindType::Transmitter => CommandId::BindTransmitterResp,
            BindType::Receiver => CommandId::BindReceiverResp,
            BindType::Transceiver => CommandId::BindTransceiverResp,
        }
    }

    /// Build the bind request frame for this flavour
    pub fn request(
        &self,
        sequence_number: u32,
        credentials: &BindCredentials,
    ) -> crate::codec::Frame {
        use crate::codec::Frame;

        match self {
            BindType::Transmitter => {
                Frame::BindTransmitter(BindTransmitter::from_credentials(sequence_number, credentials))
            }
            BindType::Receiver => {
                Frame::BindReceiver(BindReceiver::from_credentials(sequence_number, credentials))
            }
            BindType::Transceiver => {
                Frame::BindTransceiver(BindTransceiver::from_credentials(sequence_number, credentials))
            }
        }
    }

    /// Build the matching bind response frame
    pub fn response(
        &self,
        sequence_number: u32,
        command_status: CommandStatus,
        system_id: &str,
    ) -> crate::codec::Frame {
        use crate::codec::Frame;

        match self {
            BindType::Transmitter => Frame::BindTransmitterResp(BindTransmitterResponse {
                command_status,
                sequence_number,
                system_id: system_id.to_string(),
                tlvs: TlvMap::new(),
            }),
            BindType::Receiver => Frame::BindReceiverResp(BindReceiverResponse {
                command_status,
                sequence_number,
                system_id: system_id.to_string(),
                tlvs: TlvMap::new(),
            }),
            BindType::Transceiver => Frame::BindTransceiverResp(BindTransceiverResponse {
                command_status,
                sequence_number,
                system_id: system_id.to_string(),
                tlvs: TlvMap::new(),
            }),
        }
    }
}

/// Identity presented in a bind request
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindCredentials {
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub addr_ton: TypeOfNumber,
    pub addr_npi: NumericPlanIndicator,
}

macro_rules! bind_pdu_pair {
    ($request:ident, $response:ident, $request_id:expr, $response_id:expr) => {
        #[derive(Clone, Debug, PartialEq)]
        pub struct $request {
            pub command_status: CommandStatus,
            pub sequence_number: u32,

            // Body
            /// Identification of the ESME requesting to bind.
            pub system_id: String,

            /// Authentication password. An empty string is sent as a single
            /// NUL octet.
            pub password: String,

            /// Categorises the type of ESME, e.g. "VMS" or "OTA".
            pub system_type: String,

            pub interface_version: InterfaceVersion,

            /// Type of Number of the ESME address(es) served via this session.
            pub addr_ton: TypeOfNumber,

            /// Numbering Plan Indicator of the ESME address(es).
            pub addr_npi: NumericPlanIndicator,

            /// Range of SME addresses serviced by the ESME.
            pub address_range: String,
        }

        impl $request {
            pub fn new(
                sequence_number: u32,
                system_id: impl Into<String>,
                password: impl Into<String>,
                system_type: impl Into<String>,
            ) -> Self {
                Self {
                    command_status: CommandStatus::Ok,
                    sequence_number,
                    system_id: system_id.into(),
                    password: password.into(),
                    system_type: system_type.into(),
                    interface_version: InterfaceVersion::SmppV34,
                    addr_ton: TypeOfNumber::Unknown,
                    addr_npi: NumericPlanIndicator::Unknown,
                    address_range: String::new(),
                }
            }

            pub fn from_credentials(sequence_number: u32, credentials: &BindCredentials) -> Self {
                Self {
                    addr_ton: credentials.addr_ton,
                    addr_npi: credentials.addr_npi,
                    ..Self::new(
                        sequence_number,
                        credentials.system_id.as_str(),
                        credentials.password.as_str(),
                        credentials.system_type.as_str(),
                    )
                }
            }
        }

        impl Decodable for $request {
            fn command_id() -> CommandId {
                $request_id
            }

            fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
                Self::validate_header(&header)?;

                let system_id = decode_cstring(buf, "system_id")?;
                let password = decode_cstring(buf, "password")?;
                let system_type = decode_cstring(buf, "system_type")?;
                let interface_version = InterfaceVersion::from_octet(decode_u8(buf)?);
                let addr_ton = TypeOfNumber::from_octet(decode_u8(buf)?);
                let addr_npi = NumericPlanIndicator::from_octet(decode_u8(buf)?);
                let address_range = decode_cstring(buf, "address_range")?;

                Ok(Self {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    system_id,
                    password,
                    system_type,
                    interface_version,
                    addr_ton,
                    addr_npi,
                    address_range,
                })
            }
        }

        impl Encodable for $request {
            fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
                let header = PduHeader {
                    command_length: self.encoded_size() as u32,
                    command_id: $request_id,
                    command_status: self.command_status,
                    sequence_number: self.sequence_number,
                };
                header.encode(buf)?;

                encode_cstring(buf, &self.system_id);
                encode_cstring(buf, &self.password);
                encode_cstring(buf, &self.system_type);
                buf.put_u8(self.interface_version.into());
                buf.put_u8(self.addr_ton.into());
                buf.put_u8(self.addr_npi.into());
                encode_cstring(buf, &self.address_range);

                Ok(())
            }

            fn encoded_size(&self) -> usize {
                PduHeader::SIZE
                    + cstring_size(&self.system_id)
                    + cstring_size(&self.password)
                    + cstring_size(&self.system_type)
                    + 3
                    + cstring_size(&self.address_range)
            }
        }

        #[derive(Clone, Debug, PartialEq)]
        pub struct $response {
            pub command_status: CommandStatus,
            pub sequence_number: u32,
            // body
            pub system_id: String,
            /// Optional parameters, typically sc_interface_version
            pub tlvs: TlvMap,
        }

        impl $response {
            pub fn new(sequence_number: u32, system_id: impl Into<String>) -> Self {
                Self {
                    command_status: CommandStatus::Ok,
                    sequence_number,
                    system_id: system_id.into(),
                    tlvs: TlvMap::new(),
                }
            }

            pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
                Self {
                    command_status: status,
                    ..Self::new(sequence_number, "")
                }
            }

            /// Advertise the SMSC's interface version
            pub fn with_interface_version(mut self, version: InterfaceVersion) -> Self {
                self.tlvs
                    .insert(Tlv::new(tlv::SC_INTERFACE_VERSION, vec![u8::from(version)]));
                self
            }
        }

        impl Decodable for $response {
            fn command_id() -> CommandId {
                $response_id
            }

            /// A rejected bind is often answered with a bare header, which
            /// decodes as an empty system_id.
            fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
                Self::validate_header(&header)?;

                let system_id = if buf.has_remaining() {
                    decode_cstring(buf, "system_id")?
                } else {
                    String::new()
                };
                let tlvs = TlvMap::decode(buf)?;

                Ok(Self {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    system_id,
                    tlvs,
                })
            }
        }

        impl Encodable for $response {
            fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
                let header = PduHeader {
                    command_length: self.encoded_size() as u32,
                    command_id: $response_id,
                    command_status: self.command_status,
                    sequence_number: self.sequence_number,
                };
                header.encode(buf)?;

                encode_cstring(buf, &self.system_id);
                self.tlvs.encode(buf)
            }

            fn encoded_size(&self) -> usize {
                PduHeader::SIZE + cstring_size(&self.system_id) + self.tlvs.encoded_size()
            }
        }
    };
}

bind_pdu_pair!(
    BindTransmitter,
    BindTransmitterResponse,
    CommandId::BindTransmitter,
    CommandId::BindTransmitterResp
);
bind_pdu_pair!(
    BindReceiver,
    BindReceiverResponse,
    CommandId::BindReceiver,
    CommandId::BindReceiverResp
);
bind_pdu_pair!(
    BindTransceiver,
    BindTransceiverResponse,
    CommandId::BindTransceiver,
    CommandId::BindTransceiverResp
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;

    #[test]
    fn bind_transmitter_to_bytes() {
        let bind_transmitter = BindTransmitter {
            command_status: CommandStatus::Ok,
            sequence_number: 1,
            system_id: "SMPP3TEST".to_string(),
            password: "secret08".to_string(),
            system_type: "SUBMIT1".to_string(),
            interface_version: InterfaceVersion::SmppV34,
            addr_ton: TypeOfNumber::International,
            addr_npi: NumericPlanIndicator::Isdn,
            address_range: "".to_string(),
        };

        let bt_bytes = bind_transmitter.to_bytes().unwrap();

        let expected: Vec<u8> = vec![
            // Header:
            0x00, 0x00, 0x00, 0x2F, // command_length
            0x00, 0x00, 0x00, 0x02, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
            // Body:
            0x53, 0x4D, 0x50, 0x50, 0x33, 0x54, 0x45, 0x53, 0x54, 0x00, // system_id
            0x73, 0x65, 0x63, 0x72, 0x65, 0x74, 0x30, 0x38, 0x00, // password
            0x53, 0x55, 0x42, 0x4D, 0x49, 0x54, 0x31, 0x00, // system_type
            0x34, // interface_version
            0x01, // addr_ton
            0x01, // addr_npi
            0x00, // address_range
        ];

        assert_eq!(&bt_bytes, &expected);
        assert_eq!(bind_transmitter.encoded_size(), expected.len());
    }

    #[test]
    fn bind_receiver_empty_password() {
        let bind = BindReceiver::new(9, "rx", "", "");
        let bytes = bind.to_bytes().unwrap();

        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x19, // command_length
            0x00, 0x00, 0x00, 0x01, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x09, // sequence_number
            0x72, 0x78, 0x00, // system_id
            0x00, // password
            0x00, // system_type
            0x34, 0x00, 0x00, // interface_version, addr_ton, addr_npi
            0x00, // address_range
        ];
        assert_eq!(&bytes, &expected);
    }

    #[test]
    fn bind_response_with_interface_version() {
        let response = BindTransceiverResponse::new(5, "SMSC")
            .with_interface_version(InterfaceVersion::SmppV34);
        let bytes = response.to_bytes().unwrap();

        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x1A, // command_length
            0x80, 0x00, 0x00, 0x09, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x05, // sequence_number
            0x53, 0x4D, 0x53, 0x43, 0x00, // system_id
            0x02, 0x10, 0x00, 0x01, 0x34, // sc_interface_version
        ];
        assert_eq!(&bytes, &expected);
    }

    #[test]
    fn bare_error_response_decodes() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x02, // command_id
            0x00, 0x00, 0x00, 0x0D, // command_status (ESME_RBINDFAIL)
            0x00, 0x00, 0x00, 0x01, // sequence_number
        ];
        let mut cursor = Cursor::new(data);
        match Frame::parse(&mut cursor).unwrap() {
            Frame::BindTransmitterResp(resp) => {
                assert_eq!(resp.command_status, CommandStatus::BindFailed);
                assert!(resp.system_id.is_empty());
            }
            other => panic!("Expected BindTransmitterResp, got {other:?}"),
        }
    }

    #[test]
    fn bind_type_from_direction() {
        assert_eq!(
            BindType::from_direction(true, true),
            Some(BindType::Transceiver)
        );
        assert_eq!(
            BindType::from_direction(true, false),
            Some(BindType::Transmitter)
        );
        assert_eq!(
            BindType::from_direction(false, true),
            Some(BindType::Receiver)
        );
        assert_eq!(BindType::from_direction(false, false), None);
        assert!(BindType::Transmitter.can_send());
        assert!(!BindType::Transmitter.can_receive());
    }

    #[test]
    fn request_frames_carry_credentials() {
        let credentials = BindCredentials {
            system_id: "esme".to_string(),
            password: "pw".to_string(),
            system_type: "".to_string(),
            addr_ton: TypeOfNumber::International,
            addr_npi: NumericPlanIndicator::Isdn,
        };

        let frame = BindType::Receiver.request(4, &credentials);
        assert_eq!(frame.command_id(), CommandId::BindReceiver);
        assert_eq!(frame.sequence_number(), 4);
        assert_eq!(
            frame.bind_request(),
            Some((BindType::Receiver, "esme", "pw"))
        );

        let frame = BindType::Receiver.response(4, CommandStatus::BindFailed, "SMSC");
        assert_eq!(frame.command_id(), BindType::Receiver.response_id());
        assert_eq!(frame.command_status(), CommandStatus::BindFailed);
    }
}
