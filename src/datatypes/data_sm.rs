// ABOUTME: Implements SMPP v3.4 data_sm and data_sm_resp PDUs
// ABOUTME: data_sm has no short_message field, the user data rides in the message_payload TLV

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, cstring_size, decode_cstring, decode_u8,
    encode_cstring,
};
use crate::datatypes::tlv::{self, Tlv, TlvMap};
use crate::datatypes::{CommandId, CommandStatus, NumericPlanIndicator, TypeOfNumber};
use crate::macros::{builder_setters, impl_message_id_response};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// SMPP v3.4 data_sm PDU (Section 4.7.1)
///
/// The data_sm operation is similar to the submit_sm operation in that it provides a means
/// of submitting a message to the SMSC for delivery to a specified destination. It may be
/// used in either direction, ESME to SMSC or SMSC to ESME.
///
/// ## Mandatory Parameters
/// - service_type: The service_type parameter
/// - source_addr_ton / source_addr_npi / source_addr: message originator
/// - dest_addr_ton / dest_addr_npi / destination_addr: destination
/// - esm_class: Enhanced Short Message Class
/// - registered_delivery: Registered delivery flag
/// - data_coding: Data coding scheme
///
/// ## Optional Parameters (TLVs)
/// - message_payload: The message data
/// - sar_msg_ref_num / sar_total_segments / sar_segment_seqnum: segmentation
/// - receipted_message_id / message_state: delivery receipts
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DataSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    pub service_type: String,
    pub source_addr_ton: TypeOfNumber,
    pub source_addr_npi: NumericPlanIndicator,
    pub source_addr: String,
    pub dest_addr_ton: TypeOfNumber,
    pub dest_addr_npi: NumericPlanIndicator,
    pub destination_addr: String,
    pub esm_class: u8,
    pub registered_delivery: u8,
    pub data_coding: u8,

    pub tlvs: TlvMap,
}

impl DataSm {
    pub fn new(
        sequence_number: u32,
        source_addr: impl Into<String>,
        destination_addr: impl Into<String>,
    ) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
            source_addr: source_addr.into(),
            destination_addr: destination_addr.into(),
            ..Default::default()
        }
    }

    builder_setters! {
        service_type: String,
        source_addr_ton: TypeOfNumber,
        source_addr_npi: NumericPlanIndicator,
        dest_addr_ton: TypeOfNumber,
        dest_addr_npi: NumericPlanIndicator,
        esm_class: u8,
        registered_delivery: u8,
        data_coding: u8,
    }

    pub fn message_payload(mut self, payload: Bytes) -> Self {
        self.tlvs.insert(Tlv::new(tlv::MESSAGE_PAYLOAD, payload));
        self
    }

    /// The message_payload TLV, or nothing when absent
    pub fn payload(&self) -> Bytes {
        self.tlvs
            .value(tlv::MESSAGE_PAYLOAD)
            .cloned()
            .unwrap_or_default()
    }

    pub fn wants_delivery_receipt(&self) -> bool {
        self.registered_delivery & 0x03 != 0
    }
}

impl Decodable for DataSm {
    fn command_id() -> CommandId {
        CommandId::DataSm
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let service_type = decode_cstring(buf, "service_type")?;
        let source_addr_ton = TypeOfNumber::from_octet(decode_u8(buf)?);
        let source_addr_npi = NumericPlanIndicator::from_octet(decode_u8(buf)?);
        let source_addr = decode_cstring(buf, "source_addr")?;
        let dest_addr_ton = TypeOfNumber::from_octet(decode_u8(buf)?);
        let dest_addr_npi = NumericPlanIndicator::from_octet(decode_u8(buf)?);
        let destination_addr = decode_cstring(buf, "destination_addr")?;
        let esm_class = decode_u8(buf)?;
        let registered_delivery = decode_u8(buf)?;
        let data_coding = decode_u8(buf)?;
        let tlvs = TlvMap::decode(buf)?;

        Ok(DataSm {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            service_type,
            source_addr_ton,
            source_addr_npi,
            source_addr,
            dest_addr_ton,
            dest_addr_npi,
            destination_addr,
            esm_class,
            registered_delivery,
            data_coding,
            tlvs,
        })
    }
}

impl Encodable for DataSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader {
            command_length: self.encoded_size() as u32,
            command_id: CommandId::DataSm,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf)?;

        encode_cstring(buf, &self.service_type);
        buf.put_u8(self.source_addr_ton.into());
        buf.put_u8(self.source_addr_npi.into());
        encode_cstring(buf, &self.source_addr);
        buf.put_u8(self.dest_addr_ton.into());
        buf.put_u8(self.dest_addr_npi.into());
        encode_cstring(buf, &self.destination_addr);
        buf.put_u8(self.esm_class);
        buf.put_u8(self.registered_delivery);
        buf.put_u8(self.data_coding);

        self.tlvs.encode(buf)
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE
            + cstring_size(&self.service_type)
            + 2
            + cstring_size(&self.source_addr)
            + 2
            + cstring_size(&self.destination_addr)
            + 3
            + self.tlvs.encoded_size()
    }
}

impl_message_id_response!(DataSmResponse, CommandId::DataSmResp);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;

    #[test]
    fn data_sm_to_bytes() {
        let data_sm = DataSm::new(2, "123", "456")
            .registered_delivery(1)
            .data_coding(3)
            .message_payload(Bytes::from_static(b"Hi"));

        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x26, // command_length
            0x00, 0x00, 0x01, 0x03, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x02, // sequence_number
            0x00, // service_type
            0x00, 0x00, // source_addr_ton, source_addr_npi
            0x31, 0x32, 0x33, 0x00, // source_addr
            0x00, 0x00, // dest_addr_ton, dest_addr_npi
            0x34, 0x35, 0x36, 0x00, // destination_addr
            0x00, // esm_class
            0x01, // registered_delivery
            0x03, // data_coding
            0x04, 0x24, 0x00, 0x02, 0x48, 0x69, // message_payload
        ];

        assert_eq!(&data_sm.to_bytes().unwrap(), &expected);
        assert!(data_sm.wants_delivery_receipt());
    }

    #[test]
    fn data_sm_without_payload() {
        let data_sm = DataSm::new(4, "1", "2");
        let bytes = data_sm.to_bytes().unwrap();
        let mut cursor = Cursor::new(bytes.as_ref());

        match Frame::parse(&mut cursor).unwrap() {
            Frame::DataSm(decoded) => {
                assert!(decoded.payload().is_empty());
                assert_eq!(*decoded, data_sm);
            }
            other => panic!("Expected DataSm, got {other:?}"),
        }
    }
}
