// ABOUTME: Mandatory and optional parameters shared by submit_sm and deliver_sm
// ABOUTME: Both PDUs carry the same body layout, so one type encodes and decodes it

use crate::codec::{CodecError, cstring_size, decode_cstring, decode_u8, encode_cstring};
use crate::datatypes::tlv::{self, Tlv, TlvMap};
use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};
use crate::macros::builder_setters;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Longest short_message the sm_length octet can describe
pub const MAX_SHORT_MESSAGE_LENGTH: usize = 254;

/// esm_class bit announcing a User Data Header at the start of short_message
pub const ESM_CLASS_UDHI: u8 = 0x40;

/// esm_class message type of an SMSC delivery receipt
pub const ESM_CLASS_DELIVERY_RECEIPT: u8 = 0x04;

const ESM_CLASS_MESSAGE_TYPE_MASK: u8 = 0x3C;

/// Body of a submit_sm or deliver_sm PDU.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SmBody {
    /// service_type: The SMS Application service associated with the message.
    ///       Set to NULL if not applicable. Max length: 5 octets.
    pub service_type: String,

    /// source_addr_ton: Type of Number for source address.
    pub source_addr_ton: TypeOfNumber,

    /// source_addr_npi: Numbering Plan Indicator for source address.
    pub source_addr_npi: NumericPlanIndicator,

    /// source_addr: Address of SME which originated this message.
    ///       Max length: 20 octets (21 with null terminator).
    pub source_addr: String,

    /// dest_addr_ton: Type of Number for destination address.
    pub dest_addr_ton: TypeOfNumber,

    /// dest_addr_npi: Numbering Plan Indicator for destination address.
    pub dest_addr_npi: NumericPlanIndicator,

    /// destination_addr: Destination address of this short message.
    ///       Max length: 20 octets (21 with null terminator).
    pub destination_addr: String,

    /// esm_class: Indicates Message Mode and Message Type.
    ///       Bits 5..2: Message Type (0001 = SMSC Delivery Receipt)
    ///       Bit 6: UDHI, short_message starts with a User Data Header
    pub esm_class: u8,

    /// protocol_id: Protocol Identifier. Network specific field.
    pub protocol_id: u8,

    /// priority_flag: Level 0 (lowest) to Level 3 (highest).
    pub priority_flag: u8,

    /// schedule_delivery_time: NULL for immediate delivery.
    pub schedule_delivery_time: String,

    /// validity_period: NULL requests the SMSC default validity period.
    pub validity_period: String,

    /// registered_delivery: Bits 1..0 request an SMSC delivery receipt
    ///        (00 = none, 01 = on success or failure, 10 = on failure).
    pub registered_delivery: u8,

    /// replace_if_present_flag: 0 = don't replace, 1 = replace.
    pub replace_if_present_flag: u8,

    /// data_coding: Encoding scheme of the short message user data.
    ///        0x00 = SMSC Default Alphabet, 0x03 = Latin-1, 0x08 = UCS2
    pub data_coding: u8,

    /// sm_default_msg_id: Index of a canned message stored on the SMSC, or 0.
    pub sm_default_msg_id: u8,

    /// short_message: Up to 254 octets of user data. The sm_length octet is
    ///        derived from this field when encoding. Longer bodies go in the
    ///        message_payload TLV with an empty short_message.
    pub short_message: Bytes,

    /// Optional parameters
    pub tlvs: TlvMap,
}

impl SmBody {
    pub fn new(source_addr: impl Into<String>, destination_addr: impl Into<String>) -> Self {
        Self {
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
        protocol_id: u8,
        priority_flag: u8,
        registered_delivery: u8,
        data_coding: u8,
        short_message: Bytes,
        tlvs: TlvMap,
    }

    /// Carry `payload` in the message_payload TLV, leaving short_message empty.
    pub fn message_payload(mut self, payload: Bytes) -> Self {
        self.short_message = Bytes::new();
        self.tlvs.insert(Tlv::new(tlv::MESSAGE_PAYLOAD, payload));
        self
    }

    /// The user data, whichever field carries it.
    ///
    /// An empty short_message defers to the message_payload TLV.
    pub fn payload(&self) -> Bytes {
        if !self.short_message.is_empty() {
            return self.short_message.clone();
        }
        self.tlvs
            .value(tlv::MESSAGE_PAYLOAD)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_delivery_receipt(&self) -> bool {
        self.esm_class & ESM_CLASS_MESSAGE_TYPE_MASK == ESM_CLASS_DELIVERY_RECEIPT
    }

    pub fn has_udh(&self) -> bool {
        self.esm_class & ESM_CLASS_UDHI != 0
    }

    pub fn wants_delivery_receipt(&self) -> bool {
        self.registered_delivery & 0x03 != 0
    }

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let service_type = decode_cstring(buf, "service_type")?;
        let source_addr_ton = TypeOfNumber::from_octet(decode_u8(buf)?);
        let source_addr_npi = NumericPlanIndicator::from_octet(decode_u8(buf)?);
        let source_addr = decode_cstring(buf, "source_addr")?;
        let dest_addr_ton = TypeOfNumber::from_octet(decode_u8(buf)?);
        let dest_addr_npi = NumericPlanIndicator::from_octet(decode_u8(buf)?);
        let destination_addr = decode_cstring(buf, "destination_addr")?;
        let esm_class = decode_u8(buf)?;
        let protocol_id = decode_u8(buf)?;
        let priority_flag = decode_u8(buf)?;
        let schedule_delivery_time = decode_cstring(buf, "schedule_delivery_time")?;
        let validity_period = decode_cstring(buf, "validity_period")?;
        let registered_delivery = decode_u8(buf)?;
        let replace_if_present_flag = decode_u8(buf)?;
        let data_coding = decode_u8(buf)?;
        let sm_default_msg_id = decode_u8(buf)?;
        let sm_length = decode_u8(buf)? as usize;

        if buf.remaining() < sm_length {
            return Err(CodecError::FieldValidation {
                field: "short_message",
                reason: format!(
                    "sm_length is {} but only {} octets remain",
                    sm_length,
                    buf.remaining()
                ),
            });
        }
        let short_message = buf.copy_to_bytes(sm_length);
        let tlvs = TlvMap::decode(buf)?;

        Ok(Self {
            service_type,
            source_addr_ton,
            source_addr_npi,
            source_addr,
            dest_addr_ton,
            dest_addr_npi,
            destination_addr,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time,
            validity_period,
            registered_delivery,
            replace_if_present_flag,
            data_coding,
            sm_default_msg_id,
            short_message,
            tlvs,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.short_message.len() > MAX_SHORT_MESSAGE_LENGTH {
            return Err(CodecError::FieldValidation {
                field: "short_message",
                reason: format!(
                    "{} octets exceeds the {} octet limit",
                    self.short_message.len(),
                    MAX_SHORT_MESSAGE_LENGTH
                ),
            });
        }

        encode_cstring(buf, &self.service_type);
        buf.put_u8(self.source_addr_ton.into());
        buf.put_u8(self.source_addr_npi.into());
        encode_cstring(buf, &self.source_addr);
        buf.put_u8(self.dest_addr_ton.into());
        buf.put_u8(self.dest_addr_npi.into());
        encode_cstring(buf, &self.destination_addr);
        buf.put_u8(self.esm_class);
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.priority_flag);
        encode_cstring(buf, &self.schedule_delivery_time);
        encode_cstring(buf, &self.validity_period);
        buf.put_u8(self.registered_delivery);
        buf.put_u8(self.replace_if_present_flag);
        buf.put_u8(self.data_coding);
        buf.put_u8(self.sm_default_msg_id);
        buf.put_u8(self.short_message.len() as u8);
        buf.put_slice(&self.short_message);
        self.tlvs.encode(buf)
    }

    pub fn encoded_size(&self) -> usize {
        cstring_size(&self.service_type)
            + 2
            + cstring_size(&self.source_addr)
            + 2
            + cstring_size(&self.destination_addr)
            + 3
            + cstring_size(&self.schedule_delivery_time)
            + cstring_size(&self.validity_period)
            + 5
            + self.short_message.len()
            + self.tlvs.encoded_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_prefers_short_message() {
        let body = SmBody::new("a", "b").short_message(Bytes::from_static(b"short"));
        assert_eq!(body.payload().as_ref(), b"short");

        let body = SmBody::new("a", "b").message_payload(Bytes::from_static(b"long body"));
        assert!(body.short_message.is_empty());
        assert_eq!(body.payload().as_ref(), b"long body");

        assert!(SmBody::new("a", "b").payload().is_empty());
    }

    #[test]
    fn esm_class_flags() {
        let body = SmBody::new("a", "b").esm_class(0x04);
        assert!(body.is_delivery_receipt());
        assert!(!body.has_udh());

        let body = SmBody::new("a", "b").esm_class(0x44);
        assert!(body.is_delivery_receipt());
        assert!(body.has_udh());

        // intermediate delivery notification is not a receipt
        let body = SmBody::new("a", "b").esm_class(0x20);
        assert!(!body.is_delivery_receipt());
    }

    #[test]
    fn oversized_short_message_is_rejected() {
        let body = SmBody::new("a", "b").short_message(Bytes::from(vec![0x41; 255]));
        let mut buf = BytesMut::new();
        assert!(matches!(
            body.encode(&mut buf),
            Err(CodecError::FieldValidation {
                field: "short_message",
                ..
            })
        ));
    }

    #[test]
    fn body_with_tlvs_encodes_in_size() {
        let body = SmBody::new("4790000000", "2222")
            .registered_delivery(1)
            .message_payload(Bytes::from(vec![0x42; 300]));
        let mut buf = BytesMut::new();
        body.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), body.encoded_size());

        let mut cursor = Cursor::new(buf.as_ref());
        let decoded = SmBody::decode(&mut cursor).unwrap();
        assert_eq!(decoded, body);
        assert!(decoded.wants_delivery_receipt());
    }

    #[test]
    fn short_message_longer_than_body_is_rejected() {
        let mut raw = BytesMut::new();
        SmBody::new("1", "2")
            .short_message(Bytes::from_static(b"abc"))
            .encode(&mut raw)
            .unwrap();
        // claim 200 octets of user data
        let sm_length_at = raw.len() - 4;
        raw[sm_length_at] = 200;

        let mut cursor = Cursor::new(raw.as_ref());
        assert!(matches!(
            SmBody::decode(&mut cursor),
            Err(CodecError::FieldValidation {
                field: "short_message",
                ..
            })
        ));
    }
}
