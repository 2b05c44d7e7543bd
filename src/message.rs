// ABOUTME: Converts between gateway message text and the user data of submit_sm, deliver_sm and data_sm
// ABOUTME: Outbound segments become PDU bodies; inbound bodies become text plus any concatenation header

use crate::datatypes::{
    BodyFormat, DataSm, NumericPlanIndicator, SmBody, TypeOfNumber,
};
use crate::multipart::{Segment, Udh};
use crate::{gsm, hex};
use bytes::Bytes;

/// Source addresses longer than this are sent as international numbers
const MAX_UNTYPED_SOURCE_LENGTH: usize = 11;

/// Fresh 32 hex digit id for a message received by the gateway
pub fn generate_message_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Addressing and receipt settings applied to every outbound PDU of a session
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Envelope {
    pub source_addr_ton: TypeOfNumber,
    pub source_addr_npi: NumericPlanIndicator,
    pub dest_addr_ton: TypeOfNumber,
    pub dest_addr_npi: NumericPlanIndicator,
    pub registered_delivery: u8,
}

impl Envelope {
    fn source_ton(&self, sender: &str) -> TypeOfNumber {
        if sender.chars().count() > MAX_UNTYPED_SOURCE_LENGTH {
            TypeOfNumber::International
        } else {
            self.source_addr_ton
        }
    }

    /// submit_sm / deliver_sm body carrying one segment
    pub fn sm_body(
        &self,
        sender: &str,
        recipient: &str,
        format: BodyFormat,
        segment: &Segment,
    ) -> SmBody {
        let body = SmBody::new(sender, recipient)
            .source_addr_ton(self.source_ton(sender))
            .source_addr_npi(self.source_addr_npi)
            .dest_addr_ton(self.dest_addr_ton)
            .dest_addr_npi(self.dest_addr_npi)
            .esm_class(segment.esm_class)
            .registered_delivery(self.registered_delivery)
            .data_coding(format.data_coding());

        if segment.in_payload {
            body.message_payload(segment.user_data.clone())
        } else {
            body.short_message(segment.user_data.clone())
        }
    }

    /// data_sm carrying one segment in its message_payload TLV
    pub fn data_sm(
        &self,
        sequence_number: u32,
        sender: &str,
        recipient: &str,
        format: BodyFormat,
        segment: &Segment,
    ) -> DataSm {
        DataSm::new(sequence_number, sender, recipient)
            .source_addr_ton(self.source_ton(sender))
            .source_addr_npi(self.source_addr_npi)
            .dest_addr_ton(self.dest_addr_ton)
            .dest_addr_npi(self.dest_addr_npi)
            .esm_class(segment.esm_class)
            .registered_delivery(self.registered_delivery)
            .data_coding(format.data_coding())
            .message_payload(segment.user_data.clone())
    }
}

/// Inbound user data turned back into text
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedBody {
    pub text: String,
    pub format: BodyFormat,
    pub udh: Option<Udh>,
}

/// Decode user data according to its data_coding.
///
/// Text codings with a leading `05 00 03` header yield the header separately.
/// Codings the gateway does not render as text come back as hex.
pub fn decode_user_data(
    data_coding: u8,
    user_data: &[u8],
    use_8bit: bool,
    has_udhi: bool,
) -> DecodedBody {
    let format = BodyFormat::from_data_coding(data_coding);
    let udh = Udh::parse(user_data);
    let rest = if udh.is_some() {
        &user_data[Udh::SIZE..]
    } else {
        user_data
    };

    let (text, udh) = match data_coding {
        0x08 => (gsm::decode_ucs2(rest), udh),
        0x00 | 0x01 if use_8bit => match udh {
            Some(udh) if has_udhi => (gsm::unpack_7bit_with_fill(rest, 1), Some(udh)),
            _ => (gsm::unpack_7bit(user_data), None),
        },
        0x00 | 0x01 | 0x03 => (hex::latin1_string(rest), udh),
        _ => (hex::encode(user_data), None),
    };

    DecodedBody { text, format, udh }
}

/// A message received on a session, ready for the new-message event
#[derive(Clone, Debug, PartialEq)]
pub struct InboundMessage {
    pub sender: String,
    pub recipient: String,
    pub body: DecodedBody,
    pub registered_delivery: u8,
}

impl InboundMessage {
    pub fn from_sm_body(body: &SmBody, use_8bit: bool) -> Self {
        let user_data: Bytes = body.payload();
        Self {
            sender: body.source_addr.clone(),
            recipient: body.destination_addr.clone(),
            body: decode_user_data(body.data_coding, &user_data, use_8bit, body.has_udh()),
            registered_delivery: body.registered_delivery,
        }
    }

    pub fn from_data_sm(pdu: &DataSm, use_8bit: bool) -> Self {
        let user_data = pdu.payload();
        Self {
            sender: pdu.source_addr.clone(),
            recipient: pdu.destination_addr.clone(),
            body: decode_user_data(
                pdu.data_coding,
                &user_data,
                use_8bit,
                pdu.esm_class & crate::datatypes::ESM_CLASS_UDHI != 0,
            ),
            registered_delivery: pdu.registered_delivery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::{SegmentOptions, segment};

    #[test]
    fn generated_ids_are_32_hex_digits() {
        let id = generate_message_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_message_id());
    }

    #[test]
    fn long_sender_forces_international() {
        let envelope = Envelope {
            source_addr_ton: TypeOfNumber::Alphanumeric,
            registered_delivery: 1,
            ..Default::default()
        };
        let parts = segment("hi", BodyFormat::Ascii, &SegmentOptions::default()).unwrap();

        let body = envelope.sm_body("ACME", "4790000000", BodyFormat::Ascii, &parts[0]);
        assert_eq!(body.source_addr_ton, TypeOfNumber::Alphanumeric);
        assert_eq!(body.registered_delivery, 1);

        let body = envelope.sm_body("004791234567", "4790000000", BodyFormat::Ascii, &parts[0]);
        assert_eq!(body.source_addr_ton, TypeOfNumber::International);
        assert_eq!(body.short_message.as_ref(), b"hi");
    }

    #[test]
    fn data_sm_always_uses_payload() {
        let parts = segment("hello", BodyFormat::Latin, &SegmentOptions::default()).unwrap();
        let pdu = Envelope::default().data_sm(3, "a", "b", BodyFormat::Latin, &parts[0]);
        assert_eq!(pdu.payload().as_ref(), b"hello");
        assert_eq!(pdu.data_coding, 3);

        let inbound = InboundMessage::from_data_sm(&pdu, false);
        assert_eq!(inbound.body.text, "hello");
        assert_eq!(inbound.body.format, BodyFormat::Latin);
    }

    #[test]
    fn decode_text_codings() {
        let decoded = decode_user_data(3, &[0x4E, 0xE6, 0xF8, 0xE5], false, false);
        assert_eq!(decoded.text, "Næøå");
        assert_eq!(decoded.format, BodyFormat::Latin);

        let decoded = decode_user_data(8, &[0x04, 0x36, 0x00, 0x41], false, false);
        assert_eq!(decoded.text, "жA");
        assert_eq!(decoded.format, BodyFormat::Unicode);

        let decoded = decode_user_data(0, &gsm::pack_7bit("hello"), true, false);
        assert_eq!(decoded.text, "hello");

        let decoded = decode_user_data(4, &[0xDE, 0xAD], false, false);
        assert_eq!(decoded.text, "DEAD");
        assert_eq!(decoded.format, BodyFormat::Binary);
    }

    #[test]
    fn decode_splits_concatenation_header() {
        let data = [0x05, 0x00, 0x03, 0x10, 0x02, 0x01, 0x00, 0x48, 0x00, 0x49];
        let decoded = decode_user_data(8, &data, false, true);
        assert_eq!(decoded.text, "HI");
        assert_eq!(
            decoded.udh,
            Some(Udh {
                reference: 0x10,
                total: 2,
                index: 1
            })
        );

        let mut packed = vec![0x05, 0x00, 0x03, 0x01, 0x02, 0x02];
        packed.extend(gsm::pack_7bit_with_fill("second!", 1));
        let decoded = decode_user_data(0, &packed, true, true);
        assert_eq!(decoded.text, "second!");
        assert_eq!(decoded.udh.map(|u| u.index), Some(2));
    }

    #[test]
    fn segments_decode_back_to_text() {
        let text = "€ sign and ünïcödé ".repeat(5);
        let options = SegmentOptions::default().with_reference(77);
        let parts = segment(&text, BodyFormat::Unicode, &options).unwrap();
        assert_eq!(parts.len(), 2);

        let envelope = Envelope::default();
        let decoded: String = parts
            .iter()
            .map(|part| {
                let body = envelope.sm_body("a", "b", BodyFormat::Unicode, part);
                InboundMessage::from_sm_body(&body, false).body.text
            })
            .collect();
        assert_eq!(decoded, text);
    }
}
