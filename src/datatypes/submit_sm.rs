use crate::datatypes::{CommandId, CommandStatus, SmBody};
use crate::macros::{impl_message_id_response, impl_sm_body_pdu};

/// This operation is used by an ESME to submit a short message to the SMSC for onward transmission
/// to a specified short message entity (SME). The submit_sm PDU does not support the transaction
/// message mode.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSm {
    // pub command_length: u32,
    // pub command_id: CommandId::SubmitSm,
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    pub body: SmBody,
}

impl_sm_body_pdu!(SubmitSm, CommandId::SubmitSm);

impl_message_id_response!(SubmitSmResponse, CommandId::SubmitSmResp);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Encodable, Frame};
    use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};
    use bytes::Bytes;
    use std::io::Cursor;

    #[test]
    fn submit_sm_to_bytes_basic() {
        let body = SmBody::new("1234567890", "0987654321")
            .source_addr_ton(TypeOfNumber::International)
            .source_addr_npi(NumericPlanIndicator::Isdn)
            .dest_addr_ton(TypeOfNumber::International)
            .dest_addr_npi(NumericPlanIndicator::Isdn)
            .short_message(Bytes::from_static(b"Hello World"));
        let submit_sm = SubmitSm::new(1, body);

        let bytes = submit_sm.to_bytes().unwrap();

        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x40, // command_length
            0x00, 0x00, 0x00, 0x04, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
            0x00, // service_type
            0x01, 0x01, // source_addr_ton, source_addr_npi
            0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x30, 0x00, // source_addr
            0x01, 0x01, // dest_addr_ton, dest_addr_npi
            0x30, 0x39, 0x38, 0x37, 0x36, 0x35, 0x34, 0x33, 0x32, 0x31, 0x00, // destination_addr
            0x00, 0x00, 0x00, // esm_class, protocol_id, priority_flag
            0x00, // schedule_delivery_time
            0x00, // validity_period
            0x00, 0x00, 0x00, 0x00, // registered_delivery .. sm_default_msg_id
            0x0B, // sm_length
            0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x6C, 0x64, // short_message
        ];

        assert_eq!(&bytes, &expected);
        assert_eq!(submit_sm.encoded_size(), expected.len());
    }

    #[test]
    fn submit_sm_response_to_bytes() {
        let response = SubmitSmResponse::new(7, "msg1");
        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x15, // command_length
            0x80, 0x00, 0x00, 0x04, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x07, // sequence_number
            0x6D, 0x73, 0x67, 0x31, 0x00, // message_id
        ];
        assert_eq!(&response.to_bytes().unwrap(), &expected);
    }

    #[test]
    fn submit_sm_response_with_error_status() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x04, // command_id
            0x00, 0x00, 0x00, 0x45, // command_status (ESME_RSUBMITFAIL)
            0x00, 0x00, 0x00, 0x02, // sequence_number
        ];
        let mut cursor = Cursor::new(data);
        match Frame::parse(&mut cursor).unwrap() {
            Frame::SubmitSmResp(resp) => {
                assert_eq!(resp.command_status, CommandStatus::SubmitFailed);
                assert_eq!(resp.sequence_number, 2);
                assert!(resp.message_id.is_empty());
            }
            other => panic!("Expected SubmitSmResp, got {other:?}"),
        }
    }
}
