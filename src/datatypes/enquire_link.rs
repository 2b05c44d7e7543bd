use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::impl_complete_header_only_pdu;

/// Keep-alive probe. Either peer may send it once a session is bound.
#[derive(Clone, Debug, PartialEq)]
pub struct EnquireLink {
    // pub command_length: u32,
    // pub command_id: CommandId::EnquireLink,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnquireLinkResponse {
    // pub command_length: u32,
    // pub command_id: CommandId::EnquireLinkResp,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl_complete_header_only_pdu!(EnquireLink, CommandId::EnquireLink);
impl_complete_header_only_pdu!(EnquireLinkResponse, CommandId::EnquireLinkResp);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecError, Decodable, Encodable, PduHeader};
    use std::io::Cursor;

    #[test]
    fn enquire_link_to_bytes() {
        let enquire_link = EnquireLink::new(1);

        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x10, // command_length
            0x00, 0x00, 0x00, 0x15, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
        ];

        assert_eq!(&enquire_link.to_bytes().unwrap(), &expected);
    }

    #[test]
    fn enquire_link_response_to_bytes() {
        let enquire_link_response = EnquireLinkResponse::new(0x0102_0304);

        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x15, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x01, 0x02, 0x03, 0x04, // sequence_number
        ];

        assert_eq!(&enquire_link_response.to_bytes().unwrap(), &expected);
    }

    #[test]
    fn enquire_link_rejects_body() {
        let header = PduHeader {
            command_length: 17,
            command_id: CommandId::EnquireLink,
            command_status: CommandStatus::Ok,
            sequence_number: 1,
        };
        let body = [0x00];
        let mut cursor = Cursor::new(&body[..]);
        assert!(matches!(
            EnquireLink::decode(header, &mut cursor),
            Err(CodecError::FieldValidation { .. })
        ));
    }
}
