use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::impl_complete_header_only_pdu;

/// Ends a bound session. The receiver answers with unbind_resp and closes.
#[derive(Clone, Debug, PartialEq)]
pub struct Unbind {
    // pub command_length: u32,
    // pub command_id: CommandId::Unbind,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnbindResponse {
    // pub command_length: u32,
    // pub command_id: CommandId::UnbindResp,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl_complete_header_only_pdu!(Unbind, CommandId::Unbind);
impl_complete_header_only_pdu!(UnbindResponse, CommandId::UnbindResp);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encodable;

    #[test]
    fn unbind_to_bytes() {
        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x10, // command_length
            0x00, 0x00, 0x00, 0x06, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x1D, // sequence_number
        ];
        assert_eq!(&Unbind::new(29).to_bytes().unwrap(), &expected);
    }

    #[test]
    fn unbind_response_error_to_bytes() {
        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x06, // command_id
            0x00, 0x00, 0x00, 0x04, // command_status
            0x00, 0x00, 0x00, 0x02, // sequence_number
        ];
        let response = UnbindResponse::error(2, CommandStatus::IncorrectBindStatus);
        assert_eq!(&response.to_bytes().unwrap(), &expected);
    }
}
