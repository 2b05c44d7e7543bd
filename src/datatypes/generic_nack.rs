use crate::codec::CodecError;
use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::impl_header_only_pdu;

/// GenericNack is used to acknowledge the receipt of a PDU when the receiving
/// entity cannot process the PDU due to errors such as invalid command_id,
/// invalid command_length, or a body that fails to decode.
///
/// The generic_nack PDU has no message body and only contains the standard
/// SMPP header.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericNack {
    // pub command_length: u32, (always 16 for generic_nack)
    // pub command_id: CommandId::GenericNack, (always 0x80000000)
    /// The command_status field indicates the reason for the generic_nack
    pub command_status: CommandStatus,
    /// The sequence_number from the original PDU that caused the error.
    /// If the original sequence_number cannot be determined, this should be 0.
    pub sequence_number: u32,
}

impl GenericNack {
    pub fn new(command_status: CommandStatus, sequence_number: u32) -> Self {
        Self {
            command_status,
            sequence_number,
        }
    }

    pub fn invalid_command_id(sequence_number: u32) -> Self {
        Self::new(CommandStatus::InvalidCommandId, sequence_number)
    }

    pub fn invalid_command_length(sequence_number: u32) -> Self {
        Self::new(CommandStatus::InvalidCommandLength, sequence_number)
    }

    /// Nack a request whose decoding failed with `error`
    pub fn for_error(sequence_number: u32, error: &CodecError) -> Self {
        Self::new(error.to_command_status(), sequence_number)
    }
}

impl_header_only_pdu!(GenericNack, CommandId::GenericNack);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Encodable, Frame};
    use std::io::Cursor;

    #[test]
    fn generic_nack_to_bytes() {
        let generic_nack = GenericNack::invalid_command_id(42);

        let bytes = generic_nack.to_bytes().unwrap();

        let expected = vec![
            0x00, 0x00, 0x00, 0x10, // command_length (16)
            0x80, 0x00, 0x00, 0x00, // command_id (GenericNack = 0x80000000)
            0x00, 0x00, 0x00, 0x03, // command_status (InvalidCommandId = 3)
            0x00, 0x00, 0x00, 0x2A, // sequence_number (42)
        ];

        assert_eq!(&bytes, &expected);
    }

    #[test]
    fn generic_nack_for_decode_error() {
        let nack = GenericNack::for_error(
            5,
            &CodecError::TlvError("truncated".to_string()),
        );
        assert_eq!(
            nack.command_status,
            CommandStatus::ErrorInOptionalPartOfPduBody
        );
        assert_eq!(nack.sequence_number, 5);

        let nack = GenericNack::invalid_command_length(6);
        assert_eq!(nack.command_status, CommandStatus::InvalidCommandLength);
    }

    #[test]
    fn generic_nack_roundtrip_test() {
        let original = GenericNack::new(CommandStatus::InvalidCommandId, 9876);
        let serialized = original.to_bytes().unwrap();

        let mut cursor = Cursor::new(serialized.as_ref());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::GenericNack(parsed) => assert_eq!(parsed, original),
            other => panic!("Expected GenericNack frame, got {other:?}"),
        }
    }
}
