// ABOUTME: This module provides macros to reduce boilerplate in SMPP PDU implementations
// ABOUTME: Includes macros for header-only PDUs, message_id responses, and builder setters

/// Macro for implementing codec traits on header-only PDUs (no body)
///
/// This macro generates complete Encodable/Decodable implementations for PDUs
/// that only contain the standard SMPP header with no body content.
///
/// # Arguments
/// * `$pdu_type` - The PDU struct name (e.g., EnquireLink)
/// * `$command_id` - The CommandId variant (e.g., CommandId::EnquireLink)
macro_rules! impl_header_only_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use bytes::Buf;

                Self::validate_header(&header)?;

                if buf.has_remaining() {
                    return Err($crate::codec::CodecError::FieldValidation {
                        field: concat!(stringify!($pdu_type), "_body"),
                        reason: concat!(stringify!($pdu_type), " PDU should have no body")
                            .to_string(),
                    });
                }

                Ok($pdu_type {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                let header = $crate::codec::PduHeader {
                    command_length: $crate::codec::PduHeader::SIZE as u32,
                    command_id: $command_id,
                    command_status: self.command_status,
                    sequence_number: self.sequence_number,
                };
                header.encode(buf)
            }

            fn encoded_size(&self) -> usize {
                $crate::codec::PduHeader::SIZE
            }
        }
    };
}

/// Macro for generating constructor methods for header-only PDUs
///
/// # Generated code
/// - `new(sequence_number: u32)` - Creates PDU with Ok status
/// - `error(sequence_number: u32, status: CommandStatus)` - Creates PDU with error status
macro_rules! impl_header_only_constructors {
    ($pdu_type:ident) => {
        impl $pdu_type {
            /// Create a new PDU with Ok status
            pub fn new(sequence_number: u32) -> Self {
                Self {
                    command_status: $crate::datatypes::CommandStatus::Ok,
                    sequence_number,
                }
            }

            /// Create a PDU with error status
            pub fn error(sequence_number: u32, status: $crate::datatypes::CommandStatus) -> Self {
                Self {
                    command_status: status,
                    sequence_number,
                }
            }
        }
    };
}

/// Convenience macro combining codec implementation and constructors for
/// header-only PDUs.
macro_rules! impl_complete_header_only_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        $crate::macros::impl_header_only_pdu!($pdu_type, $command_id);
        $crate::macros::impl_header_only_constructors!($pdu_type);
    };
}

/// Macro for the `*_sm_resp` family: a header followed by a single
/// message_id C-string.
///
/// Error responses frequently arrive with no body at all, so an empty body
/// decodes as an empty message_id.
macro_rules! impl_message_id_response {
    ($pdu_type:ident, $command_id:expr) => {
        #[derive(Clone, Debug, PartialEq)]
        pub struct $pdu_type {
            pub command_status: $crate::datatypes::CommandStatus,
            pub sequence_number: u32,
            pub message_id: String,
        }

        impl $pdu_type {
            pub fn new(sequence_number: u32, message_id: impl Into<String>) -> Self {
                Self {
                    command_status: $crate::datatypes::CommandStatus::Ok,
                    sequence_number,
                    message_id: message_id.into(),
                }
            }

            pub fn error(sequence_number: u32, status: $crate::datatypes::CommandStatus) -> Self {
                Self {
                    command_status: status,
                    sequence_number,
                    message_id: String::new(),
                }
            }
        }

        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use bytes::Buf;

                Self::validate_header(&header)?;

                let message_id = if buf.has_remaining() {
                    $crate::codec::decode_cstring(buf, "message_id")?
                } else {
                    String::new()
                };

                Ok($pdu_type {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    message_id,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                let header = $crate::codec::PduHeader {
                    command_length: self.encoded_size() as u32,
                    command_id: $command_id,
                    command_status: self.command_status,
                    sequence_number: self.sequence_number,
                };
                header.encode(buf)?;
                $crate::codec::encode_cstring(buf, &self.message_id);
                Ok(())
            }

            fn encoded_size(&self) -> usize {
                $crate::codec::PduHeader::SIZE + self.message_id.chars().count() + 1
            }
        }
    };
}

/// Macro for the codec traits of PDUs whose body is an `SmBody`
/// (submit_sm and deliver_sm).
macro_rules! impl_sm_body_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        impl $pdu_type {
            pub fn new(sequence_number: u32, body: $crate::datatypes::SmBody) -> Self {
                Self {
                    command_status: $crate::datatypes::CommandStatus::Ok,
                    sequence_number,
                    body,
                }
            }
        }

        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                Self::validate_header(&header)?;

                Ok($pdu_type {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                    body: $crate::datatypes::SmBody::decode(buf)?,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                let header = $crate::codec::PduHeader {
                    command_length: self.encoded_size() as u32,
                    command_id: $command_id,
                    command_status: self.command_status,
                    sequence_number: self.sequence_number,
                };
                header.encode(buf)?;
                self.body.encode(buf)
            }

            fn encoded_size(&self) -> usize {
                $crate::codec::PduHeader::SIZE + self.body.encoded_size()
            }
        }
    };
}

/// Macro for generating builder setter methods
///
/// # Generated code
/// For each field, generates:
/// ```rust,ignore
/// pub fn $field(mut self, $field: $type) -> Self {
///     self.$field = $field;
///     self
/// }
/// ```
macro_rules! builder_setters {
    ($($field:ident: $type:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, $field: $type) -> Self {
                self.$field = $field;
                self
            }
        )*
    };
}

// Make macros available to the rest of the crate
pub(crate) use {
    builder_setters, impl_complete_header_only_pdu, impl_header_only_constructors,
    impl_header_only_pdu, impl_message_id_response, impl_sm_body_pdu,
};
