// SMPP v3.4 Codec - Separates parsing/encoding logic from domain models
//
// This module provides a clean separation between the wire format (codec)
// and the domain models (PDUs). Each PDU implements Encodable/Decodable traits
// rather than having all parsing logic in a monolithic frame parser.

use crate::datatypes::{
    BindReceiver, BindReceiverResponse, BindTransceiver, BindTransceiverResponse, BindTransmitter,
    BindTransmitterResponse, BindType, CommandId, CommandStatus, DataSm, DataSmResponse,
    DeliverSm, DeliverSmResponse, EnquireLink, EnquireLinkResponse, GenericNack, SubmitSm,
    SubmitSmResponse, Unbind, UnbindResponse,
};
use crate::hex;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::OnceLock;
use thiserror::Error;

/// Largest PDU accepted by the framing check. Anything longer is treated as
/// a framing error and the receive buffer is discarded.
pub const MAX_PDU_SIZE: u32 = 1500;

/// SMPP v3.4 PDU Header (16 bytes, common to all PDUs)
#[derive(Debug, Clone, PartialEq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: CommandId,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Decode PDU header from buffer with validation
    ///
    /// A command_status outside the known table decodes as
    /// `CommandStatus::UnknownError`; the raw value is logged.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = buf.get_u32();
        let command_id_raw = buf.get_u32();
        let command_status_raw = buf.get_u32();
        let sequence_number = buf.get_u32();

        if !(Self::SIZE as u32..=MAX_PDU_SIZE).contains(&command_length) {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: Self::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        let command_id = CommandId::try_from(command_id_raw)
            .map_err(|_| CodecError::InvalidCommandId(command_id_raw))?;

        let command_status = CommandStatus::from_raw(command_status_raw);
        if command_status == CommandStatus::UnknownError && command_status_raw != 0xFF {
            tracing::warn!(
                command = %command_id,
                status = format_args!("{command_status_raw:#010x}"),
                "unrecognised command_status"
            );
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    /// Encode PDU header to buffer
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id as u32);
        buf.put_u32(self.command_status as u32);
        buf.put_u32(self.sequence_number);
        Ok(())
    }
}

/// Trait for types that can be encoded to bytes
pub trait Encodable {
    /// Encode this PDU to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Calculate the encoded size without actually encoding
    fn encoded_size(&self) -> usize {
        let mut buf = BytesMut::new();
        self.encode(&mut buf).map(|_| buf.len()).unwrap_or(0)
    }

    /// Convert this PDU to bytes
    ///
    /// Encodes into a fresh buffer and then rewrites the command_length field
    /// from the number of bytes actually produced.
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.encode(&mut buf)?;

        // Fix the command_length field in the header (first 4 bytes)
        if buf.len() >= 4 {
            let length = buf.len() as u32;
            buf[0..4].copy_from_slice(&length.to_be_bytes());
        }

        Ok(buf.freeze())
    }
}

/// Trait for types that can be decoded from bytes
pub trait Decodable: Sized {
    /// Decode this PDU from the buffer after header
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// Return the expected command_id for this PDU type
    fn command_id() -> CommandId;

    /// Validate the header is appropriate for this PDU type
    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if header.command_id != Self::command_id() {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_id(),
                actual: header.command_id,
            });
        }
        Ok(())
    }
}

/// Codec errors with detailed context for debugging
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Incomplete PDU: need more data")]
    Incomplete,

    #[error("Invalid command_id: {0:#x}")]
    InvalidCommandId(u32),

    #[error("Invalid PDU length: {length}, must be {min}-{max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("Unexpected command_id: expected {expected:?}, got {actual:?}")]
    UnexpectedCommandId {
        expected: CommandId,
        actual: CommandId,
    },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("Field '{field}' is missing its NUL terminator")]
    UnterminatedString { field: &'static str },

    #[error("TLV parsing error: {0}")]
    TlvError(String),

    #[error("command_length is {declared} but the PDU body ended after {consumed} bytes")]
    LengthMismatch { declared: u32, consumed: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert codec errors to appropriate SMPP command_status codes
impl CodecError {
    pub fn to_command_status(&self) -> CommandStatus {
        match self {
            CodecError::InvalidPduLength { .. } | CodecError::LengthMismatch { .. } => {
                CommandStatus::InvalidCommandLength
            }
            CodecError::InvalidCommandId(_) | CodecError::UnexpectedCommandId { .. } => {
                CommandStatus::InvalidCommandId
            }
            CodecError::FieldValidation { field, .. } => match *field {
                "source_addr" => CommandStatus::InvalidSourceAddress,
                "destination_addr" => CommandStatus::InvalidDestinationAddress,
                "short_message" => CommandStatus::InvalidMsgLength,
                _ => CommandStatus::SystemError,
            },
            CodecError::UnterminatedString { .. } | CodecError::Incomplete => {
                CommandStatus::InvalidMsgLength
            }
            CodecError::TlvError(_) => CommandStatus::ErrorInOptionalPartOfPduBody,
            CodecError::Io(_) => CommandStatus::SystemError,
        }
    }
}

/// Read a NUL-terminated ISO-8859-1 string and advance past the terminator.
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    field_name: &'static str,
) -> Result<String, CodecError> {
    let data: &[u8] = *buf.get_ref();
    let rest = data.get(buf.position() as usize..).unwrap_or_default();

    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::UnterminatedString { field: field_name })?;

    let value = hex::latin1_string(&rest[..end]);
    buf.advance(end + 1);
    Ok(value)
}

/// Decode a single byte
pub fn decode_u8(buf: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u8())
}

/// Decode a 16-bit big-endian integer
pub fn decode_u16(buf: &mut Cursor<&[u8]>) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u16())
}

/// Peek at next 4 bytes without advancing cursor (for command_length)
pub fn peek_u32(buf: &mut Cursor<&[u8]>) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Incomplete);
    }

    let pos = buf.position();
    let value = buf.get_u32();
    buf.set_position(pos);
    Ok(value)
}

/// Write `value` as ISO-8859-1 followed by a NUL terminator.
pub fn encode_cstring(buf: &mut BytesMut, value: &str) {
    buf.put_slice(&hex::latin1_bytes(value));
    buf.put_u8(0);
}

/// Encoded size of a C-string field, terminator included
pub fn cstring_size(value: &str) -> usize {
    value.chars().count() + 1
}

/// Generic frame type that can hold any PDU the gateway exchanges
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    // Bind PDUs
    BindReceiver(BindReceiver),
    BindReceiverResp(BindReceiverResponse),
    BindTransmitter(BindTransmitter),
    BindTransmitterResp(BindTransmitterResponse),
    BindTransceiver(BindTransceiver),
    BindTransceiverResp(BindTransceiverResponse),

    // Message PDUs
    SubmitSm(Box<SubmitSm>),
    SubmitSmResp(SubmitSmResponse),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResp(DeliverSmResponse),
    DataSm(Box<DataSm>),
    DataSmResp(DataSmResponse),

    // Keep-alive PDUs
    EnquireLink(EnquireLink),
    EnquireLinkResp(EnquireLinkResponse),

    // Session management PDUs
    Unbind(Unbind),
    UnbindResp(UnbindResponse),

    GenericNack(GenericNack),

    // Valid SMPP commands the gateway does not implement
    Unknown { header: PduHeader, body: Bytes },
}

/// Registry of PDU decoders for extensible parsing
type DecoderFn =
    Box<dyn Fn(PduHeader, &mut Cursor<&[u8]>) -> Result<Frame, CodecError> + Send + Sync>;

pub struct PduRegistry {
    decoders: HashMap<CommandId, DecoderFn>,
}

impl PduRegistry {
    /// Create a new registry with the gateway's PDUs registered
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };

        registry.register_pdu::<BindReceiver, _>(Frame::BindReceiver);
        registry.register_pdu::<BindReceiverResponse, _>(Frame::BindReceiverResp);
        registry.register_pdu::<BindTransmitter, _>(Frame::BindTransmitter);
        registry.register_pdu::<BindTransmitterResponse, _>(Frame::BindTransmitterResp);
        registry.register_pdu::<BindTransceiver, _>(Frame::BindTransceiver);
        registry.register_pdu::<BindTransceiverResponse, _>(Frame::BindTransceiverResp);

        // Message PDUs are boxed
        registry.register_pdu::<SubmitSm, _>(|pdu| Frame::SubmitSm(Box::new(pdu)));
        registry.register_pdu::<SubmitSmResponse, _>(Frame::SubmitSmResp);
        registry.register_pdu::<DeliverSm, _>(|pdu| Frame::DeliverSm(Box::new(pdu)));
        registry.register_pdu::<DeliverSmResponse, _>(Frame::DeliverSmResp);
        registry.register_pdu::<DataSm, _>(|pdu| Frame::DataSm(Box::new(pdu)));
        registry.register_pdu::<DataSmResponse, _>(Frame::DataSmResp);

        registry.register_pdu::<EnquireLink, _>(Frame::EnquireLink);
        registry.register_pdu::<EnquireLinkResponse, _>(Frame::EnquireLinkResp);
        registry.register_pdu::<Unbind, _>(Frame::Unbind);
        registry.register_pdu::<UnbindResponse, _>(Frame::UnbindResp);
        registry.register_pdu::<GenericNack, _>(Frame::GenericNack);

        registry
    }

    /// The process-wide registry, built on first use
    pub fn global() -> &'static PduRegistry {
        static REGISTRY: OnceLock<PduRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PduRegistry::new)
    }

    fn register_pdu<T, F>(&mut self, frame_constructor: F)
    where
        T: Decodable + 'static,
        F: Fn(T) -> Frame + Send + Sync + 'static,
    {
        let command_id = T::command_id();
        let decoder = Box::new(move |header: PduHeader, buf: &mut Cursor<&[u8]>| {
            let pdu = T::decode(header, buf)?;
            Ok(frame_constructor(pdu))
        });
        self.decoders.insert(command_id, decoder);
    }

    /// Decode a PDU given its header and a cursor over exactly its body
    pub fn decode_pdu(
        &self,
        header: PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Frame, CodecError> {
        match self.decoders.get(&header.command_id) {
            Some(decoder) => decoder(header, buf),
            None => {
                let body = buf.copy_to_bytes(buf.remaining());
                tracing::warn!(
                    command = %header.command_id,
                    "unsupported PDU, treating as opaque data"
                );

                Ok(Frame::Unknown { header, body })
            }
        }
    }

    /// Check if a command_id is registered
    pub fn is_registered(&self, command_id: CommandId) -> bool {
        self.decoders.contains_key(&command_id)
    }

    /// Get all registered command_ids
    pub fn registered_commands(&self) -> Vec<CommandId> {
        self.decoders.keys().copied().collect()
    }
}

impl Default for PduRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    /// Get the command_id for this frame
    pub fn command_id(&self) -> CommandId {
        match self {
            Frame::BindReceiver(_) => CommandId::BindReceiver,
            Frame::BindReceiverResp(_) => CommandId::BindReceiverResp,
            Frame::BindTransmitter(_) => CommandId::BindTransmitter,
            Frame::BindTransmitterResp(_) => CommandId::BindTransmitterResp,
            Frame::BindTransceiver(_) => CommandId::BindTransceiver,
            Frame::BindTransceiverResp(_) => CommandId::BindTransceiverResp,
            Frame::SubmitSm(_) => CommandId::SubmitSm,
            Frame::SubmitSmResp(_) => CommandId::SubmitSmResp,
            Frame::DeliverSm(_) => CommandId::DeliverSm,
            Frame::DeliverSmResp(_) => CommandId::DeliverSmResp,
            Frame::DataSm(_) => CommandId::DataSm,
            Frame::DataSmResp(_) => CommandId::DataSmResp,
            Frame::EnquireLink(_) => CommandId::EnquireLink,
            Frame::EnquireLinkResp(_) => CommandId::EnquireLinkResp,
            Frame::Unbind(_) => CommandId::Unbind,
            Frame::UnbindResp(_) => CommandId::UnbindResp,
            Frame::GenericNack(_) => CommandId::GenericNack,
            Frame::Unknown { header, .. } => header.command_id,
        }
    }

    /// Get the sequence number for this frame
    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::BindReceiver(pdu) => pdu.sequence_number,
            Frame::BindReceiverResp(pdu) => pdu.sequence_number,
            Frame::BindTransmitter(pdu) => pdu.sequence_number,
            Frame::BindTransmitterResp(pdu) => pdu.sequence_number,
            Frame::BindTransceiver(pdu) => pdu.sequence_number,
            Frame::BindTransceiverResp(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::SubmitSmResp(pdu) => pdu.sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number,
            Frame::DataSm(pdu) => pdu.sequence_number,
            Frame::DataSmResp(pdu) => pdu.sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::EnquireLinkResp(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::UnbindResp(pdu) => pdu.sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number,
            Frame::Unknown { header, .. } => header.sequence_number,
        }
    }

    /// Get the command_status for this frame
    pub fn command_status(&self) -> CommandStatus {
        match self {
            Frame::BindReceiver(pdu) => pdu.command_status,
            Frame::BindReceiverResp(pdu) => pdu.command_status,
            Frame::BindTransmitter(pdu) => pdu.command_status,
            Frame::BindTransmitterResp(pdu) => pdu.command_status,
            Frame::BindTransceiver(pdu) => pdu.command_status,
            Frame::BindTransceiverResp(pdu) => pdu.command_status,
            Frame::SubmitSm(pdu) => pdu.command_status,
            Frame::SubmitSmResp(pdu) => pdu.command_status,
            Frame::DeliverSm(pdu) => pdu.command_status,
            Frame::DeliverSmResp(pdu) => pdu.command_status,
            Frame::DataSm(pdu) => pdu.command_status,
            Frame::DataSmResp(pdu) => pdu.command_status,
            Frame::EnquireLink(pdu) => pdu.command_status,
            Frame::EnquireLinkResp(pdu) => pdu.command_status,
            Frame::Unbind(pdu) => pdu.command_status,
            Frame::UnbindResp(pdu) => pdu.command_status,
            Frame::GenericNack(pdu) => pdu.command_status,
            Frame::Unknown { header, .. } => header.command_status,
        }
    }

    /// Check if this frame is a response PDU
    pub fn is_response(&self) -> bool {
        self.command_id().is_response()
    }

    /// The bind flavour and credentials carried by a bind request
    pub fn bind_request(&self) -> Option<(BindType, &str, &str)> {
        match self {
            Frame::BindReceiver(pdu) => Some((BindType::Receiver, &pdu.system_id, &pdu.password)),
            Frame::BindTransmitter(pdu) => {
                Some((BindType::Transmitter, &pdu.system_id, &pdu.password))
            }
            Frame::BindTransceiver(pdu) => {
                Some((BindType::Transceiver, &pdu.system_id, &pdu.password))
            }
            _ => None,
        }
    }

    /// Serialize the frame, with command_length computed from the output
    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        match self {
            Frame::BindReceiver(pdu) => pdu.to_bytes(),
            Frame::BindReceiverResp(pdu) => pdu.to_bytes(),
            Frame::BindTransmitter(pdu) => pdu.to_bytes(),
            Frame::BindTransmitterResp(pdu) => pdu.to_bytes(),
            Frame::BindTransceiver(pdu) => pdu.to_bytes(),
            Frame::BindTransceiverResp(pdu) => pdu.to_bytes(),
            Frame::SubmitSm(pdu) => pdu.to_bytes(),
            Frame::SubmitSmResp(pdu) => pdu.to_bytes(),
            Frame::DeliverSm(pdu) => pdu.to_bytes(),
            Frame::DeliverSmResp(pdu) => pdu.to_bytes(),
            Frame::DataSm(pdu) => pdu.to_bytes(),
            Frame::DataSmResp(pdu) => pdu.to_bytes(),
            Frame::EnquireLink(pdu) => pdu.to_bytes(),
            Frame::EnquireLinkResp(pdu) => pdu.to_bytes(),
            Frame::Unbind(pdu) => pdu.to_bytes(),
            Frame::UnbindResp(pdu) => pdu.to_bytes(),
            Frame::GenericNack(pdu) => pdu.to_bytes(),
            Frame::Unknown { header, body } => {
                let mut buf = BytesMut::with_capacity(PduHeader::SIZE + body.len());
                PduHeader {
                    command_length: (PduHeader::SIZE + body.len()) as u32,
                    ..header.clone()
                }
                .encode(&mut buf)?;
                buf.put_slice(body);
                Ok(buf.freeze())
            }
        }
    }

    /// Check whether a complete PDU is buffered, returning its length.
    ///
    /// Returns `Incomplete` until all `command_length` bytes are available.
    /// A declared length outside `16..=MAX_PDU_SIZE` is a framing error.
    pub fn check(buf: &mut Cursor<&[u8]>) -> Result<usize, CodecError> {
        let command_length = peek_u32(buf)?;

        if !(PduHeader::SIZE as u32..=MAX_PDU_SIZE).contains(&command_length) {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        if buf.remaining() < command_length as usize {
            return Err(CodecError::Incomplete);
        }

        Ok(command_length as usize)
    }

    /// Parse one complete PDU starting at the cursor.
    ///
    /// The body decoder sees exactly `command_length - 16` bytes. If it stops
    /// short of that, the PDU is rejected with `LengthMismatch`. Once the
    /// length check passes the cursor is advanced past the whole PDU, even
    /// when decoding then fails.
    pub fn parse(buf: &mut Cursor<&[u8]>) -> Result<Frame, CodecError> {
        let len = Self::check(buf)?;
        let data: &[u8] = *buf.get_ref();
        let start = buf.position() as usize;
        let pdu = &data[start..start + len];
        buf.advance(len);

        let mut cursor = Cursor::new(pdu);
        let header = PduHeader::decode(&mut cursor)?;
        let declared = header.command_length;

        let mut body = Cursor::new(&pdu[PduHeader::SIZE..]);
        let frame = PduRegistry::global().decode_pdu(header, &mut body)?;

        if body.has_remaining() {
            return Err(CodecError::LengthMismatch {
                declared,
                consumed: (PduHeader::SIZE as u64 + body.position()) as u32,
            });
        }

        Ok(frame)
    }
}
