use crate::codec::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;
use std::io::Cursor;

pub const DEST_ADDR_SUBUNIT: u16 = 0x0005;
pub const DEST_NETWORK_TYPE: u16 = 0x0006;
pub const DEST_BEARER_TYPE: u16 = 0x0007;
pub const DEST_TELEMATICS_ID: u16 = 0x0008;
pub const SOURCE_ADDR_SUBUNIT: u16 = 0x000D;
pub const SOURCE_NETWORK_TYPE: u16 = 0x000E;
pub const SOURCE_BEARER_TYPE: u16 = 0x000F;
pub const SOURCE_TELEMATICS_ID: u16 = 0x0010;
pub const QOS_TIME_TO_LIVE: u16 = 0x0017;
pub const PAYLOAD_TYPE: u16 = 0x0019;
pub const ADDITIONAL_STATUS_INFO_TEXT: u16 = 0x001D;
pub const RECEIPTED_MESSAGE_ID: u16 = 0x001E;
pub const MS_MSG_WAIT_FACILITIES: u16 = 0x0030;
pub const PRIVACY_INDICATOR: u16 = 0x0201;
pub const SOURCE_SUBADDRESS: u16 = 0x0202;
pub const DEST_SUBADDRESS: u16 = 0x0203;
pub const USER_MESSAGE_REFERENCE: u16 = 0x0204;
pub const USER_RESPONSE_CODE: u16 = 0x0205;
pub const SOURCE_PORT: u16 = 0x020A;
pub const DESTINATION_PORT: u16 = 0x020B;
pub const SAR_MSG_REF_NUM: u16 = 0x020C;
pub const LANGUAGE_INDICATOR: u16 = 0x020D;
pub const SAR_TOTAL_SEGMENTS: u16 = 0x020E;
pub const SAR_SEGMENT_SEQNUM: u16 = 0x020F;
pub const SC_INTERFACE_VERSION: u16 = 0x0210;
pub const CALLBACK_NUM_PRES_IND: u16 = 0x0302;
pub const CALLBACK_NUM_ATAG: u16 = 0x0303;
pub const NUMBER_OF_MESSAGES: u16 = 0x0304;
pub const CALLBACK_NUM: u16 = 0x0381;
pub const DPF_RESULT: u16 = 0x0420;
pub const SET_DPF: u16 = 0x0421;
pub const MS_AVAILABILITY_STATUS: u16 = 0x0422;
pub const NETWORK_ERROR_CODE: u16 = 0x0423;
pub const MESSAGE_PAYLOAD: u16 = 0x0424;
pub const DELIVERY_FAILURE_REASON: u16 = 0x0425;
pub const MORE_MESSAGES_TO_SEND: u16 = 0x0426;
pub const MESSAGE_STATE: u16 = 0x0427;
pub const USSD_SERVICE_OP: u16 = 0x0501;
pub const DISPLAY_TIME: u16 = 0x1201;
pub const SMS_SIGNAL: u16 = 0x1203;
pub const MS_VALIDITY: u16 = 0x1204;
pub const ALERT_ON_MESSAGE_DELIVERY: u16 = 0x130C;
pub const ITS_REPLY_TYPE: u16 = 0x1380;
pub const ITS_SESSION_INFO: u16 = 0x1383;

/// Name of an SMPP 3.4 optional parameter, if the tag is a standard one.
pub fn tag_name(tag: u16) -> Option<&'static str> {
    let name = match tag {
        DEST_ADDR_SUBUNIT => "dest_addr_subunit",
        DEST_NETWORK_TYPE => "dest_network_type",
        DEST_BEARER_TYPE => "dest_bearer_type",
        DEST_TELEMATICS_ID => "dest_telematics_id",
        SOURCE_ADDR_SUBUNIT => "source_addr_subunit",
        SOURCE_NETWORK_TYPE => "source_network_type",
        SOURCE_BEARER_TYPE => "source_bearer_type",
        SOURCE_TELEMATICS_ID => "source_telematics_id",
        QOS_TIME_TO_LIVE => "qos_time_to_live",
        PAYLOAD_TYPE => "payload_type",
        ADDITIONAL_STATUS_INFO_TEXT => "additional_status_info_text",
        RECEIPTED_MESSAGE_ID => "receipted_message_id",
        MS_MSG_WAIT_FACILITIES => "ms_msg_wait_facilities",
        PRIVACY_INDICATOR => "privacy_indicator",
        SOURCE_SUBADDRESS => "source_subaddress",
        DEST_SUBADDRESS => "dest_subaddress",
        USER_MESSAGE_REFERENCE => "user_message_reference",
        USER_RESPONSE_CODE => "user_response_code",
        SOURCE_PORT => "source_port",
        DESTINATION_PORT => "destination_port",
        SAR_MSG_REF_NUM => "sar_msg_ref_num",
        LANGUAGE_INDICATOR => "language_indicator",
        SAR_TOTAL_SEGMENTS => "sar_total_segments",
        SAR_SEGMENT_SEQNUM => "sar_segment_seqnum",
        SC_INTERFACE_VERSION => "sc_interface_version",
        CALLBACK_NUM_PRES_IND => "callback_num_pres_ind",
        CALLBACK_NUM_ATAG => "callback_num_atag",
        NUMBER_OF_MESSAGES => "number_of_messages",
        CALLBACK_NUM => "callback_num",
        DPF_RESULT => "dpf_result",
        SET_DPF => "set_dpf",
        MS_AVAILABILITY_STATUS => "ms_availability_status",
        NETWORK_ERROR_CODE => "network_error_code",
        MESSAGE_PAYLOAD => "message_payload",
        DELIVERY_FAILURE_REASON => "delivery_failure_reason",
        MORE_MESSAGES_TO_SEND => "more_messages_to_send",
        MESSAGE_STATE => "message_state",
        USSD_SERVICE_OP => "ussd_service_op",
        DISPLAY_TIME => "display_time",
        SMS_SIGNAL => "sms_signal",
        MS_VALIDITY => "ms_validity",
        ALERT_ON_MESSAGE_DELIVERY => "alert_on_message_delivery",
        ITS_REPLY_TYPE => "its_reply_type",
        ITS_SESSION_INFO => "its_session_info",
        _ => return None,
    };
    Some(name)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tlv {
    /// The Tag field is used to uniquely identify the particular optional parameter in question.
    pub tag: u16,

    /// The Length field indicates the length of the Value field in octets.
    /// Note that this length does not include the length of the Tag and Length fields.
    pub length: u16,

    /// The Value field contains the actual data for the optional parameter in question.
    pub value: Bytes,
}

impl Tlv {
    pub const HEADER_SIZE: usize = 4;

    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        let value = value.into();
        Self {
            tag,
            length: value.len() as u16,
            value,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.value.len() > u16::MAX as usize {
            return Err(CodecError::TlvError(format!(
                "value of tag {:#06x} is {} octets, limit is {}",
                self.tag,
                self.value.len(),
                u16::MAX
            )));
        }

        buf.put_u16(self.tag);
        buf.put_u16(self.value.len() as u16);
        buf.put_slice(&self.value);
        Ok(())
    }

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::HEADER_SIZE {
            return Err(CodecError::TlvError(format!(
                "{} trailing octets cannot hold a tag and length",
                buf.remaining()
            )));
        }

        let tag = buf.get_u16();
        let length = buf.get_u16();
        if buf.remaining() < length as usize {
            return Err(CodecError::TlvError(format!(
                "tag {:#06x} declares {} octets but only {} remain",
                tag,
                length,
                buf.remaining()
            )));
        }

        let value = buf.copy_to_bytes(length as usize);
        Ok(Tlv { tag, length, value })
    }

    pub fn encoded_size(&self) -> usize {
        Self::HEADER_SIZE + self.value.len()
    }

    pub fn name(&self) -> Option<&'static str> {
        tag_name(self.tag)
    }
}

/// Optional parameters of one PDU, keyed by tag.
///
/// Tags without a known name are retained as-is. A tag repeated on the wire
/// keeps its last value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TlvMap {
    entries: BTreeMap<u16, Tlv>,
}

impl TlvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read TLVs until the cursor is exhausted.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let mut map = TlvMap::new();
        while buf.has_remaining() {
            map.insert(Tlv::decode(buf)?);
        }
        Ok(map)
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        for tlv in self.entries.values() {
            tlv.encode(buf)?;
        }
        Ok(())
    }

    pub fn encoded_size(&self) -> usize {
        self.entries.values().map(Tlv::encoded_size).sum()
    }

    pub fn insert(&mut self, tlv: Tlv) -> Option<Tlv> {
        self.entries.insert(tlv.tag, tlv)
    }

    pub fn get(&self, tag: u16) -> Option<&Tlv> {
        self.entries.get(&tag)
    }

    pub fn value(&self, tag: u16) -> Option<&Bytes> {
        self.entries.get(&tag).map(|tlv| &tlv.value)
    }

    pub fn remove(&mut self, tag: u16) -> Option<Tlv> {
        self.entries.remove(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tlv> {
        self.entries.values()
    }
}
