use crate::datatypes::{CommandId, CommandStatus, SmBody};
use crate::macros::{impl_message_id_response, impl_sm_body_pdu};

/// This operation is used by the SMSC to deliver a short message to an ESME.
/// The deliver_sm PDU is used to deliver both mobile originated messages and
/// delivery receipts from the SMSC to the ESME.
///
/// schedule_delivery_time, validity_period and replace_if_present_flag are
/// unused in deliver_sm and travel as NULL/0.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSm {
    // pub command_length: u32,
    // pub command_id: CommandId::DeliverSm,
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    pub body: SmBody,
}

impl_sm_body_pdu!(DeliverSm, CommandId::DeliverSm);

impl_message_id_response!(DeliverSmResponse, CommandId::DeliverSmResp);
