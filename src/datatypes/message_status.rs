// ABOUTME: Gateway-level message states reported to observers
// ABOUTME: Numeric codes are shared with the systems that consume gateway events

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Life cycle state of a message passing through the gateway.
///
/// 1xx codes describe inbound messages, 2xx outbound ones.
#[derive(TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageStatus {
    ReceivedWaitingToBeProcessed = 100,
    ReceivedRouted = 101,
    ReceivedNoRouteSpecified = 102,
    ReceivedRouteFailure = 103,
    Rejected = 104,
    UnknownRecipient = 105,
    UnableToReceive = 107,
    Timeout = 108,

    Scheduled = 200,
    Queued = 201,
    SubmittedWaitingForAck = 202,
    GenericError = 210,
    NoChannelCanHandleMessage = 211,
    MessageUndeliverable = 212,
    NackReceived = 213,
    AckExpired = 214,
    DuplicateAckDetected = 215,
    Sent = 220,
    DeliveredAckReceived = 221,
    OutOfBalance = 254,
    LockedBySystem = 255,
}

impl MessageStatus {
    pub fn code(&self) -> u8 {
        (*self).into()
    }

    pub fn name(&self) -> &'static str {
        use MessageStatus::*;

        match self {
            ReceivedWaitingToBeProcessed => "received_waiting_to_be_processed",
            ReceivedRouted => "received_routed",
            ReceivedNoRouteSpecified => "received_no_route_specified",
            ReceivedRouteFailure => "received_route_failure",
            Rejected => "rejected",
            UnknownRecipient => "unknown_recipient",
            UnableToReceive => "unable_to_receive",
            Timeout => "timeout",
            Scheduled => "scheduled",
            Queued => "queued",
            SubmittedWaitingForAck => "submitted_waiting_for_ack",
            GenericError => "generic_error",
            NoChannelCanHandleMessage => "no_channel_can_handle_message",
            MessageUndeliverable => "message_undeliverable",
            NackReceived => "nack_received",
            AckExpired => "ack_expired",
            DuplicateAckDetected => "duplicate_ack_detected",
            Sent => "sent",
            DeliveredAckReceived => "delivered_ack_received",
            OutOfBalance => "out_of_balance",
            LockedBySystem => "locked_by_system",
        }
    }

    /// The `stat:` word written into a delivery receipt reporting this status
    pub fn receipt_stat(&self) -> &'static str {
        use MessageStatus::*;

        match self {
            Queued | ReceivedWaitingToBeProcessed | Scheduled => "ACCEPTD",
            GenericError | LockedBySystem | NackReceived | Rejected | OutOfBalance => "REJECTD",
            MessageUndeliverable
            | ReceivedRouteFailure
            | ReceivedNoRouteSpecified
            | NoChannelCanHandleMessage => "UNDELIV",
            UnknownRecipient => "UNKNOWN",
            _ => "DELIVRD",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_codes() {
        assert_eq!(MessageStatus::ReceivedRouted.code(), 101);
        assert_eq!(MessageStatus::Timeout.code(), 108);
        assert_eq!(MessageStatus::Sent.code(), 220);
        assert_eq!(
            MessageStatus::try_from(221u8).unwrap(),
            MessageStatus::DeliveredAckReceived
        );
        assert!(MessageStatus::try_from(106u8).is_err());
    }

    #[test]
    fn receipt_stat_words() {
        assert_eq!(MessageStatus::Sent.receipt_stat(), "DELIVRD");
        assert_eq!(MessageStatus::AckExpired.receipt_stat(), "DELIVRD");
        assert_eq!(MessageStatus::Queued.receipt_stat(), "ACCEPTD");
        assert_eq!(MessageStatus::OutOfBalance.receipt_stat(), "REJECTD");
        assert_eq!(
            MessageStatus::NoChannelCanHandleMessage.receipt_stat(),
            "UNDELIV"
        );
        assert_eq!(MessageStatus::UnknownRecipient.receipt_stat(), "UNKNOWN");
        assert_eq!(MessageStatus::Timeout.receipt_stat(), "DELIVRD");
    }
}
