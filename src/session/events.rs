// ABOUTME: Observer interface for everything a gate reports to the outside world
// ABOUTME: The default observer forwards each callback to tracing

use crate::datatypes::{BodyFormat, MessageStatus};
use tracing::{Level, debug, error, info, trace, warn};

/// A complete inbound message, after any multipart reassembly
#[derive(Clone, Debug, PartialEq)]
pub struct NewMessage {
    pub channel: String,
    /// Id generated by the gateway and returned in the `*_resp`
    pub message_id: String,
    pub sender: String,
    pub recipient: String,
    pub body: String,
    pub format: BodyFormat,
    pub registered_delivery: u8,
}

/// Callbacks a gate raises while sessions run.
///
/// Implementations are called from session tasks and must not block.
pub trait GateEvents: Send + Sync {
    /// Free form log line
    fn log(&self, level: Level, text: &str);

    /// Something happened on a channel. `pdu` carries the hex dump of the
    /// PDU involved when the session runs in debug mode.
    fn channel_event(&self, channel: &str, description: &str, pdu: Option<&str>);

    fn new_message(&self, message: &NewMessage);

    /// A submitted message moved to `status`. `remote_id` is the SMSC's id
    /// once one is known.
    fn message_status_changed(&self, local_id: &str, status: MessageStatus, remote_id: Option<&str>);

    /// A delivery receipt arrived for the message the peer knows as `remote_id`
    fn delivery_report(&self, remote_id: &str, status: MessageStatus);
}

/// Observer that writes every callback to `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEvents;

impl GateEvents for TracingEvents {
    fn log(&self, level: Level, text: &str) {
        if level == Level::ERROR {
            error!("{}", text)
        } else if level == Level::WARN {
            warn!("{}", text)
        } else if level == Level::INFO {
            info!("{}", text)
        } else if level == Level::DEBUG {
            debug!("{}", text)
        } else {
            trace!("{}", text)
        }
    }

    fn channel_event(&self, channel: &str, description: &str, pdu: Option<&str>) {
        match pdu {
            Some(pdu) => debug!(channel = %channel, pdu = %pdu, "{}", description),
            None => info!(channel = %channel, "{}", description),
        }
    }

    fn new_message(&self, message: &NewMessage) {
        info!(
            channel = %message.channel,
            message_id = %message.message_id,
            sender = %message.sender,
            recipient = %message.recipient,
            format = message.format.name(),
            "New message: {}",
            message.body
        );
    }

    fn message_status_changed(&self, local_id: &str, status: MessageStatus, remote_id: Option<&str>) {
        info!(
            local_id = %local_id,
            status = %status,
            code = status.code(),
            remote_id = remote_id.unwrap_or(""),
            "Message status changed"
        );
    }

    fn delivery_report(&self, remote_id: &str, status: MessageStatus) {
        info!(remote_id = %remote_id, status = %status, "Delivery report");
    }
}
