mod bind;
mod command_id;
mod command_status;
mod data_coding;
mod data_sm;
mod deliver_sm;
mod delivery_receipt;
mod enquire_link;
mod generic_nack;
mod interface_version;
mod message_status;
mod numeric_plan_indicator;
mod sm_body;
mod submit_sm;
pub mod tlv;
mod type_of_number;
mod unbind;

pub use bind::{
    BindCredentials, BindReceiver, BindReceiverResponse, BindTransceiver,
    BindTransceiverResponse, BindTransmitter, BindTransmitterResponse, BindType,
};
pub use command_id::CommandId;
pub use command_status::CommandStatus;
pub use data_coding::{BodyFormat, UnknownBodyFormat};
pub use data_sm::{DataSm, DataSmResponse};
pub use deliver_sm::{DeliverSm, DeliverSmResponse};
pub use delivery_receipt::{DeliveryReceipt, ReceiptStat};
pub use enquire_link::{EnquireLink, EnquireLinkResponse};
pub use generic_nack::GenericNack;
pub use interface_version::InterfaceVersion;
pub use message_status::MessageStatus;
pub use numeric_plan_indicator::NumericPlanIndicator;
pub use sm_body::{
    ESM_CLASS_DELIVERY_RECEIPT, ESM_CLASS_UDHI, MAX_SHORT_MESSAGE_LENGTH, SmBody,
};
pub use submit_sm::{SubmitSm, SubmitSmResponse};
pub use tlv::{Tlv, TlvMap};
pub use type_of_number::TypeOfNumber;
pub use unbind::{Unbind, UnbindResponse};
