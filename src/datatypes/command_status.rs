use num_enum::TryFromPrimitive;
/// The command_status field of an SMPP message response indicates the success
/// or failure of an SMPP request. It is relevant only in the SMPP response
/// message and should be set to NULL in SMPP request messages. The SMPP Error
/// status codes are returned by the SMSC in the command_status field  of the
/// SMPP message header and in the error_status_code field of a
/// submit_multi_resp message.

#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum CommandStatus {
    /// No Error
    #[default]
    Ok = 0x00000000,

    /// Message Length is invalid
    InvalidMsgLength = 0x00000001,

    /// Command Length is invalid
    InvalidCommandLength = 0x00000002,

    /// Invalid Command ID
    InvalidCommandId = 0x00000003,

    /// Incorrect BIND Status for given command
    IncorrectBindStatus = 0x00000004,

    /// ESME Already in Bound State
    AlreadyBoundState = 0x00000005,

    /// Invalid Priority Flag
    InvalidPriorityFlag = 0x00000006,

    /// Invalid Registered Delivery Flag
    InvalidRegisteredDeliveryFlag = 0x00000007,

    /// System Error
    SystemError = 0x00000008,

    // Reserved   0x00000009
    /// Invalid Source Address
    InvalidSourceAddress = 0x0000000A,

    /// Invalid Dest Addr
    InvalidDestinationAddress = 0x0000000B,

    /// Message ID is invalid
    InvalidMessageId = 0x0000000C,

    /// Bind Failed
    BindFailed = 0x0000000D,

    /// Invalid Password
    InvalidPassword = 0x0000000E,

    /// Invalid System ID
    InvalidSystemId = 0x0000000F,

    // Reserved 0x00000010
    /// Cancel SM Failed
    CancelSmFailed = 0x00000011,

    // Reserved 0x00000012
    /// Replace SM Failed
    ReplaceSmFailed = 0x00000013,

    /// Message Queue Full
    MessageQueueFull = 0x00000014,

    /// Invalid Service Type
    InvalidServiceType = 0x00000015,

    // Reserved 0x00000016 - 0x00000032
    /// Invalid number of destinations
    InvalidNumberOfDestinations = 0x00000033,

    /// Invalid Distribution List name
    InvalidDistributionListName = 0x00000034,

    // Reserved 0x00000035 - 0x0000003F
    /// Destination flag is invalid (submit_multi)
    InvalidDestinationFlag = 0x00000040,

    // Reserved    0x00000041
    /// Invalid 'submit with replace' request
    /// (i.e. submit_sm with replace_if_present_flag set)
    InvalidSubmitWithReplaceRequest = 0x00000042,

    /// Invalid esm_class field data
    InvalidEsmClassFieldData = 0x00000043,

    /// Cannot Submit to Distribution List
    CannotSubmitToDistributionList = 0x00000044,

    /// submit_sm or submit_multi failed
    SubmitFailed = 0x00000045,

    // Reserved 0x00000046 - 0x00000047
    /// Invalid Source address TON
    InvalidSourceAddressTon = 0x00000048,

    /// Invalid Source address NPI
    InvalidSourceAddressNpi = 0x00000049,

    /// Invalid Destination address TON
    InvalidDestinationAddressTon = 0x00000050,

    /// Invalid Destination address NPI
    InvalidDestinationAddressNpi = 0x00000051,

    // Reserved 0x00000052
    /// Invalid system_type field
    InvalidSystemTypeField = 0x00000053,
    /// Invalid replace_if_present flag
    InvalidReplaceIfPresentFlag = 0x00000054,
    /// Invalid number of messages
    InvalidNumberOfMessages = 0x00000055,

    // Reserved 0x00000056 - 0x00000057
    /// Throttling error (ESME has exceeded allowed message limits)
    ThrottlingError = 0x00000058,

    // Reserved 0x00000059 - 0x00000060
    /// Invalid Scheduled Delivery Time
    InvalidScheduledDeliveryTime = 0x00000061,
    /// Invalid message validity period (Expiry time)
    InvalidExpiryTime = 0x00000062,
    /// Predefined Message Invalid or Not Found
    InvalidPredefinedMessageId = 0x00000063,
    /// ESME Receiver Temporary App Error Code
    ReceiverTemporaryAppError = 0x00000064,
    /// ESME Receiver Permanent App Error Code
    ReceiverPermanentAppError = 0x00000065,
    /// ESME Receiver Reject Message Error Code
    ReceiverRejectMessageError = 0x00000066,
    /// query_sm request failed
    QuerySmRequestFailed = 0x00000067,

    // Reserved 0x00000068 - 0x000000BF
    /// Error in the optional part of the PDU Body.
    ErrorInOptionalPartOfPduBody = 0x000000C0,
    /// Optional Parameter not allowed
    OptionalParameterNotAllowed = 0x000000C1,
    /// Invalid Parameter Length.
    InvalidParameterLength = 0x000000C2,
    /// Expected Optional Parameter missing
    ExpectedOptionalParameterMissing = 0x000000C3,
    /// Invalid Optional Parameter Value
    InvalidOptionalParameterValue = 0x000000C4,

    // Reserved 0x000000C5 - 0x000000FD
    /// Delivery Failure (used for data_sm_resp)
    DeliveryFailed = 0x000000FE,

    /// Unknown Error
    UnknownError = 0x000000FF,
    // Reserved for SMPP extension
    // 0x00000100- 0x000003FF
    //Reserved for SMPP extension
    //Reserved for SMSC vendor specific errors
    // 0x00000400- 0x000004FF
    //Reserved for SMSC vendor specific errors
    // Reserved 0x00000500- 0xFFFFFFFF
}

impl CommandStatus {
    /// Decode a raw status, folding codes outside the table into `UnknownError`
    pub fn from_raw(raw: u32) -> Self {
        CommandStatus::try_from(raw).unwrap_or(CommandStatus::UnknownError)
    }

    pub fn is_ok(&self) -> bool {
        *self == CommandStatus::Ok
    }

    /// Symbolic ESME_R* code
    pub fn short_code(&self) -> &'static str {
        self.descriptor().0
    }

    /// Human readable description
    pub fn description(&self) -> &'static str {
        self.descriptor().1
    }

    fn descriptor(&self) -> (&'static str, &'static str) {
        use CommandStatus::*;

        match self {
            Ok => ("ESME_ROK", "Ok"),
            InvalidMsgLength => ("ESME_RINVMSGLEN", "Message Length is invalid"),
            InvalidCommandLength => ("ESME_RINVCMDLEN", "Command Length is invalid"),
            InvalidCommandId => ("ESME_RINVCMDID", "Invalid Command ID"),
            IncorrectBindStatus => ("ESME_RINVBNDSTS", "Incorrect BIND Status for given command"),
            AlreadyBoundState => ("ESME_RALYBND", "ESME Already in Bound State"),
            InvalidPriorityFlag => ("ESME_RINVPRTFLG", "Invalid Priority Flag"),
            InvalidRegisteredDeliveryFlag => {
                ("ESME_RINVREGDLVFLG", "Invalid Registered Delivery Flag")
            }
            SystemError => ("ESME_RSYSERR", "System Error"),
            InvalidSourceAddress => ("ESME_RINVSRCADR", "Invalid Source Address"),
            InvalidDestinationAddress => ("ESME_RINVDSTADR", "Invalid Dest Addr"),
            InvalidMessageId => ("ESME_RINVMSGID", "Message ID is invalid"),
            BindFailed => ("ESME_RBINDFAIL", "Bind Failed"),
            InvalidPassword => ("ESME_RINVPASWD", "Invalid Password"),
            InvalidSystemId => ("ESME_RINVSYSID", "Invalid System ID"),
            CancelSmFailed => ("ESME_RCANCELFAIL", "Cancel SM Failed"),
            ReplaceSmFailed => ("ESME_RREPLACEFAIL", "Replace SM Failed"),
            MessageQueueFull => ("ESME_RMSGQFUL", "Message Queue Full"),
            InvalidServiceType => ("ESME_RINVSERTYP", "Invalid Service Type"),
            InvalidNumberOfDestinations => ("ESME_RINVNUMDESTS", "Invalid number of destinations"),
            InvalidDistributionListName => ("ESME_RINVDLNAME", "Invalid Distribution List name"),
            InvalidDestinationFlag => ("ESME_RINVDESTFLAG", "Destination flag is invalid"),
            InvalidSubmitWithReplaceRequest => {
                ("ESME_RINVSUBREP", "Invalid 'submit with replace' request")
            }
            InvalidEsmClassFieldData => ("ESME_RINVESMCLASS", "Invalid esm_class field data"),
            CannotSubmitToDistributionList => {
                ("ESME_RCNTSUBDL", "Cannot Submit to Distribution List")
            }
            SubmitFailed => ("ESME_RSUBMITFAIL", "submit_sm or submit_multi failed"),
            InvalidSourceAddressTon => ("ESME_RINVSRCTON", "Invalid Source address TON"),
            InvalidSourceAddressNpi => ("ESME_RINVSRCNPI", "Invalid Source address NPI"),
            InvalidDestinationAddressTon => ("ESME_RINVDSTTON", "Invalid Destination address TON"),
            InvalidDestinationAddressNpi => ("ESME_RINVDSTNPI", "Invalid Destination address NPI"),
            InvalidSystemTypeField => ("ESME_RINVSYSTYP", "Invalid system_type field"),
            InvalidReplaceIfPresentFlag => ("ESME_RINVREPFLAG", "Invalid replace_if_present flag"),
            InvalidNumberOfMessages => ("ESME_RINVNUMMSGS", "Invalid number of messages"),
            ThrottlingError => ("ESME_RTHROTTLED", "Throttling error"),
            InvalidScheduledDeliveryTime => ("ESME_RINVSCHED", "Invalid Scheduled Delivery Time"),
            InvalidExpiryTime => ("ESME_RINVEXPIRY", "Invalid message validity period"),
            InvalidPredefinedMessageId => {
                ("ESME_RINVDFTMSGID", "Predefined Message Invalid or Not Found")
            }
            ReceiverTemporaryAppError => ("ESME_RX_T_APPN", "ESME Receiver Temporary App Error"),
            ReceiverPermanentAppError => ("ESME_RX_P_APPN", "ESME Receiver Permanent App Error"),
            ReceiverRejectMessageError => ("ESME_RX_R_APPN", "ESME Receiver Reject Message Error"),
            QuerySmRequestFailed => ("ESME_RQUERYFAIL", "query_sm request failed"),
            ErrorInOptionalPartOfPduBody => {
                ("ESME_RINVOPTPARSTREAM", "Error in the optional part of the PDU Body")
            }
            OptionalParameterNotAllowed => ("ESME_ROPTPARNOTALLWD", "Optional Parameter not allowed"),
            InvalidParameterLength => ("ESME_RINVPARLEN", "Invalid Parameter Length"),
            ExpectedOptionalParameterMissing => {
                ("ESME_RMISSINGOPTPARAM", "Expected Optional Parameter missing")
            }
            InvalidOptionalParameterValue => {
                ("ESME_RINVOPTPARAMVAL", "Invalid Optional Parameter Value")
            }
            DeliveryFailed => ("ESME_RDELIVERYFAILURE", "Delivery Failure"),
            UnknownError => ("ESME_RUNKNOWNERR", "Unknown Error"),
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.short_code(), self.description())
    }
}
