// ABOUTME: Per-session settings with legacy gateway defaults and chained builders
// ABOUTME: Derives bind credentials, addressing envelopes and segmentation options

use super::KeepAliveConfig;
use crate::datatypes::{BindCredentials, BindType, NumericPlanIndicator, TypeOfNumber};
use crate::message::Envelope;
use crate::multipart::{
    ASCII_SPLIT_BASE, DEFAULT_RETENTION, LargeMessageMethod, SegmentOptions,
};
use std::time::Duration;

/// Settings for one client or server session
///
/// # Example
///
/// ```rust
/// use smpp_gate::session::{KeepAliveConfig, SessionConfig};
/// use smpp_gate::multipart::LargeMessageMethod;
/// use std::time::Duration;
///
/// let config = SessionConfig::new("esme01", "secret")
///     .with_address("smsc.example.net", 2775)
///     .with_direction(true, false)
///     .with_large_message(LargeMessageMethod::Payload)
///     .with_max_per_second(20)
///     .with_keep_alive(KeepAliveConfig::new(Duration::from_secs(30)));
///
/// assert!(config.can_send);
/// assert_eq!(config.max_per_second, Some(20));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host, used by client sessions only
    pub host: String,
    pub port: u16,

    /// Login sent in the bind, or expected from the peer on a server session
    pub system_id: String,
    pub password: String,
    pub system_type: String,

    pub can_send: bool,
    pub can_receive: bool,

    pub source_addr_ton: TypeOfNumber,
    pub source_addr_npi: NumericPlanIndicator,
    pub dest_addr_ton: TypeOfNumber,
    pub dest_addr_npi: NumericPlanIndicator,

    /// Global delivery receipt mode. When non-zero, submissions asking for a
    /// receipt are reported as waiting for their acknowledgement.
    pub registered_delivery: u8,

    pub large_message: LargeMessageMethod,
    pub split_base_ascii: usize,

    /// Pack default-alphabet text into septets, and unpack it on receipt
    pub use_8bit: bool,

    /// Server sessions send `deliver_sm` when set, `data_sm` otherwise
    pub use_deliver_sm: bool,

    /// Submission cap per second, `None` for unlimited
    pub max_per_second: Option<u32>,

    /// Pause between the parts of a multipart message
    pub multipart_delay: Duration,

    /// Log every PDU sent and received as hex
    pub debug: bool,

    pub keep_alive: KeepAliveConfig,

    /// How long an incomplete multipart set is kept
    pub multipart_retention: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 2775,
            system_id: String::new(),
            password: String::new(),
            system_type: String::new(),
            can_send: true,
            can_receive: true,
            source_addr_ton: TypeOfNumber::Unknown,
            source_addr_npi: NumericPlanIndicator::Unknown,
            dest_addr_ton: TypeOfNumber::Unknown,
            dest_addr_npi: NumericPlanIndicator::Unknown,
            registered_delivery: 1,
            large_message: LargeMessageMethod::Multipart,
            split_base_ascii: ASCII_SPLIT_BASE,
            use_8bit: false,
            use_deliver_sm: false,
            max_per_second: None,
            multipart_delay: Duration::from_millis(100),
            debug: false,
            keep_alive: KeepAliveConfig::default(),
            multipart_retention: DEFAULT_RETENTION,
        }
    }
}

impl SessionConfig {
    pub fn new(system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_system_type(mut self, system_type: impl Into<String>) -> Self {
        self.system_type = system_type.into();
        self
    }

    pub fn with_direction(mut self, can_send: bool, can_receive: bool) -> Self {
        self.can_send = can_send;
        self.can_receive = can_receive;
        self
    }

    pub fn with_source_numbering(mut self, ton: TypeOfNumber, npi: NumericPlanIndicator) -> Self {
        self.source_addr_ton = ton;
        self.source_addr_npi = npi;
        self
    }

    pub fn with_dest_numbering(mut self, ton: TypeOfNumber, npi: NumericPlanIndicator) -> Self {
        self.dest_addr_ton = ton;
        self.dest_addr_npi = npi;
        self
    }

    pub fn with_registered_delivery(mut self, registered_delivery: u8) -> Self {
        self.registered_delivery = registered_delivery;
        self
    }

    pub fn with_large_message(mut self, method: LargeMessageMethod) -> Self {
        self.large_message = method;
        self
    }

    pub fn with_split_base_ascii(mut self, split_base: usize) -> Self {
        self.split_base_ascii = split_base;
        self
    }

    pub fn with_8bit(mut self, use_8bit: bool) -> Self {
        self.use_8bit = use_8bit;
        self
    }

    pub fn with_deliver_sm(mut self, use_deliver_sm: bool) -> Self {
        self.use_deliver_sm = use_deliver_sm;
        self
    }

    pub fn with_max_per_second(mut self, max_per_second: u32) -> Self {
        self.max_per_second = Some(max_per_second).filter(|max| *max > 0);
        self
    }

    pub fn with_multipart_delay(mut self, delay: Duration) -> Self {
        self.multipart_delay = delay;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: KeepAliveConfig) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_multipart_retention(mut self, retention: Duration) -> Self {
        self.multipart_retention = retention;
        self
    }

    /// Bind flavour for the configured direction
    pub fn bind_type(&self) -> Option<BindType> {
        BindType::from_direction(self.can_send, self.can_receive)
    }

    /// Credentials for the bind request. The source numbering doubles as
    /// the bind's address range numbering.
    pub fn credentials(&self) -> BindCredentials {
        BindCredentials {
            system_id: self.system_id.clone(),
            password: self.password.clone(),
            system_type: self.system_type.clone(),
            addr_ton: self.source_addr_ton,
            addr_npi: self.source_addr_npi,
        }
    }

    pub(crate) fn envelope(&self, want_receipt: bool) -> Envelope {
        Envelope {
            source_addr_ton: self.source_addr_ton,
            source_addr_npi: self.source_addr_npi,
            dest_addr_ton: self.dest_addr_ton,
            dest_addr_npi: self.dest_addr_npi,
            registered_delivery: u8::from(want_receipt),
        }
    }

    pub(crate) fn segment_options(&self) -> SegmentOptions {
        SegmentOptions::default()
            .with_method(self.large_message)
            .with_ascii_split_base(self.split_base_ascii)
            .with_8bit(self.use_8bit)
    }

    /// Whether a server accepts `system_id`/`password` for this session
    pub fn accepts(&self, system_id: &str, password: &str) -> bool {
        self.system_id == system_id && self.password == password
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_defaults() {
        let config = SessionConfig::default();
        assert!(config.can_send && config.can_receive);
        assert_eq!(config.registered_delivery, 1);
        assert_eq!(config.large_message, LargeMessageMethod::Multipart);
        assert_eq!(config.split_base_ascii, 153);
        assert_eq!(config.multipart_delay, Duration::from_millis(100));
        assert_eq!(config.keep_alive.interval, Duration::from_secs(60));
        assert_eq!(config.max_per_second, None);
        assert!(!config.use_deliver_sm);
        assert_eq!(config.bind_type(), Some(BindType::Transceiver));
    }

    #[test]
    fn direction_selects_bind() {
        let config = SessionConfig::new("id", "pw").with_direction(false, true);
        assert_eq!(config.bind_type(), Some(BindType::Receiver));
        assert_eq!(
            SessionConfig::default().with_direction(false, false).bind_type(),
            None
        );
    }

    #[test]
    fn credentials_use_source_numbering() {
        let config = SessionConfig::new("esme", "pw")
            .with_system_type("ESME")
            .with_source_numbering(TypeOfNumber::International, NumericPlanIndicator::Isdn);
        let credentials = config.credentials();

        assert_eq!(credentials.system_id, "esme");
        assert_eq!(credentials.system_type, "ESME");
        assert_eq!(credentials.addr_ton, TypeOfNumber::International);
        assert_eq!(credentials.addr_npi, NumericPlanIndicator::Isdn);
        assert!(config.accepts("esme", "pw"));
        assert!(!config.accepts("esme", "PW"));
    }

    #[test]
    fn envelope_follows_receipt_request() {
        let config = SessionConfig::default();
        assert_eq!(config.envelope(true).registered_delivery, 1);
        assert_eq!(config.envelope(false).registered_delivery, 0);
        assert_eq!(config.segment_options().limits.split_ascii, 153);
    }
}
