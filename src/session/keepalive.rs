// ABOUTME: Keep-alive and dead-peer detection for long-running SMPP sessions
// ABOUTME: Tracks enquire_link traffic and the time of the last inbound PDU

use std::time::{Duration, Instant};
use tracing::debug;

/// Timing for enquire_link keep-alives, response timeouts and reconnects
///
/// # Example
///
/// ```rust
/// use smpp_gate::session::KeepAliveConfig;
/// use std::time::Duration;
///
/// // Default configuration (60s interval, 10s timeout, 10s reconnect delay)
/// let config = KeepAliveConfig::default();
///
/// // Custom configuration
/// let config = KeepAliveConfig::new(Duration::from_secs(30))
///     .with_timeout(Duration::from_secs(15))
///     .with_reconnect_delay(Duration::from_secs(5));
///
/// // No enquire_link traffic at all
/// let config = KeepAliveConfig::disabled();
/// ```
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Interval between enquire_link PDUs (default: 60 seconds)
    pub interval: Duration,

    /// How long any request may stay unanswered (default: 10 seconds)
    ///
    /// Applies to every outstanding request, not just enquire_link.
    pub timeout: Duration,

    /// Quiet period required before a late response counts as a timeout
    /// (default: 1 second)
    ///
    /// A peer that is still sending other PDUs is busy rather than dead, so
    /// a timeout is only declared when nothing at all has arrived for this
    /// long.
    pub grace: Duration,

    /// How often outstanding requests are checked (default: 1 second)
    pub sweep_interval: Duration,

    /// Delay before a client session reconnects after losing its channel
    /// (default: 10 seconds)
    pub reconnect_delay: Duration,

    /// Whether enquire_link PDUs are sent at all (default: true)
    ///
    /// The timeout sweep runs either way.
    pub enabled: bool,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(10),
            grace: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(10),
            enabled: true,
        }
    }
}

impl KeepAliveConfig {
    /// Create a new keep-alive configuration with custom interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Set the response timeout for outstanding requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    /// Create a configuration that never sends enquire_link
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Snapshot of keep-alive counters
#[derive(Debug, Clone)]
pub struct KeepAliveStatus {
    pub running: bool,

    /// Total enquire_link PDUs sent
    pub total_pings: u32,

    /// Total enquire_link_resp PDUs received
    pub total_pongs: u32,

    /// Time since the last enquire_link went out
    pub since_last_ping: Option<Duration>,

    /// Time since the last PDU of any kind arrived, if one has
    pub since_last_pdu: Option<Duration>,
}

/// Tracks enquire_link traffic and whether the peer has gone quiet.
///
/// The session owns the timers and the transport; the manager only keeps
/// time. All methods take `now` explicitly so the decisions are testable
/// without sleeping.
#[derive(Debug)]
pub struct KeepAliveManager {
    config: KeepAliveConfig,

    last_ping: Option<Instant>,

    /// Last time any PDU was received on the channel
    last_pdu: Option<Instant>,

    total_pings: u32,
    total_pongs: u32,
}

impl KeepAliveManager {
    pub fn new(config: KeepAliveConfig) -> Self {
        Self {
            config,
            last_ping: None,
            last_pdu: None,
            total_pings: 0,
            total_pongs: 0,
        }
    }

    /// Whether enquire_link PDUs are sent on this session
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn on_ping_sent(&mut self, now: Instant) {
        self.last_ping = Some(now);
        self.total_pings += 1;
        debug!("Enquire_link sent (total: {})", self.total_pings);
    }

    pub fn on_pong(&mut self) {
        self.total_pongs += 1;
        debug!("Enquire_link answered (total: {})", self.total_pongs);
    }

    /// Record that a PDU of any kind arrived
    pub fn on_pdu_received(&mut self, now: Instant) {
        self.last_pdu = Some(now);
    }

    /// True when nothing has arrived within the grace window
    pub fn is_idle(&self, now: Instant) -> bool {
        match self.last_pdu {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.config.grace,
        }
    }

    /// Decide whether a request outstanding for `age` means the peer is dead.
    ///
    /// Both conditions must hold: the request is older than the timeout and
    /// the channel has been silent for the whole grace window.
    pub fn is_expired(&self, age: Duration, now: Instant) -> bool {
        age > self.config.timeout && self.is_idle(now)
    }

    /// Forget all timing, as after a teardown
    pub fn reset(&mut self) {
        self.last_ping = None;
        self.last_pdu = None;
    }

    pub fn status(&self) -> KeepAliveStatus {
        KeepAliveStatus {
            running: self.config.enabled,
            total_pings: self.total_pings,
            total_pongs: self.total_pongs,
            since_last_ping: self.last_ping.map(|last| last.elapsed()),
            since_last_pdu: self.last_pdu.map(|last| last.elapsed()),
        }
    }

    pub fn config(&self) -> &KeepAliveConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_alive_config_defaults() {
        let config = KeepAliveConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.grace, Duration::from_secs(1));
        assert_eq!(config.reconnect_delay, Duration::from_secs(10));
        assert!(config.enabled);
    }

    #[test]
    fn test_keep_alive_config_builder() {
        let config = KeepAliveConfig::new(Duration::from_secs(30))
            .with_timeout(Duration::from_secs(5))
            .with_grace(Duration::from_millis(200))
            .with_sweep_interval(Duration::from_millis(50))
            .with_reconnect_delay(Duration::from_secs(2));

        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.grace, Duration::from_millis(200));
        assert_eq!(config.sweep_interval, Duration::from_millis(50));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_disabled_config() {
        let manager = KeepAliveManager::new(KeepAliveConfig::disabled());
        assert!(!manager.is_enabled());
        assert!(!manager.status().running);
        assert!(KeepAliveManager::new(KeepAliveConfig::default()).is_enabled());
    }

    #[test]
    fn test_expiry_needs_quiet_channel() {
        let start = Instant::now();
        let config = KeepAliveConfig::default().with_timeout(Duration::from_secs(10));
        let mut manager = KeepAliveManager::new(config);

        // Old request, traffic half a second ago: still busy
        manager.on_pdu_received(start + Duration::from_millis(10_500));
        let now = start + Duration::from_secs(11);
        assert!(!manager.is_expired(Duration::from_secs(11), now));

        // Same request, quiet for two seconds: dead
        let now = start + Duration::from_millis(12_600);
        assert!(manager.is_expired(Duration::from_millis(12_600), now));

        // Quiet, but the request is still young
        assert!(!manager.is_expired(Duration::from_secs(3), now));
    }

    #[test]
    fn test_statistics_and_reset() {
        let now = Instant::now();
        let mut manager = KeepAliveManager::new(KeepAliveConfig::default());

        manager.on_ping_sent(now);
        manager.on_pong();
        manager.on_pdu_received(now);

        let status = manager.status();
        assert_eq!(status.total_pings, 1);
        assert_eq!(status.total_pongs, 1);
        assert!(status.since_last_pdu.is_some());

        manager.reset();
        assert!(manager.is_idle(now));
        assert_eq!(manager.status().total_pings, 1);
    }
}
