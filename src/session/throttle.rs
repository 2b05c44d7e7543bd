// ABOUTME: Per-second submission cap for a session
// ABOUTME: Counts submissions in fixed one-second windows and refuses the excess

use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Counters for monitoring how often the cap bites
#[derive(Debug, Clone, Default)]
pub struct ThrottleStatistics {
    pub accepted: u64,
    pub refused: u64,
}

/// Fixed-window rate limiter.
///
/// A refused submission is not queued; the caller resubmits later.
#[derive(Debug)]
pub struct Throttle {
    /// `None` means unlimited
    max_per_second: Option<u32>,
    window_start: Option<Instant>,
    in_window: u32,
    statistics: ThrottleStatistics,
}

impl Throttle {
    pub fn new(max_per_second: Option<u32>) -> Self {
        Self {
            max_per_second: max_per_second.filter(|max| *max > 0),
            window_start: None,
            in_window: 0,
            statistics: ThrottleStatistics::default(),
        }
    }

    /// Take one slot in the current window, if any are left
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let Some(max) = self.max_per_second else {
            self.statistics.accepted += 1;
            return true;
        };

        match self.window_start {
            Some(start) if now.saturating_duration_since(start) < WINDOW => {}
            _ => {
                self.window_start = Some(now);
                self.in_window = 0;
            }
        }

        if self.in_window >= max {
            self.statistics.refused += 1;
            return false;
        }

        self.in_window += 1;
        self.statistics.accepted += 1;
        true
    }

    pub fn max_per_second(&self) -> Option<u32> {
        self.max_per_second
    }

    pub fn statistics(&self) -> &ThrottleStatistics {
        &self.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_accepts() {
        let mut throttle = Throttle::new(None);
        let now = Instant::now();
        assert!((0..1000).all(|_| throttle.try_acquire(now)));

        // Zero is treated as no cap
        assert_eq!(Throttle::new(Some(0)).max_per_second(), None);
    }

    #[test]
    fn caps_each_window() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Some(2));

        assert!(throttle.try_acquire(start));
        assert!(throttle.try_acquire(start + Duration::from_millis(100)));
        assert!(!throttle.try_acquire(start + Duration::from_millis(900)));

        // Next window
        assert!(throttle.try_acquire(start + Duration::from_millis(1000)));

        let stats = throttle.statistics();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.refused, 1);
    }
}
