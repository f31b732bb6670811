use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use scrapewatch_config::ChannelConfig;
use scrapewatch_protocol::ChannelEvent;

/// Bounded exponential backoff for the channel's connect loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed connects before the channel gives up.
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts(),
            min_delay: config.reconnect_min_delay(),
            max_delay: config.reconnect_max_delay(),
        }
    }

    fn builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts as usize)
    }

    /// Fresh delay sequence. Rebuilt after every successful connect.
    pub fn delays(&self) -> ExponentialBackoff {
        self.builder().build()
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ChannelConfig::default())
    }
}

/// Tells a sync driver when to refetch after the channel comes back.
///
/// Events published while the connection was down are never replayed, so a
/// connect that follows a lost connection must be treated as a full
/// invalidation. The first connect of a driver's lifetime is not.
#[derive(Debug, Default)]
pub struct ResyncGate {
    lost: bool,
}

impl ResyncGate {
    /// True when `event` is a connect that follows a disconnect.
    pub fn observe(&mut self, event: &ChannelEvent) -> bool {
        let ChannelEvent::ConnectionStatus(status) = event else {
            return false;
        };
        if !status.connected {
            self.lost = true;
            return false;
        }
        std::mem::take(&mut self.lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapewatch_protocol::ConnectionStatus;

    fn status(connected: bool) -> ChannelEvent {
        ChannelEvent::ConnectionStatus(ConnectionStatus {
            connected,
            reason: None,
        })
    }

    #[test]
    fn test_default_policy_matches_channel_defaults() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.min_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_delays_grow_and_are_capped() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<Duration> = policy.delays().collect();

        assert_eq!(delays.len(), 5);
        assert_eq!(delays[0], Duration::from_secs(1));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(5)));
    }

    #[test]
    fn test_resync_only_after_a_lost_connection() {
        let mut gate = ResyncGate::default();
        assert!(!gate.observe(&status(true)));
        assert!(!gate.observe(&status(false)));
        assert!(!gate.observe(&status(false)));
        assert!(gate.observe(&status(true)));
        assert!(!gate.observe(&status(true)));
    }
}
