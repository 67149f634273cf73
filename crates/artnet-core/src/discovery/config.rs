use std::time::Duration;

/// Interval between ArtPoll broadcasts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Age after which a node that stopped answering is considered gone.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(3000);

/// Configuration for [`NodeDiscovery`](super::NodeDiscovery).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Re-poll period; `None` polls once on start only.
    pub poll_interval: Option<Duration>,
    /// Staleness window, reset by every reply from a node.
    pub reply_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Some(DEFAULT_POLL_INTERVAL),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}
