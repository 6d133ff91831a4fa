//! Client configuration.
//!
//! Values arrive already validated by the embedding application (parsing
//! environment variables or files into these fields is the embedder's
//! concern). Setters follow the combinator style so call sites read as a
//! single expression.

use std::time::Duration;

/// Outbound send rate cap over a sliding window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendRateLimit {
    /// Messages permitted per window.
    pub max_messages: usize,
    /// Window length.
    pub window: Duration,
}

impl Default for SendRateLimit {
    fn default() -> Self {
        Self {
            max_messages: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Configuration consumed by [`ChatClient`](crate::ChatClient).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use chatwire::ClientConfig;
///
/// let config = ClientConfig::new("ws://localhost:8000/ws/chat")
///     .batch_interval(Duration::from_millis(25))
///     .max_retries(5);
/// assert_eq!(config.max_retries_value(), 5);
/// assert_eq!(config.batch_interval_value(), Duration::from_millis(25));
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    uri: String,
    connect_timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    retry_max_delay: Duration,
    retry_jitter: Duration,
    ping_interval: Duration,
    pong_timeout: Duration,
    health_check: bool,
    batch_interval: Duration,
    stall_timeout: Duration,
    max_in_flight: usize,
    max_history: usize,
    max_message_len: usize,
    send_rate_limit: Option<SendRateLimit>,
}

impl ClientConfig {
    /// Create a configuration for the backend at `uri` with defaults.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            connect_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            retry_jitter: Duration::from_millis(250),
            ping_interval: Duration::from_secs(120),
            pong_timeout: Duration::from_secs(10),
            health_check: true,
            batch_interval: Duration::from_millis(50),
            stall_timeout: Duration::from_secs(120),
            max_in_flight: 16,
            max_history: 100,
            max_message_len: 4000,
            send_rate_limit: Some(SendRateLimit::default()),
        }
    }

    /// Timeout for one connection handshake.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Reconnect attempt cap; zero retries forever.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Base, cap, and jitter bound for the reconnect backoff.
    #[must_use]
    pub fn retry_delays(mut self, base: Duration, max: Duration, jitter: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self.retry_jitter = jitter;
        self
    }

    /// Interval between liveness pings.
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// How long to wait for a pong before declaring the connection dead.
    ///
    /// Must be shorter than the ping interval.
    #[must_use]
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Enable or disable the health monitor entirely.
    #[must_use]
    pub fn health_check(mut self, enabled: bool) -> Self {
        self.health_check = enabled;
        self
    }

    /// Interval between delta flushes to the consumer.
    #[must_use]
    pub fn batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    /// Quiet period after which a streaming message is failed as stalled.
    #[must_use]
    pub fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Cap on simultaneously unresolved messages.
    #[must_use]
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = limit;
        self
    }

    /// Message history ceiling, consumed by the embedder's history trim.
    #[must_use]
    pub fn max_history(mut self, limit: usize) -> Self {
        self.max_history = limit;
        self
    }

    /// Character ceiling for one outbound message.
    #[must_use]
    pub fn max_message_len(mut self, limit: usize) -> Self {
        self.max_message_len = limit;
        self
    }

    /// Outbound rate cap; `None` disables rate limiting.
    #[must_use]
    pub fn send_rate_limit(mut self, limit: Option<SendRateLimit>) -> Self {
        self.send_rate_limit = limit;
        self
    }

    /// Backend URI.
    #[must_use]
    pub fn uri(&self) -> &str { &self.uri }

    /// Handshake timeout value.
    #[must_use]
    pub const fn connect_timeout_value(&self) -> Duration { self.connect_timeout }

    /// Reconnect attempt cap; zero means retry forever.
    #[must_use]
    pub const fn max_retries_value(&self) -> u32 { self.max_retries }

    /// Backoff base delay.
    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration { self.retry_base_delay }

    /// Backoff delay cap.
    #[must_use]
    pub const fn retry_max_delay(&self) -> Duration { self.retry_max_delay }

    /// Backoff jitter bound.
    #[must_use]
    pub const fn retry_jitter(&self) -> Duration { self.retry_jitter }

    /// Liveness ping interval.
    #[must_use]
    pub const fn ping_interval_value(&self) -> Duration { self.ping_interval }

    /// Pong deadline.
    #[must_use]
    pub const fn pong_timeout_value(&self) -> Duration { self.pong_timeout }

    /// Whether the health monitor runs.
    #[must_use]
    pub const fn health_check_enabled(&self) -> bool { self.health_check }

    /// Delta flush interval.
    #[must_use]
    pub const fn batch_interval_value(&self) -> Duration { self.batch_interval }

    /// Stall deadline for streaming messages.
    #[must_use]
    pub const fn stall_timeout_value(&self) -> Duration { self.stall_timeout }

    /// In-flight message cap.
    #[must_use]
    pub const fn max_in_flight_value(&self) -> usize { self.max_in_flight }

    /// History ceiling for the embedder.
    #[must_use]
    pub const fn max_history_value(&self) -> usize { self.max_history }

    /// Outbound message length ceiling.
    #[must_use]
    pub const fn max_message_len_value(&self) -> usize { self.max_message_len }

    /// Outbound rate cap, if any.
    #[must_use]
    pub const fn send_rate_limit_value(&self) -> Option<SendRateLimit> { self.send_rate_limit }
}
