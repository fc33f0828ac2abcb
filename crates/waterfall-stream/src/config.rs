use std::time::Duration;

/// Tuning knobs for a [`crate::StreamClient`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Buffered lifecycle events per subscriber before slow readers lag.
    pub event_capacity: usize,
    /// Upper bound on a single connect attempt, handshake included.
    pub connect_timeout: Duration,
    /// How long shutdown waits for the close handshake.
    pub close_timeout: Duration,
    pub worker_name: String,
}

impl StreamConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            event_capacity: 64,
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(2),
            worker_name: "waterfall-worker".to_string(),
        }
    }
}
