use std::time::Duration;

/// Tunables of a [crate::ComponentSession]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long host notifications about failing debug handlers stay up
    pub notify_duration: Duration,
    /// Trace every applied request
    pub log_requests: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            notify_duration: Duration::from_secs(10),
            log_requests: false,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_duration(mut self, duration: Duration) -> Self {
        self.notify_duration = duration;
        self
    }

    pub fn log_requests(mut self, log: bool) -> Self {
        self.log_requests = log;
        self
    }
}
