use std::time::Duration;

/// Retry parameters shared by every network operation of one client.
///
/// Stateless; the same policy is reused across calls and threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Sleep between attempts, in milliseconds.
    pub interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            interval_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval_ms: u64) -> Self {
        Self {
            max_retries,
            interval_ms,
        }
    }

    /// No retries, no waiting.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Total number of attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_include_first_try() {
        assert_eq!(RetryPolicy::none().attempts(), 1);
        assert_eq!(RetryPolicy::new(3, 10).attempts(), 4);
        assert_eq!(RetryPolicy::new(u32::MAX, 0).attempts(), u32::MAX);
    }

    #[test]
    fn interval_is_milliseconds() {
        assert_eq!(RetryPolicy::new(1, 250).interval(), Duration::from_millis(250));
    }
}
