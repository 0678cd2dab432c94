use std::time::Duration;

/// Reconnect backoff schedule: delay doubles per attempt, capped.
///
/// The attempt counter lives in the stream client; this is a pure function
/// from attempt number to delay, so retries can be scheduled and tested
/// without any clock.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            cap: Duration::from_millis(30_000),
        }
    }
}

impl Backoff {
    #[cfg(test)]
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before retry number `attempt` (first failure = attempt 1).
    ///
    /// delay = min(base * 2^attempt, cap)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.min(32));
        let ms = (self.base.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(ms.min(self.cap.as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let backoff = Backoff::default();
        let expected_ms = [2000, 4000, 8000, 16000, 30000, 30000];
        for (attempt, expected) in (1u32..=6).zip(expected_ms) {
            assert_eq!(
                backoff.delay(attempt),
                Duration::from_millis(expected),
                "attempt {}",
                attempt
            );
        }
    }

    #[test]
    fn test_delay_is_monotonic() {
        let backoff = Backoff::default();
        let mut last = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = backoff.delay(attempt);
            assert!(delay >= last, "delay shrank at attempt {}", attempt);
            last = delay;
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_custom_base_and_cap() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(500));
    }
}
