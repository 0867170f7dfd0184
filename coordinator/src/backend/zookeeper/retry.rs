use std::time::Duration;

use rand::Rng;

use super::super::super::config::RetryConfig;

// Keep the random range within a u64 whatever the configured retries.
const MAX_SHIFT: u32 = 30;

/// Exponential backoff with jitter between session attempts.
///
/// The delay before retry `n` (starting at 0) is `base * max(1, rand(0 .. 2^(n+1)))`,
/// capped at `max_sleep`.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    base_sleep_ms: u64,
    max_retries: u32,
    max_sleep_ms: u64,
}

impl ExponentialBackoff {
    pub fn new(config: &RetryConfig) -> ExponentialBackoff {
        ExponentialBackoff {
            base_sleep_ms: config.base_sleep_ms,
            max_retries: config.max_retries,
            max_sleep_ms: config.max_sleep_ms,
        }
    }

    /// Delay before the given retry, or `None` once retries are exhausted.
    pub fn sleep_for(&self, retry: u32) -> Option<Duration> {
        if retry >= self.max_retries {
            return None;
        }
        let shift = (retry + 1).min(MAX_SHIFT);
        let factor = rand::thread_rng().gen_range(0..(1u64 << shift)).max(1);
        let sleep = self
            .base_sleep_ms
            .saturating_mul(factor)
            .min(self.max_sleep_ms);
        Some(Duration::from_millis(sleep))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::super::super::config::RetryConfig;
    use super::ExponentialBackoff;

    fn backoff(base_sleep_ms: u64, max_retries: u32, max_sleep_ms: u64) -> ExponentialBackoff {
        ExponentialBackoff::new(&RetryConfig {
            base_sleep_ms,
            max_retries,
            max_sleep_ms,
        })
    }

    #[test]
    fn exhausted_after_max_retries() {
        let backoff = backoff(1000, 3, 30_000);
        assert!(backoff.sleep_for(2).is_some());
        assert_eq!(backoff.sleep_for(3), None);
        assert_eq!(backoff.sleep_for(10), None);
    }

    #[test]
    fn no_retries() {
        let backoff = backoff(1000, 0, 30_000);
        assert_eq!(backoff.sleep_for(0), None);
    }

    #[test]
    fn sleep_within_bounds() {
        let backoff = backoff(100, 5, 30_000);
        for retry in 0..5 {
            let upper = 100 * ((1u64 << (retry + 1)) - 1);
            for _ in 0..50 {
                let sleep = backoff.sleep_for(retry).unwrap();
                assert!(sleep >= Duration::from_millis(100));
                assert!(sleep <= Duration::from_millis(upper));
            }
        }
    }

    #[test]
    fn sleep_capped() {
        let backoff = backoff(1000, 100, 1500);
        for _ in 0..50 {
            let sleep = backoff.sleep_for(60).unwrap();
            assert!(sleep <= Duration::from_millis(1500));
        }
    }
}
