//! Per-provider quota and retry tuning.

use std::time::Duration;

/// Exponential backoff schedule for retried provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: u32,
    /// Randomize each delay by +/- 50% to avoid thundering herds.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_retries: 3,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given retry attempt (0-based); `None` once retries
    /// are exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }

        let scale = self.multiplier.powf(f64::from(attempt));
        let seconds = self.initial_delay.as_secs_f64() * scale;
        let mut delay = Duration::from_secs_f64(seconds.min(self.max_delay.as_secs_f64()));

        if self.jitter {
            let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
            let offset = fastrand::u64(0..=jitter_ms.saturating_mul(2));
            let total = delay.as_millis() as i64 + offset as i64 - jitter_ms as i64;
            delay = Duration::from_millis(total.max(0) as u64);
        }

        Some(delay)
    }
}

/// Quota, timeout, and retry policy for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub call_timeout: Duration,
    pub retry_backoff: BackoffPolicy,
}

impl ProviderPolicy {
    /// CoinGecko free tier allows roughly 30 calls per minute.
    pub fn coingecko() -> Self {
        Self {
            quota_window: Duration::from_secs(60),
            quota_limit: 30,
            call_timeout: Duration::from_secs(10),
            retry_backoff: BackoffPolicy::default(),
        }
    }

    /// CoinMarketCap basic tier budget.
    pub fn coinmarketcap() -> Self {
        Self {
            quota_window: Duration::from_secs(60),
            quota_limit: 25,
            call_timeout: Duration::from_secs(10),
            retry_backoff: BackoffPolicy::default(),
        }
    }
}
