use std::time::Duration;

use codejudge_core::RetryConfig;
use rand::Rng;

/// Delay before retry `retry_number` of a stage (the first retry is 1).
/// The base delay doubles per retry, gains up to 25% jitter and never
/// exceeds `max_backoff_ms`.
pub fn backoff_delay(config: &RetryConfig, retry_number: u8) -> Duration {
    let Some(doublings) = retry_number.checked_sub(1) else {
        return Duration::ZERO;
    };

    let nominal = 1u64
        .checked_shl(u32::from(doublings))
        .and_then(|factor| config.base_backoff_ms.checked_mul(factor))
        .unwrap_or(u64::MAX)
        .min(config.max_backoff_ms);

    let jitter = match nominal / 4 {
        0 => 0,
        spread => rand::rng().random_range(0..=spread),
    };

    Duration::from_millis(nominal.saturating_add(jitter).min(config.max_backoff_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_backoff_ms: u64, max_backoff_ms: u64) -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_backoff_ms,
            max_backoff_ms,
        }
    }

    #[test]
    fn test_no_delay_before_first_attempt() {
        assert_eq!(backoff_delay(&config(250, 2000), 0), Duration::ZERO);
    }

    #[test]
    fn test_first_retry_within_jitter() {
        let retry = config(200, 10_000);
        for _ in 0..50 {
            let ms = backoff_delay(&retry, 1).as_millis();
            assert!((200..=250).contains(&ms), "{}", ms);
        }
    }

    #[test]
    fn test_doubles_then_caps() {
        let third = backoff_delay(&config(100, 10_000), 3).as_millis();
        assert!((400..=500).contains(&third));
        assert_eq!(
            backoff_delay(&config(250, 2000), 20),
            Duration::from_millis(2000)
        );
        assert_eq!(
            backoff_delay(&config(250, 2000), 200),
            Duration::from_millis(2000)
        );
    }

    #[test]
    fn test_zero_base_never_waits() {
        assert_eq!(backoff_delay(&config(0, 2000), 4), Duration::ZERO);
        assert_eq!(backoff_delay(&RetryConfig::none(), 1), Duration::ZERO);
    }
}
