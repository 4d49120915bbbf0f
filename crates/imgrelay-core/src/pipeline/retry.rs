//! Retry utilities for transient store failures and redelivery scheduling.
//!
//! Provides classification of retryable errors and exponential backoff.

use rand::Rng;
use std::time::Duration;

use crate::error::PipelineError;

/// Cap for in-process retries of a single store call.
const MAX_CALL_BACKOFF_MS: u64 = 30_000;

/// Cap for redelivery delays (SQS allows up to 12h, but a stuck object
/// should resurface within minutes).
const MAX_REDELIVERY_BACKOFF_MS: u64 = 15 * 60 * 1000;

/// Determine whether a pipeline error is worth retrying.
///
/// Retryable errors: network/timeout/throttling failures and stage timeouts.
/// Non-retryable: missing objects, undecodable input, encoder defects, auth failures.
pub fn is_retryable(error: &PipelineError) -> bool {
    error.is_retryable()
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(MAX_CALL_BACKOFF_MS))
}

/// Delay before a failed notification becomes visible again.
///
/// `attempt` is the 1-based delivery attempt that just failed. Adds up to 20%
/// jitter so objects failing together do not come back together.
pub fn redelivery_delay(attempt: u32, base_delay_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let delay = base_delay_ms
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(MAX_REDELIVERY_BACKOFF_MS);
    let jitter = if delay >= 5 {
        rand::thread_rng().gen_range(0..=delay / 5)
    } else {
        0
    };
    Duration::from_millis(delay.saturating_add(jitter).min(MAX_REDELIVERY_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        let err = PipelineError::Timeout {
            stage: "decode".to_string(),
            timeout_ms: 5000,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_transient_io_is_retryable() {
        let err = PipelineError::TransientIo {
            operation: "fetch",
            target: "uploads/a.png".to_string(),
            message: "HTTP 503".to_string(),
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_corrupt_data_not_retryable() {
        let err = PipelineError::CorruptData {
            message: "invalid header".to_string(),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_fatal_not_retryable() {
        let err = PipelineError::Fatal {
            operation: "put",
            target: "out/a.png/100.jpg".to_string(),
            message: "HTTP 403".to_string(),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_backoff_exponential() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(1, 1000), Duration::from_millis(2000));
        assert_eq!(backoff_duration(2, 1000), Duration::from_millis(4000));
        assert_eq!(backoff_duration(3, 1000), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_capped_at_30s() {
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
    }

    #[test]
    fn test_redelivery_delay_grows_with_jitter() {
        for attempt in 1..=4u32 {
            let base = 1000 * 2u64.pow(attempt - 1);
            let delay = redelivery_delay(attempt, 1000).as_millis() as u64;
            assert!(
                delay >= base && delay <= base + base / 5,
                "attempt {attempt}: {delay}ms outside [{base}, {}]",
                base + base / 5
            );
        }
    }

    #[test]
    fn test_redelivery_delay_capped() {
        let delay = redelivery_delay(40, 1000);
        assert_eq!(delay, Duration::from_millis(MAX_REDELIVERY_BACKOFF_MS));
    }

    #[test]
    fn test_redelivery_delay_zero_base() {
        assert_eq!(redelivery_delay(3, 0), Duration::ZERO);
    }
}
