use std::time::Duration;

const BASE_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 8_000;

/// Whether an HTTP status is worth retrying.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 429 | 500 | 502 | 503 | 504)
}

/// Which failures a request may be resent after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryPolicy {
    /// Reads and cancels: repeating them has no extra effect.
    Idempotent,
    /// Creates something on the service. A 5xx or a dropped response may
    /// mean the request was already applied, so only rate limits and
    /// connection failures before anything was sent are retried.
    NotIdempotent,
}

impl RetryPolicy {
    pub(crate) fn retries_status(self, status: u16) -> bool {
        match self {
            Self::Idempotent => is_retryable_status(status),
            Self::NotIdempotent => status == 429,
        }
    }

    pub(crate) fn retries_transport_error(self, error: &reqwest::Error) -> bool {
        match self {
            Self::Idempotent => true,
            Self::NotIdempotent => error.is_connect(),
        }
    }
}

/// Exponential backoff delay for a zero-based retry attempt.
pub(crate) fn retry_backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(factor).min(MAX_DELAY_MS))
}

/// Parse a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(retry_backoff_delay(0), Duration::from_millis(500));
        assert_eq!(retry_backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(retry_backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(retry_backoff_delay(10), Duration::from_millis(8000));
        assert_eq!(retry_backoff_delay(200), Duration::from_millis(8000));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn non_idempotent_requests_only_retry_rate_limits() {
        assert!(RetryPolicy::NotIdempotent.retries_status(429));
        assert!(!RetryPolicy::NotIdempotent.retries_status(500));
        assert!(!RetryPolicy::NotIdempotent.retries_status(503));
        assert!(!RetryPolicy::NotIdempotent.retries_status(408));
        assert!(RetryPolicy::Idempotent.retries_status(503));
        assert!(!RetryPolicy::Idempotent.retries_status(404));
    }

    #[test]
    fn retry_after_seconds() {
        let header = reqwest::header::HeaderValue::from_static("2");
        assert_eq!(parse_retry_after(Some(&header)), Some(Duration::from_secs(2)));
        let bad = reqwest::header::HeaderValue::from_static("soon");
        assert_eq!(parse_retry_after(Some(&bad)), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
