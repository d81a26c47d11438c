//! Retry policy: up to three attempts with exponential backoff.
//!
//! Backoff is fixed to `2^attempt` seconds (capped), rather than a
//! configurable multiplier. A failure is transient iff it is a connection
//! error, a timeout, or an upstream 5xx/429 — anything else (e.g. upstream
//! 4xx other than 429) is not retried.

use std::time::Duration;

/// Initial attempt plus up to three retries.
pub const MAX_ATTEMPTS: u32 = 4;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential backoff for a given (zero-indexed) retry attempt: `2^attempt`
/// seconds, capped at 30s.
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt);
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

/// Whether an HTTP status code returned by an upstream counts as a transient
/// failure eligible for retry.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

/// Whether an HTTP method is safe to retry after the body has already begun
/// streaming. GET/HEAD/PUT/DELETE are idempotent; POST/PATCH are only
/// retried if the failure happened before any request bytes were sent.
pub fn is_idempotent(method: &str) -> bool {
    matches!(method.to_ascii_uppercase().as_str(), "GET" | "HEAD" | "PUT" | "DELETE" | "OPTIONS")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        assert_eq!(backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(10), MAX_BACKOFF);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(400));
    }

    #[test]
    fn idempotent_methods() {
        assert!(is_idempotent("GET"));
        assert!(is_idempotent("get"));
        assert!(!is_idempotent("POST"));
        assert!(!is_idempotent("PATCH"));
    }
}
