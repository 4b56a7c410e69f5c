//! Retry classification and backoff helpers shared by every tracker call.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// GitHub signals rate limiting with 403 as well as 429; both are retryable
/// alongside server errors. Every other 4xx is a caller error.
pub fn is_retryable_status(status: u16) -> bool {
    status == 403 || status == 429 || status >= 500
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// Exponential backoff of `backoff_base^attempt` seconds, capped at 2^6
/// growth so late attempts stay bounded.
pub fn backoff_delay(backoff_base: u32, attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt.min(6)).unwrap_or(6);
    let seconds = u64::from(backoff_base.max(1)).saturating_pow(exponent);
    Duration::from_secs(seconds)
}

/// Parses a `Retry-After` header carrying either delta-seconds or an
/// HTTP-date.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at.signed_duration_since(Utc::now()).num_milliseconds();
    if delay_ms <= 0 {
        return Some(Duration::ZERO);
    }
    u64::try_from(delay_ms).ok().map(Duration::from_millis)
}

/// Sleep duration before the next attempt: the server's `Retry-After` wish
/// when present, exponential backoff otherwise.
pub fn retry_delay(backoff_base: u32, attempt: usize, retry_after: Option<Duration>) -> Duration {
    retry_after.unwrap_or_else(|| backoff_delay(backoff_base, attempt))
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}
