//! Exponential backoff retry with jitter, and the pure classification
//! function that decides whether a given [`Error`] is worth retrying.
//!
//! Classification never relies on catching and re-throwing — it's a direct
//! match over `Error` variants (spec §9: "model both as explicit state; do
//! not rely on exception unwinding for retry decisions").

use crate::error::Error;
use rand::Rng;
use std::time::Duration;

/// Whether an error should trigger a retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    NonRetryable,
}

/// Classify an error per spec §4.A:
/// - Non-retryable: auth failures, malformed requests, quota/plan denials,
///   context-length overflow, `systemPromptTooLarge`.
/// - Retryable: transient transport, 5xx, rate-limit, stream reset.
pub fn classify(err: &Error) -> RetryClass {
    match err {
        Error::RateLimit(_) | Error::Http(_) | Error::Llm(_) | Error::Timeout => {
            RetryClass::Retryable
        }
        Error::NonRetryable(_)
        | Error::ContextLengthExceeded(_)
        | Error::SystemPromptTooLarge(_)
        | Error::Validation(_)
        | Error::Config(_)
        | Error::Json(_) => RetryClass::NonRetryable,
        // Everything else (tool/session/gateway-level errors) never reaches
        // the LLM retry loop, but default to non-retryable for safety.
        _ => RetryClass::NonRetryable,
    }
}

/// `base * 2^attempt`, plus up to 20% jitter, matching spec §4.A's backoff
/// formula (defaults: base 1s, 3 attempts).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.as_millis().saturating_mul(1u128 << attempt.min(16));
    let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..0.2);
    let jittered = exp as f64 * (1.0 + jitter_frac);
    Duration::from_millis(jittered as u64)
}

/// Run `attempt` up to `max_retries + 1` times, applying [`backoff_delay`]
/// between retryable failures and returning immediately on a non-retryable
/// one or on success.
pub async fn with_retry<T, F, Fut>(
    base: Duration,
    max_retries: u32,
    mut attempt: F,
) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let mut last_err = None;
    for round in 0..=max_retries {
        match attempt(round).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if classify(&e) == RetryClass::NonRetryable || round == max_retries {
                    return Err(e);
                }
                tokio::time::sleep(backoff_delay(base, round)).await;
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::other("retry loop exhausted without an error")))
}
