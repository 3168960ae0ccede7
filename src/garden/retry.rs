//! Classifier call policy: per-attempt timeout plus retry with exponential
//! backoff for transient failures.
//!
//! Only the classifier call itself is wrapped. Permanent failures (auth,
//! invalid output, missing function call) return immediately; transient ones
//! (rate limits, request failures, timeouts) are retried up to
//! `max_retries` times.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::ClassifierConfig;
use crate::error::ClassifierError;

/// Shortest delay ever slept between attempts.
const MIN_DELAY: Duration = Duration::from_millis(50);

/// Exponential backoff with 25% jitter, capped at `max_delay`.
///
/// `base_delay * 2^attempt`, then uniform jitter in [-25%, +25%], floored at
/// [`MIN_DELAY`].
pub fn backoff_delay(config: &ClassifierConfig, attempt: u32) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let capped_ms = exp_ms.min(config.max_delay.as_millis() as u64);

    let jitter_range = capped_ms / 4;
    let jitter = if jitter_range > 0 {
        let offset = rand::thread_rng().gen_range(0..=jitter_range.saturating_mul(2));
        offset as i64 - jitter_range as i64
    } else {
        0
    };
    let delay_ms = (capped_ms as i64 + jitter).max(MIN_DELAY.as_millis() as i64) as u64;
    Duration::from_millis(delay_ms)
}

/// Run `call` under the classifier policy.
///
/// Each attempt is bounded by `config.timeout`; an elapsed timeout counts as
/// a transient failure. A rate-limit `retry_after` hint replaces the computed
/// backoff, capped at `max_delay`.
pub async fn call_with_policy<T, F, Fut>(
    config: &ClassifierConfig,
    operation: &str,
    mut call: F,
) -> Result<T, ClassifierError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClassifierError>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(config.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(config.timeout)),
        };

        let err = match result {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(
                        operation,
                        attempts = attempt + 1,
                        "classifier succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_transient() || attempt >= config.max_retries {
            tracing::error!(
                operation,
                attempts = attempt + 1,
                error = %err,
                "classifier call failed"
            );
            return Err(err);
        }

        let delay = match err.retry_after() {
            Some(suggested) => suggested.min(config.max_delay),
            None => backoff_delay(config, attempt),
        };

        tracing::warn!(
            operation,
            attempt = attempt + 1,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying classifier after transient error"
        );

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
