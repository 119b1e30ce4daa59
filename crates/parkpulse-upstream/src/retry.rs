//! Bounded exponential backoff with jitter.
//!
//! Shared by both source adapters; retries only errors the caller marks
//! retryable.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

use crate::error::UpstreamError;

/// Maximum retry attempts.
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (1 second).
const BASE_DELAY_MS: u64 = 1_000;

/// Maximum jitter added to each delay, in milliseconds.
const JITTER_MS: u64 = 250;

/// Execute a function with exponential backoff retry.
///
/// Retries up to [`MAX_RETRIES`] attempts on retryable errors, doubling the
/// delay each time and adding up to 250 ms of jitter so parallel park
/// fetches do not retry in lockstep.
pub async fn with_retry<T, F, Fut>(source: &str, f: F) -> Result<T, UpstreamError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                let jitter = rand::thread_rng().gen_range(0..JITTER_MS);
                let delay =
                    Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt - 1) + jitter);
                warn!(
                    source = source,
                    attempt = attempt,
                    max_attempts = MAX_RETRIES,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Upstream API error, retrying"
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_retryable_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_retry("test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(UpstreamError::RateLimited)
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_retry("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(UpstreamError::RateLimited)
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_does_not_retry_parse_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_retry("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(UpstreamError::Parse("bad".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
