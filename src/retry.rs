//! Bounded retry with a fixed delay between attempts.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{LedgerError, Result};

/// How many times to try and how long to wait between tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(30, Duration::from_secs(2))
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// There is no delay after the final failure. Exhaustion yields
/// [`LedgerError::StoreUnavailable`] carrying the last error message.
pub async fn retry_with_delay<T, F, Fut>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = String::from("no attempts made");

    for attempt in 1..=policy.max_attempts {
        match op(attempt).await {
            Ok(value) => {
                info!("{} ready after {} attempt(s)", label, attempt);
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    "Waiting for {}... (attempt {}/{}): {}",
                    label, attempt, policy.max_attempts, e
                );
                last_error = e.to_string();
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(LedgerError::StoreUnavailable {
        attempts: policy.max_attempts,
        last_error,
    })
}
