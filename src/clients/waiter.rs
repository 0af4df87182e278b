//! Lambda function-updated waiter.

use super::{LambdaApi, LastUpdateStatus};
use crate::error::{HotswapError, Result, WaiterState};
use std::time::Duration;
use tokio::time::Instant;

/// Polling schedule of the function-updated waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaiterConfig {
    /// Delay before the second poll.
    pub min_delay: Duration,
    /// Upper bound of the delay between polls.
    pub max_delay: Duration,
    /// Total time after which the waiter gives up.
    pub max_wait: Duration,
}

impl WaiterConfig {
    /// Schedule for functions that update quickly: 1s/1s/60s.
    pub fn standard() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
        }
    }

    /// Schedule for VPC-attached and container image functions: 5s/5s/300s.
    pub fn slow() -> Self {
        Self {
            min_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Poll `GetFunctionConfiguration` until the last update is no longer in progress.
///
/// The delay starts at `min_delay` and doubles up to `max_delay`. Sleeping
/// happens on the tokio timer, so dropping the future stops polling.
///
/// # Errors
///
/// Returns [`HotswapError::Waiter`] when the update failed or `max_wait`
/// elapsed, or the API error of a failed poll.
pub async fn poll_until_function_updated<L: LambdaApi + ?Sized>(
    lambda: &L,
    function_name: &str,
    config: &WaiterConfig,
) -> Result<()> {
    // no deadline when max_wait does not fit the clock
    let deadline = Instant::now().checked_add(config.max_wait);
    let mut delay = config.min_delay;

    loop {
        let configuration = lambda.get_function_configuration(function_name).await?;
        match configuration.last_update_status {
            Some(LastUpdateStatus::InProgress) => {}
            Some(LastUpdateStatus::Failed) => {
                return Err(HotswapError::Waiter {
                    state: WaiterState::Failure,
                    reason: configuration.last_update_status_reason,
                });
            }
            Some(LastUpdateStatus::Successful) | None => return Ok(()),
        }

        let next_poll = Instant::now().checked_add(delay);
        let past_deadline =
            deadline.is_some_and(|deadline| next_poll.is_none_or(|next| next > deadline));
        if past_deadline {
            return Err(HotswapError::Waiter {
                state: WaiterState::Timeout,
                reason: None,
            });
        }
        tracing::debug!(function_name, delay_ms = delay.as_millis() as u64, "function update in progress");
        tokio::time::sleep(delay).await;
        delay = delay.saturating_mul(2).min(config.max_delay);
    }
}
