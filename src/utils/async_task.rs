use std::time::Duration;

use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Error;
use crate::ReplicationError;
use crate::Result;

/// Runs `task` until it succeeds or the policy's attempts are used up.
///
/// Each attempt is bounded by `policy.timeout_ms`; the delay between attempts
/// doubles from `base_delay_ms` up to `max_delay_ms`. The last attempt's error
/// is returned on exhaustion.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,                               // The type of the async function
    T: std::future::Future<Output = Result<P>>, // The future returned by the async function
{
    let max_retries = policy.max_retries.max(1);
    let timeout_duration = Duration::from_millis(policy.timeout_ms);
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms);

    let mut last_error = None;
    for attempt in 1..=max_retries {
        match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => {
                return Ok(r);
            }
            Ok(Err(e)) => {
                warn!(attempt, "failed with error: {:?}", &e);
                last_error = Some(e);
            }
            Err(_) => {
                warn!(attempt, "attempt timed out after {:?}", timeout_duration);
                last_error = Some(Error::Replication(ReplicationError::AttemptTimeout(
                    timeout_duration,
                )));
            }
        }

        if attempt < max_retries {
            sleep(delay).await;
            delay = (delay * 2).min(max_delay);
        }
    }

    warn!("Task failed after {} attempts", max_retries);
    Err(last_error.unwrap_or_else(|| Error::Fatal("retry loop ran zero times".to_string())))
}

// Helper function to spawn tasks and track their JoinHandles
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<tokio::task::JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    // Clone the name so it can be safely moved into the async block
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    // Push the handle into the vector inside the Option
    if let Some(h) = handles {
        h.push(handle);
    }
}
