//! Non-critical side effects: failures are logged and never reach the caller.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Awaits `effect` and logs a failure instead of returning it.
pub async fn non_critical<F, T, E>(effect: &'static str, correlation_id: &str, future: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match future.await {
        Ok(value) => {
            debug!(
                event_name = "side_effect.completed",
                effect,
                correlation_id,
                "non-critical side effect completed"
            );
            Some(value)
        }
        Err(error) => {
            warn!(
                event_name = "side_effect.failed",
                effect,
                correlation_id,
                error = %error,
                "non-critical side effect failed"
            );
            None
        }
    }
}

/// Detached variant for work that must not extend the turn.
pub fn spawn_non_critical<F, T, E>(
    effect: &'static str,
    correlation_id: String,
    future: F,
) -> JoinHandle<()>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        let _ = non_critical(effect, &correlation_id, future).await;
    })
}
