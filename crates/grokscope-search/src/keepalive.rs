use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::SearchBackend;

/// Pings `backend` every `every` until the returned task is aborted.
///
/// Failures are only logged; the ping shares nothing with annotation or
/// navigation state.
pub fn spawn_keepalive(backend: Arc<dyn SearchBackend>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; the first ping waits one full period.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match backend.verify().await {
                Ok(()) => tracing::debug!("search server keepalive ok"),
                Err(err) => tracing::warn!(error = %err, "search server keepalive failed"),
            }
        }
    })
}
