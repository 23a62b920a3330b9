//! Periodic background task that evicts sessions idle past
//! `session_timeout`, on `cleanup_interval` (spec §4.F, §6).

use super::store::SessionStore;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub fn spawn_reaper(
    store: Arc<SessionStore>,
    cleanup_interval: StdDuration,
    session_timeout: chrono::Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reaped = store.reap_expired(session_timeout).await;
                    if reaped > 0 {
                        info!(reaped, remaining = store.len(), "reaped expired sessions");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("session reaper shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Session;

    #[tokio::test]
    async fn test_reaper_evicts_expired_session_on_tick() {
        let store = Arc::new(SessionStore::new(100));
        let handle = store.get_or_create("s1");
        {
            let mut session = handle.lock().await;
            *session = Session::new("s1", 100);
            session.last_activity = chrono::Utc::now() - chrono::Duration::hours(1);
        }

        let shutdown = CancellationToken::new();
        let task = spawn_reaper(
            store.clone(),
            StdDuration::from_millis(10),
            chrono::Duration::minutes(1),
            shutdown.clone(),
        );

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        shutdown.cancel();
        let _ = task.await;

        assert!(store.get("s1").is_none());
    }
}
