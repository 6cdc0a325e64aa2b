//! Periodic background tasks: cache eviction and activity logging. Both
//! run alongside the dispatcher and are aborted at shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::bot::AppState;

pub fn spawn_background_tasks(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    vec![
        spawn_cache_sweep(state.clone()),
        spawn_activity_logger(state),
    ]
}

fn spawn_cache_sweep(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = state.cache.sweep();
            if removed > 0 {
                tracing::debug!("cache sweep evicted {removed} stale user entries");
            }
        }
    })
}

fn spawn_activity_logger(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match state
                .db
                .count_active_since(Utc::now() - chrono::Duration::hours(24))
                .await
            {
                Ok(n) => tracing::info!("{n} users active in the last 24h"),
                Err(e) => tracing::warn!("activity stat query failed: {e}"),
            }
        }
    })
}
