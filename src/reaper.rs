use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::state::registry::Registry;

/// Close every connection idle for longer than `timeout`.
/// Returns how many were closed.
pub async fn reap_idle(registry: &Registry, timeout: Duration) -> usize {
    let now = Utc::now();
    let mut closed = 0;
    for conn in registry.snapshot().await {
        let idle = conn.idle_for(now);
        if idle > timeout && registry.close(&conn).await {
            tracing::info!("Closed idle connection of {} after {}s", conn.id(), idle.as_secs());
            closed += 1;
        }
    }
    closed
}

/// Spawn a background task that periodically closes idle connections
pub fn spawn_idle_reaper(registry: Arc<Registry>, timeout: Duration) {
    let period = (timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            reap_idle(&registry, timeout).await;
        }
    });
}
