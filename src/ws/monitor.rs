use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, info};

use super::registry::RoomRegistry;

/// Periods and thresholds of the background tasks
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub ping_check_interval: Duration,
    pub ping_timeout: Duration,
    pub room_cleanup_interval: Duration,
    pub room_max_age: Duration,
}

/// Start the liveness monitor and the retention sweeper
pub fn spawn_monitors(registry: Arc<RoomRegistry>, settings: MonitorSettings) -> (JoinHandle<()>, JoinHandle<()>) {
    let liveness = tokio::spawn(run_liveness_monitor(
        registry.clone(),
        settings.ping_check_interval,
        settings.ping_timeout,
    ));
    let retention = tokio::spawn(run_retention_sweeper(
        registry,
        settings.room_cleanup_interval,
        settings.room_max_age,
    ));
    (liveness, retention)
}

/// Every `period`, force-close sessions that have not pinged for longer than `timeout`.
pub async fn run_liveness_monitor(registry: Arc<RoomRegistry>, period: Duration, timeout: Duration) {
    info!("Liveness monitor started (every {:?}, timeout {:?})", period, timeout);
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        check_liveness(&registry, timeout).await;
    }
}

/// One liveness pass. Returns the number of evicted sessions.
pub async fn check_liveness(registry: &RoomRegistry, timeout: Duration) -> usize {
    let evicted = registry.evict_stale_sessions(Instant::now(), timeout).await;
    if evicted > 0 {
        info!("Liveness check evicted {} session(s)", evicted);
    } else {
        debug!("Liveness check found no stale sessions");
    }
    evicted
}

/// Every `period`, delete rooms created more than `max_age` ago.
pub async fn run_retention_sweeper(registry: Arc<RoomRegistry>, period: Duration, max_age: Duration) {
    info!("Retention sweeper started (every {:?}, max age {:?})", period, max_age);
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        sweep_once(&registry, max_age).await;
    }
}

/// One retention pass. Returns the codes of the deleted rooms.
pub async fn sweep_once(registry: &RoomRegistry, max_age: Duration) -> Vec<String> {
    let max_age = match chrono::Duration::from_std(max_age) {
        Ok(age) => age,
        Err(e) => {
            error!("Invalid room max age {:?}: {}", max_age, e);
            return Vec::new();
        }
    };
    let cutoff = Utc::now() - max_age;

    match registry.sweep_expired_rooms(cutoff).await {
        Ok(report) => {
            info!(
                "Retention sweep deleted {} room(s), skipped {} occupied",
                report.deleted.len(),
                report.skipped.len()
            );
            report.deleted
        }
        Err(e) => {
            // Retried on the next tick
            error!("Error listing expired rooms: {}", e);
            Vec::new()
        }
    }
}
