//! Periodic age-based purge of stored readings.

use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::db::Database;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Purges readings older than `days` once per `every`, starting immediately.
pub fn spawn_retention_sweep(
    db: Database,
    days: u32,
    every: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match db.purge_volume_readings_older_than(days).await {
                        Ok(0) => {}
                        Ok(deleted) => log_info!("Retention sweep removed {deleted} readings older than {days} days"),
                        Err(err) => log_error!("Retention sweep failed: {err:?}"),
                    }
                }
                _ = cancel_token.cancelled() => {
                    log_info!("retention sweep shutting down");
                    break;
                }
            }
        }
    })
}
