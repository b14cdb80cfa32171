//! Daily on/off window for the noise-cancellation process.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Local};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    process::ProcessController,
    sampler::Clock,
    settings::{ScheduleSettings, SettingsStore},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Whether `now` lies inside the inclusive `[start, end]` window. Times are
/// compared as zero-padded `HH:MM` text.
pub fn within_window(now: &DateTime<Local>, schedule: &ScheduleSettings) -> bool {
    let current = now.format("%H:%M").to_string();
    current.as_str() >= schedule.start.as_str() && current.as_str() <= schedule.end.as_str()
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Starts the process inside the configured window and stops it outside.
/// Disabled schedules never touch the process.
#[derive(Clone)]
pub struct ScheduleController {
    settings: Arc<SettingsStore>,
    process: ProcessController,
    clock: Arc<dyn Clock>,
    ticker: Arc<Mutex<Option<Ticker>>>,
}

impl ScheduleController {
    pub fn new(
        settings: Arc<SettingsStore>,
        process: ProcessController,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            process,
            clock,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    /// Checks immediately, then once a minute. No-op when already running.
    pub async fn start(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if ticker_guard.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(CHECK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        controller.apply().await;
                    }
                    _ = token.cancelled() => {
                        log_info!("schedule loop shutting down");
                        break;
                    }
                }
            }
        });

        *ticker_guard = Some(Ticker { handle, cancel });
    }

    pub async fn stop(&self) {
        let ticker = self.ticker.lock().await.take();
        if let Some(ticker) = ticker {
            ticker.cancel.cancel();
            let _ = ticker.handle.await;
        }
    }

    /// One schedule check. Returns the desired running state when the
    /// schedule is enabled.
    pub async fn apply(&self) -> Option<bool> {
        let schedule = self.settings.schedule();
        if !schedule.enabled {
            return None;
        }

        let should_run = within_window(&self.clock.now(), &schedule);
        let running = self.process.status().await.is_running;

        if should_run && !running {
            log_info!("Schedule window {}-{} opened", schedule.start, schedule.end);
            if let Err(err) = self.process.start().await {
                log_error!("Scheduled start failed: {err}");
            }
        } else if !should_run && running {
            log_info!("Schedule window {}-{} closed", schedule.start, schedule.end);
            self.process.stop().await;
        }

        Some(should_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::process::ProcessCommand;

    fn local(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 1, hour, minute, 0)
            .single()
            .unwrap()
    }

    struct FixedClock(DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    fn schedule(enabled: bool) -> ScheduleSettings {
        ScheduleSettings {
            enabled,
            start: "09:00".into(),
            end: "17:00".into(),
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = schedule(true);
        assert!(!within_window(&local(8, 59), &window));
        assert!(within_window(&local(9, 0), &window));
        assert!(within_window(&local(12, 30), &window));
        assert!(within_window(&local(17, 0), &window));
        assert!(!within_window(&local(17, 1), &window));
    }

    fn store_with(schedule: ScheduleSettings, name: &str) -> Arc<SettingsStore> {
        let path = std::env::temp_dir()
            .join(format!("noisedash-schedule-{}-{name}", std::process::id()))
            .join("settings.json");
        let store = SettingsStore::new(path).unwrap();
        let mut settings = store.get();
        settings.schedule = schedule;
        store.update(settings).unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn disabled_schedule_never_toggles() {
        let process = ProcessController::new(ProcessCommand::new("sleep").arg("30"));
        let controller = ScheduleController::new(
            store_with(schedule(false), "disabled"),
            process.clone(),
            Arc::new(FixedClock(local(10, 0))),
        );

        assert_eq!(controller.apply().await, None);
        assert!(!process.status().await.is_running);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn enabled_schedule_starts_inside_window_and_stops_outside() {
        let process = ProcessController::new(ProcessCommand::new("sleep").arg("30"));
        let settings = store_with(schedule(true), "enabled");

        let inside = ScheduleController::new(
            Arc::clone(&settings),
            process.clone(),
            Arc::new(FixedClock(local(10, 0))),
        );
        assert_eq!(inside.apply().await, Some(true));
        assert!(process.status().await.is_running);

        let outside = ScheduleController::new(
            settings,
            process.clone(),
            Arc::new(FixedClock(local(18, 0))),
        );
        assert_eq!(outside.apply().await, Some(false));
        assert!(!process.status().await.is_running);
    }
}
