use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::{DateTime, Local, Timelike, Utc};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::db::{models::DEFAULT_LOCATION, NewVolumeReading};

use super::{
    clock::{Clock, SystemClock},
    sink::ReadingSink,
    state::{CurrentLevels, NoiseType},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const CHECK_INTERVAL: Duration = Duration::from_secs(60);
const CADENCE_MINUTES: u32 = 5;
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Decides when the current levels become a stored reading.
///
/// The check runs once a minute and only persists when the local wall-clock
/// minute is a multiple of five, so readings land on :00, :05, :10 and so on
/// while the dashboard keeps overwriting the values in between.
#[derive(Clone)]
pub struct VolumeSampler {
    levels: Arc<watch::Sender<CurrentLevels>>,
    sink: Arc<dyn ReadingSink>,
    clock: Arc<dyn Clock>,
    location: Arc<RwLock<String>>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    check_interval: Duration,
}

impl VolumeSampler {
    pub fn new(sink: Arc<dyn ReadingSink>) -> Self {
        Self::with_clock(sink, Arc::new(SystemClock))
    }

    pub fn with_clock(sink: Arc<dyn ReadingSink>, clock: Arc<dyn Clock>) -> Self {
        let (levels, _) = watch::channel(CurrentLevels::default());
        Self {
            levels: Arc::new(levels),
            sink,
            clock,
            location: Arc::new(RwLock::new(DEFAULT_LOCATION.to_string())),
            ticker: Arc::new(Mutex::new(None)),
            check_interval: CHECK_INTERVAL,
        }
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    pub fn set_location(&self, location: impl Into<String>) {
        let mut guard = match self.location.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = location.into();
    }

    pub fn location(&self) -> String {
        match self.location.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the current levels. Nothing is persisted until the next
    /// gated check or an explicit [`log_immediate`](Self::log_immediate).
    pub fn update_volume(&self, volume: f64, ambient: f64, is_active: bool) {
        self.levels.send_replace(CurrentLevels {
            volume,
            ambient,
            is_active,
        });
    }

    pub fn current(&self) -> CurrentLevels {
        *self.levels.borrow()
    }

    pub async fn is_logging(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// Starts the once-a-minute check. No-op when already logging.
    pub async fn start_logging(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if ticker_guard.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let sampler = self.clone();
        let period = self.check_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        sampler.check_cadence().await;
                    }
                    _ = token.cancelled() => {
                        log_info!("volume sampler shutting down");
                        break;
                    }
                }
            }
        });

        *ticker_guard = Some(Ticker { handle, cancel });
        log_info!(
            "Volume logging started (check every {}s, persist every {} min)",
            period.as_secs(),
            CADENCE_MINUTES
        );
    }

    /// Stops the check. No-op when not logging.
    pub async fn stop_logging(&self) {
        let ticker = self.ticker.lock().await.take();
        if let Some(ticker) = ticker {
            ticker.cancel.cancel();
            if let Err(err) = ticker.handle.await {
                log_warn!("volume sampler task ended abnormally: {err}");
            }
            log_info!("Volume logging stopped");
        }
    }

    /// Runs one cadence check against the clock; returns whether the gate
    /// was open (a persist was attempted).
    pub async fn check_cadence(&self) -> bool {
        let now = self.clock.now();
        if now.minute() % CADENCE_MINUTES != 0 {
            return false;
        }

        let levels = self.current();
        self.persist(now, levels.volume, levels.ambient, levels.is_active, None, "scheduled")
            .await;
        true
    }

    /// Persists a reading right away, ignoring the cadence gate. The label
    /// defaults to the classification of `volume`.
    pub async fn log_immediate(
        &self,
        volume: f64,
        ambient: f64,
        is_active: bool,
        noise_type: Option<String>,
    ) {
        let now = self.clock.now();
        self.persist(now, volume, ambient, is_active, noise_type, "immediate")
            .await;
    }

    // Failures are logged and swallowed so the cadence keeps running.
    async fn persist(
        &self,
        captured_at: DateTime<Local>,
        volume: f64,
        ambient: f64,
        is_active: bool,
        noise_type: Option<String>,
        kind: &str,
    ) {
        let noise_type =
            noise_type.unwrap_or_else(|| NoiseType::classify(volume).as_str().to_string());
        let reading = NewVolumeReading {
            timestamp: Some(captured_at.with_timezone(&Utc)),
            volume,
            ambient,
            is_active,
            noise_type: Some(noise_type),
            location: Some(self.location()),
        };

        match time::timeout(SUBMIT_TIMEOUT, self.sink.submit(reading)).await {
            Ok(Ok(id)) => log_info!("Logged {kind} volume reading {id}"),
            Ok(Err(err)) => log_error!("Failed to log {kind} volume reading: {err:?}"),
            Err(_) => log_warn!(
                "Logging {kind} volume reading timed out after {}s",
                SUBMIT_TIMEOUT.as_secs()
            ),
        }
    }
}
