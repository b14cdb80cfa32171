pub mod analyser;
mod capture;
pub mod error;

pub use analyser::{level_from_bytes, LevelAnalyser};
pub use error::MonitorError;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{error, info, warn};
use tokio::sync::oneshot;

use capture::InputCapture;

/// Roughly one display refresh.
const REFRESH_INTERVAL: Duration = Duration::from_millis(16);

struct MonitorSession {
    stop: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl MonitorSession {
    /// Signals the worker and joins it off the async executor.
    async fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        let worker = self.worker;
        match tokio::task::spawn_blocking(move || worker.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => error!("Failed to join monitor thread: {join_err:?}"),
            Err(task_err) => error!("Monitor shutdown task failed: {task_err}"),
        }
    }
}

/// Owns at most one microphone session at a time.
///
/// The cpal stream is not `Send`, so each session lives on a dedicated thread
/// that holds the device, analyses the newest samples once per refresh tick
/// and hands the 0-100 level to the caller's callback.
#[derive(Clone, Default)]
pub struct AudioLevelMonitor {
    session: Arc<Mutex<Option<MonitorSession>>>,
}

impl AudioLevelMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<MonitorSession>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.lock_session().is_some()
    }

    /// Acquires the default microphone and starts calling `on_level` every
    /// refresh tick. Any running session is torn down first.
    ///
    /// Returns `false` when the device cannot be opened; the cause is logged.
    pub async fn start_monitoring<F>(&self, on_level: F) -> bool
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.stop_monitoring().await;

        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), MonitorError>>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        let worker = match thread::Builder::new()
            .name("level-monitor".into())
            .spawn(move || run_session(ready_tx, stop_for_thread, on_level))
        {
            Ok(handle) => handle,
            Err(err) => {
                error!("Error starting audio monitoring: {}", MonitorError::from(err));
                return false;
            }
        };

        match ready_rx.await {
            Ok(Ok(())) => {
                let previous = self
                    .lock_session()
                    .replace(MonitorSession { stop, worker });
                if let Some(previous) = previous {
                    warn!("Replacing a monitoring session started concurrently");
                    previous.shutdown().await;
                }
                info!("Audio monitoring started");
                true
            }
            Ok(Err(err)) => {
                error!("Error starting audio monitoring: {err}");
                let _ = tokio::task::spawn_blocking(move || worker.join()).await;
                false
            }
            Err(_) => {
                error!("Monitor thread exited before signaling readiness");
                let _ = tokio::task::spawn_blocking(move || worker.join()).await;
                false
            }
        }
    }

    /// Stops the refresh loop and releases the device. Safe to call when idle.
    pub async fn stop_monitoring(&self) {
        let session = self.lock_session().take();
        if let Some(session) = session {
            session.shutdown().await;
            info!("Audio monitoring stopped");
        }
    }
}

fn run_session<F>(
    ready_tx: oneshot::Sender<Result<(), MonitorError>>,
    stop: Arc<AtomicBool>,
    mut on_level: F,
) where
    F: FnMut(f64),
{
    let capture = match InputCapture::open() {
        Ok(capture) => capture,
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    let mut analyser = LevelAnalyser::new();
    while !stop.load(Ordering::SeqCst) {
        thread::sleep(REFRESH_INTERVAL);
        let level = analyser.analyse(&capture.frame());
        on_level(level);
    }

    drop(capture);
    info!("Monitor session closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stopping_an_idle_monitor_is_a_no_op() {
        let monitor = AudioLevelMonitor::new();
        assert!(!monitor.is_monitoring());
        monitor.stop_monitoring().await;
        monitor.stop_monitoring().await;
        assert!(!monitor.is_monitoring());
    }
}
