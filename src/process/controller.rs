use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde::Serialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    sync::{oneshot, Mutex},
};

use super::error::ProcessError;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// What to launch for noise cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// `<interpreter> <script file>` run from the script's own directory.
    pub fn script(interpreter: impl Into<String>, script: &Path) -> Self {
        let command = Self::new(interpreter);
        let file_name = script
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| script.to_string_lossy().into_owned());

        match script.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            Some(dir) => command.arg(file_name).current_dir(dir),
            None => command.arg(file_name),
        }
    }

    fn label(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotRunning,
    Starting,
    Running { pid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatus {
    pub is_running: bool,
    pub pid: Option<u32>,
}

struct Tracked {
    state: ProcessState,
    /// Bumped on every start so a stale exit event cannot clear a newer instance.
    generation: u64,
    kill_tx: Option<oneshot::Sender<()>>,
}

/// Runs at most one external process.
///
/// `NotRunning -> Starting -> Running -> NotRunning`: spawn failure and exit
/// both return to `NotRunning`; nothing is retried.
#[derive(Clone)]
pub struct ProcessController {
    command: Arc<ProcessCommand>,
    tracked: Arc<Mutex<Tracked>>,
    running: Arc<AtomicBool>,
}

impl ProcessController {
    pub fn new(command: ProcessCommand) -> Self {
        Self {
            command: Arc::new(command),
            tracked: Arc::new(Mutex::new(Tracked {
                state: ProcessState::NotRunning,
                generation: 0,
                kill_tx: None,
            })),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Lock-free view of whether the process is up, for synchronous callers.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> ProcessState {
        self.tracked.lock().await.state
    }

    pub async fn status(&self) -> ProcessStatus {
        match self.state().await {
            ProcessState::Running { pid } => ProcessStatus {
                is_running: true,
                pid: Some(pid),
            },
            ProcessState::NotRunning | ProcessState::Starting => ProcessStatus {
                is_running: false,
                pid: None,
            },
        }
    }

    /// Kills any running instance, then spawns a fresh one and returns its pid.
    pub async fn start(&self) -> Result<u32, ProcessError> {
        let mut tracked = self.tracked.lock().await;

        if let Some(kill_tx) = tracked.kill_tx.take() {
            log_info!("Stopping existing process before restart");
            let _ = kill_tx.send(());
        }

        tracked.generation += 1;
        let generation = tracked.generation;
        tracked.state = ProcessState::Starting;
        self.running.store(false, Ordering::SeqCst);

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                tracked.state = ProcessState::NotRunning;
                let error = ProcessError::Spawn {
                    program: self.command.label(),
                    reason: err.to_string(),
                };
                log_error!("Failed to start process: {error}");
                return Err(error);
            }
        };

        let Some(pid) = child.id() else {
            tracked.state = ProcessState::NotRunning;
            return Err(ProcessError::MissingPid);
        };

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, pid, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, pid, true));
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(watch_child(
            child,
            kill_rx,
            generation,
            Arc::clone(&self.tracked),
            Arc::clone(&self.running),
        ));

        tracked.state = ProcessState::Running { pid };
        tracked.kill_tx = Some(kill_tx);
        self.running.store(true, Ordering::SeqCst);
        log_info!("Started {} (pid {pid})", self.command.label());

        Ok(pid)
    }

    /// Kills the running instance; returns whether there was one.
    pub async fn stop(&self) -> bool {
        let mut tracked = self.tracked.lock().await;
        let was_running = matches!(tracked.state, ProcessState::Running { .. });

        if let Some(kill_tx) = tracked.kill_tx.take() {
            let _ = kill_tx.send(());
        }
        tracked.state = ProcessState::NotRunning;
        self.running.store(false, Ordering::SeqCst);

        if was_running {
            log_info!("Stopped {}", self.command.label());
        }
        was_running
    }
}

async fn watch_child(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    generation: u64,
    tracked: Arc<Mutex<Tracked>>,
    running: Arc<AtomicBool>,
) {
    let pid = child.id().unwrap_or_default();

    // A dropped sender also counts as a kill request.
    let kill_requested = tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => log_info!("Process {pid} exited with {status}"),
                Err(err) => log_error!("Failed to wait on process {pid}: {err}"),
            }
            false
        }
        _ = kill_rx => true,
    };

    if kill_requested {
        match child.kill().await {
            Ok(()) => log_info!("Process {pid} killed"),
            Err(err) => log_warn!("Failed to kill process {pid}: {err}"),
        }
    }

    let mut guard = tracked.lock().await;
    if guard.generation == generation {
        guard.state = ProcessState::NotRunning;
        guard.kill_tx = None;
        running.store(false, Ordering::SeqCst);
    }
}

async fn forward_output<R>(reader: R, pid: u32, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => log_warn!("[pid {pid}] stderr: {line}"),
            Ok(Some(line)) => log_info!("[pid {pid}] stdout: {line}"),
            Ok(None) => break,
            Err(err) => {
                log_warn!("[pid {pid}] output stream closed: {err}");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sleeper() -> ProcessController {
        ProcessController::new(ProcessCommand::new("sleep").arg("30"))
    }

    async fn wait_until_stopped(controller: &ProcessController) -> bool {
        for _ in 0..100 {
            if !controller.status().await.is_running {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn script_command_runs_from_script_directory() {
        let command = ProcessCommand::script("python3", Path::new("backend/main.py"));
        assert_eq!(command.program, "python3");
        assert_eq!(command.args, vec!["main.py".to_string()]);
        assert_eq!(command.working_dir, Some(PathBuf::from("backend")));

        let bare = ProcessCommand::script("python3", Path::new("main.py"));
        assert_eq!(bare.working_dir, None);
        assert_eq!(bare.label(), "python3 main.py");
    }

    #[tokio::test]
    async fn stop_without_process_reports_nothing_running() {
        let controller = sleeper();
        assert!(!controller.stop().await);
        assert_eq!(controller.state().await, ProcessState::NotRunning);
    }

    #[tokio::test]
    async fn start_then_stop() {
        let controller = sleeper();
        let pid = controller.start().await.unwrap();

        let status = controller.status().await;
        assert!(status.is_running);
        assert_eq!(status.pid, Some(pid));
        assert!(controller.is_running());

        assert!(controller.stop().await);
        let status = controller.status().await;
        assert!(!status.is_running);
        assert_eq!(status.pid, None);
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn restart_replaces_previous_instance() {
        let controller = sleeper();
        let first = controller.start().await.unwrap();
        let second = controller.start().await.unwrap();
        assert_ne!(first, second);

        // Let the first watcher observe its kill; it must not clear the new instance.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.status().await.pid, Some(second));

        controller.stop().await;
    }

    #[tokio::test]
    async fn spawn_failure_leaves_controller_not_running() {
        let controller =
            ProcessController::new(ProcessCommand::new("/nonexistent/noise-cancel-binary"));
        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert!(!controller.status().await.is_running);
    }

    #[tokio::test]
    async fn exited_process_is_cleared() {
        let controller = ProcessController::new(ProcessCommand::new("true"));
        controller.start().await.unwrap();
        assert!(wait_until_stopped(&controller).await);
        assert_eq!(controller.state().await, ProcessState::NotRunning);
    }
}
