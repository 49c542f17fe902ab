use crate::services::compiler::CompiledCommand;
use camino::{Utf8Path, Utf8PathBuf};
use std::ffi::OsStr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, broadcast};
use tokio::time::sleep;

/// Resident-memory ceiling for the child. A safety net against runaway
/// behavior in the wrapped binary, not a normal code path.
pub const MEMORY_CEILING_BYTES: u64 = 1024 * 1024 * 1024;

/// How often the memory monitor samples the child.
pub const MEMORY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How often the exit watch polls `try_wait`.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Grace period between the polite terminate signal and the forced kill.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(2);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Severity tag on supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Which component produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// A line of the child's own output (stderr merged with stdout).
    Process,
    /// Lifecycle messages from the supervisor itself.
    Supervisor,
}

/// Structured notification consumed by whatever log sink or UI is wired up.
#[derive(Debug, Clone)]
pub struct ProcessEvent {
    pub severity: Severity,
    pub source: EventSource,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Executable not found: {0}")]
    ExecutableNotFound(Utf8PathBuf),

    #[error("A managed process is already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("Failed to spawn process: {0}")]
    SpawnFailure(#[from] std::io::Error),
}

/// Identity of the managed child, exposed for status display.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub pid: u32,
    pub started_at: Instant,
    /// Rule table indices the running command was compiled from.
    pub rule_indices: Vec<usize>,
}

struct ManagedChild {
    child: Child,
    info: ProcessHandle,
}

/// Launches and supervises the single managed winws child.
///
/// The process handle is owned exclusively here: written by
/// [`launch`](Self::launch) and [`terminate`](Self::terminate), read-only
/// everywhere else. Background tasks (output pumps, exit watch, memory
/// monitor) communicate only through the event channel.
pub struct ProcessSupervisor {
    managed: Arc<Mutex<Option<ManagedChild>>>,
    events: broadcast::Sender<ProcessEvent>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            managed: Arc::new(Mutex::new(None)),
            events,
        }
    }

    /// Subscribe to process output and lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the currently managed child, if any.
    pub async fn status(&self) -> Option<ProcessHandle> {
        self.managed.lock().await.as_ref().map(|mc| mc.info.clone())
    }

    /// Spawn the compiled command and start supervising it.
    ///
    /// `work_dir` is the working directory for the child (the lists
    /// directory's parent, so relative paths inside profile args resolve).
    /// Spawn failures are reported, never retried.
    pub async fn launch(
        &self,
        command: &CompiledCommand,
        work_dir: &Utf8Path,
    ) -> Result<ProcessHandle, SupervisorError> {
        let mut managed = self.managed.lock().await;
        if let Some(existing) = managed.as_ref() {
            return Err(SupervisorError::AlreadyRunning(existing.info.pid));
        }

        if !command.executable.is_file() {
            return Err(SupervisorError::ExecutableNotFound(
                command.executable.clone(),
            ));
        }

        let mut cmd = Command::new(command.executable.as_std_path());
        cmd.args(&command.argv)
            .current_dir(work_dir.as_std_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Background execution: the child must never flash a console window
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = cmd.spawn()?;
        let pid = child.id().unwrap_or_default();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let info = ProcessHandle {
            pid,
            started_at: Instant::now(),
            rule_indices: command.rule_indices.clone(),
        };
        *managed = Some(ManagedChild {
            child,
            info: info.clone(),
        });
        drop(managed);

        tracing::info!("Spawned {} (pid {})", command.executable, pid);
        self.emit(
            Severity::Info,
            EventSource::Supervisor,
            format!("Started {} (pid {})", command.executable, pid),
        );

        if let Some(stdout) = stdout {
            self.spawn_output_pump(stdout);
        }
        if let Some(stderr) = stderr {
            self.spawn_output_pump(stderr);
        }
        self.spawn_exit_watch(pid);
        self.spawn_memory_monitor(pid);

        Ok(info)
    }

    /// Stop the managed child: polite terminate signal, short grace period,
    /// forced kill. Idempotent — calling with nothing running is a no-op.
    pub async fn terminate(&self) {
        let taken = self.managed.lock().await.take();
        let Some(mut mc) = taken else {
            return;
        };
        let pid = mc.info.pid;

        let sys_pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        let graceful = system
            .process(sys_pid)
            .and_then(|p| p.kill_with(Signal::Term))
            .unwrap_or(false);

        let mut exited = false;
        if graceful {
            let deadline = Instant::now() + TERMINATE_GRACE;
            while Instant::now() < deadline {
                match mc.child.try_wait() {
                    Ok(Some(_)) => {
                        exited = true;
                        break;
                    }
                    Ok(None) => sleep(Duration::from_millis(200)).await,
                    Err(_) => break,
                }
            }
        }

        if !exited {
            if let Err(e) = mc.child.kill().await {
                tracing::warn!("Force kill of pid {} failed: {}", pid, e);
            }
        }

        self.emit(
            Severity::Info,
            EventSource::Supervisor,
            format!("Terminated winws (pid {})", pid),
        );
    }

    /// Whether any process with this exact image name is running.
    pub fn is_running(image_name: &str) -> bool {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
            .processes_by_exact_name(OsStr::new(image_name))
            .next()
            .is_some()
    }

    /// Terminate every process with this exact image name.
    ///
    /// Recovers from orphaned children whose handle was lost across a
    /// restart. Zero matches is a normal no-op; returns the number of
    /// processes signalled. OS teardown is asynchronous — callers re-check
    /// [`is_running`](Self::is_running) after a grace period rather than
    /// trusting the count.
    pub fn stop_all(image_name: &str) -> usize {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut stopped = 0;
        for process in system.processes_by_exact_name(OsStr::new(image_name)) {
            // Term is not supported on every platform; fall back to kill
            let signalled = process
                .kill_with(Signal::Term)
                .unwrap_or_else(|| process.kill());
            if signalled {
                stopped += 1;
            }
        }

        if stopped > 0 {
            tracing::info!("Stopped {} {} process(es)", stopped, image_name);
        }
        stopped
    }

    fn emit(&self, severity: Severity, source: EventSource, message: String) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.events.send(ProcessEvent {
            severity,
            source,
            message,
        });
    }

    /// Forward one output pipe of the child to the event channel, line by
    /// line, until EOF. stderr and stdout pumps feed the same channel.
    fn spawn_output_pump<R>(&self, pipe: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(pipe).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = events.send(ProcessEvent {
                    severity: Severity::Info,
                    source: EventSource::Process,
                    message: line,
                });
            }
        });
    }

    /// Poll for the child exiting on its own and report the exit code.
    /// Any code is informational; interpreting it is the caller's business.
    fn spawn_exit_watch(&self, pid: u32) {
        let managed = Arc::clone(&self.managed);
        let events = self.events.clone();
        tokio::spawn(async move {
            loop {
                {
                    let mut guard = managed.lock().await;
                    match guard.as_mut() {
                        Some(mc) if mc.info.pid == pid => match mc.child.try_wait() {
                            Ok(Some(status)) => {
                                let code = status.code().unwrap_or(-1);
                                *guard = None;
                                tracing::info!("winws (pid {}) exited with code {}", pid, code);
                                let _ = events.send(ProcessEvent {
                                    severity: Severity::Info,
                                    source: EventSource::Supervisor,
                                    message: format!("process finished with code {}", code),
                                });
                                break;
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!("try_wait for pid {} failed: {}", pid, e);
                            }
                        },
                        // Terminated or replaced; nothing left to watch
                        _ => break,
                    }
                }
                sleep(EXIT_POLL_INTERVAL).await;
            }
        });
    }

    /// Sample the child's resident memory and kill it above the ceiling.
    fn spawn_memory_monitor(&self, pid: u32) {
        let managed = Arc::clone(&self.managed);
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut system = System::new();
            let sys_pid = Pid::from_u32(pid);

            loop {
                sleep(MEMORY_POLL_INTERVAL).await;

                {
                    let guard = managed.lock().await;
                    match guard.as_ref() {
                        Some(mc) if mc.info.pid == pid => {}
                        _ => break,
                    }
                }

                system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
                let Some(process) = system.process(sys_pid) else {
                    continue;
                };

                let memory = process.memory();
                if memory > MEMORY_CEILING_BYTES {
                    tracing::warn!(
                        "winws (pid {}) uses {} MiB, above the {} MiB ceiling; killing",
                        pid,
                        memory / (1024 * 1024),
                        MEMORY_CEILING_BYTES / (1024 * 1024)
                    );
                    let _ = events.send(ProcessEvent {
                        severity: Severity::Warning,
                        source: EventSource::Supervisor,
                        message: format!(
                            "Memory usage {} MiB exceeds ceiling, killing process",
                            memory / (1024 * 1024)
                        ),
                    });

                    let mut guard = managed.lock().await;
                    if let Some(mc) = guard.as_mut() {
                        if mc.info.pid == pid {
                            if let Err(e) = mc.child.start_kill() {
                                tracing::error!("Memory-ceiling kill failed: {}", e);
                            }
                        }
                    }
                    // The exit watch reports the resulting exit
                    break;
                }
            }
        });
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
