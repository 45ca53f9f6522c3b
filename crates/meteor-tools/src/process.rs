//! External process management
//!
//! Two shapes of process exist during a launch:
//! - [`ProcessRunner::run`] spawns a tool and waits for it (install, forward, ...)
//! - [`ProcessRunner::start`] spawns a tool that keeps running in the background
//!   (logcat, tunnels, the launched app) and returns a [`ProcessHandle`]

use std::ffi::{OsStr, OsString};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Notify};

use meteor_core::prelude::*;
use meteor_core::EventSink;

/// How long `terminate` waits for the wait task to reap a killed process
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Output of a tool that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    pub code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Captured stderr, newline-joined
    pub fn stderr_text(&self) -> String {
        self.stderr.join("\n")
    }

    /// Best available description of a failure: stderr, else stdout, else the exit code
    pub fn failure_message(&self) -> String {
        if !self.stderr.is_empty() {
            self.stderr_text()
        } else if !self.stdout.is_empty() {
            self.stdout.join("\n")
        } else {
            format!("exited with code {:?}", self.code)
        }
    }

    /// Turn a non-zero exit into [`Error::ToolFailed`]
    pub fn check(self, tool: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::tool_failed(tool, self.failure_message()))
        }
    }
}

/// Builder for one external tool invocation
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: OsString,
    args: Vec<OsString>,
    /// Short name used in logs, events and errors (e.g. "adb")
    label: String,
}

impl ProcessRunner {
    pub fn new(program: impl AsRef<OsStr>, label: impl Into<String>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            label: label.into(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true); // Critical: dropping a cancelled step kills the tool
        command
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::tool_not_found(self.program.to_string_lossy())
        } else {
            Error::spawn(&self.label, e.to_string())
        }
    }

    /// Spawn the tool and wait for it to exit.
    ///
    /// Output is captured; when a sink is given, each line is relayed to it
    /// after the tool exits. A non-zero exit is NOT an error here, use
    /// [`ProcessResult::check`] for that.
    pub async fn run(&self, sink: Option<&EventSink>) -> Result<ProcessResult> {
        debug!("Running: {}", self.command_line());

        let output = self
            .command()
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let result = ProcessResult {
            code: output.status.code(),
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
        };

        debug!("{} exited with {:?}", self.label, result.code);

        if let Some(sink) = sink {
            for line in &result.stdout {
                sink.output(&self.label, line.clone()).await;
            }
            for line in &result.stderr {
                sink.error_output(&self.label, line.clone()).await;
            }
        }

        Ok(result)
    }

    /// Spawn the tool in the background, relaying its output to `sink`.
    pub fn start(&self, sink: &EventSink) -> Result<ProcessHandle> {
        info!("Starting: {}", self.command_line());

        let mut child = self.command().spawn().map_err(|e| self.spawn_error(e))?;
        let pid = child.id();
        info!("{} started with PID: {:?}", self.label, pid);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(relay_lines(stdout, self.label.clone(), sink.clone(), false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(relay_lines(stderr, self.label.clone(), sink.clone(), true));
        }

        let exited = Arc::new(AtomicBool::new(false));
        let exit_notify = Arc::new(Notify::new());
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(wait_for_exit(
            child,
            self.label.clone(),
            kill_rx,
            sink.clone(),
            Arc::clone(&exited),
            Arc::clone(&exit_notify),
        ));

        Ok(ProcessHandle::from_parts(
            self.label.clone(),
            pid,
            kill_tx,
            exited,
            exit_notify,
        ))
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Read lines from a child pipe and forward them to the sink
async fn relay_lines<R>(pipe: R, label: String, sink: EventSink, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe).lines();

    while let Ok(Some(line)) = reader.next_line().await {
        trace!("{} {}: {}", label, if is_stderr { "stderr" } else { "stdout" }, line);

        if is_stderr {
            sink.error_output(&label, line).await;
        } else {
            sink.output(&label, line).await;
        }

        if sink.is_closed() {
            debug!("{} output channel closed", label);
            break;
        }
    }

    debug!("{} output reader finished", label);
}

/// Background task: owns `child`, waits for it to exit.
///
/// Two ways the task can end:
/// 1. The process exits naturally, `child.wait()` resolves.
/// 2. `kill_rx` fires (terminate or drop), we kill the child, then wait for it.
async fn wait_for_exit(
    mut child: Child,
    label: String,
    kill_rx: oneshot::Receiver<()>,
    sink: EventSink,
    exited: Arc<AtomicBool>,
    exit_notify: Arc<Notify>,
) {
    let code: Option<i32> = tokio::select! {
        result = child.wait() => {
            match result {
                Ok(status) => {
                    info!("{} exited with status: {:?}", label, status);
                    status.code()
                }
                Err(e) => {
                    error!("Error waiting for {}: {}", label, e);
                    None
                }
            }
        }
        _ = kill_rx => {
            info!("Terminating {}", label);
            if let Err(e) = child.kill().await {
                // Already gone is fine: terminate raced a natural exit
                debug!("Failed to kill {}: {}", label, e);
            }
            match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    error!("Error waiting for {} after kill: {}", label, e);
                    None
                }
            }
        }
    };

    // Mark exited and wake waiters before the event, so `has_exited()` is
    // already true when the receiver observes it.
    exited.store(true, Ordering::Release);
    exit_notify.notify_waiters();

    sink.send(meteor_core::LaunchEvent::ProcessExited {
        source: label,
        code,
    })
    .await;
}

/// Handle to one background process.
///
/// Cloning shares the same process. [`terminate`](Self::terminate) is
/// idempotent: the kill signal is sent at most once, and calling it after the
/// process already exited is a no-op.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    label: String,
    pid: Option<u32>,
    /// Tells the wait task to kill the process. Consumed on first use.
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
    /// Set by the wait task once the child has exited
    exited: Arc<AtomicBool>,
    /// Notified by the wait task right after the child exits
    exit_notify: Arc<Notify>,
    /// Set on the first `terminate` call
    terminate_requested: AtomicBool,
}

impl ProcessHandle {
    fn from_parts(
        label: String,
        pid: Option<u32>,
        kill_tx: oneshot::Sender<()>,
        exited: Arc<AtomicBool>,
        exit_notify: Arc<Notify>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                label,
                pid,
                kill_tx: Mutex::new(Some(kill_tx)),
                exited,
                exit_notify,
                terminate_requested: AtomicBool::new(false),
            }),
        }
    }

    /// A handle with no OS process behind it; it "exits" when terminated.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn stub(label: impl Into<String>) -> Self {
        let exited = Arc::new(AtomicBool::new(false));
        let exit_notify = Arc::new(Notify::new());
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        let task_exited = Arc::clone(&exited);
        let task_notify = Arc::clone(&exit_notify);
        tokio::spawn(async move {
            let _ = kill_rx.await;
            task_exited.store(true, Ordering::Release);
            task_notify.notify_waiters();
        });

        Self::from_parts(label.into(), None, kill_tx, exited, exit_notify)
    }

    /// Stop the process and wait (bounded) for it to be reaped.
    pub async fn terminate(&self) -> Result<()> {
        if self.inner.terminate_requested.swap(true, Ordering::AcqRel) {
            debug!("{} already terminated", self.inner.label);
            return Ok(());
        }

        if self.has_exited() {
            debug!("{} already exited", self.inner.label);
            return Ok(());
        }

        // Create the `notified()` future BEFORE sending the kill signal so the
        // wake-up cannot be missed.
        let notified = self.inner.exit_notify.notified();

        if let Some(tx) = self.take_kill_sender() {
            // Send error means the wait task already finished
            let _ = tx.send(());
        }

        if self.has_exited() {
            return Ok(());
        }

        if tokio::time::timeout(TERMINATE_TIMEOUT, notified)
            .await
            .is_err()
        {
            warn!(
                "{} did not exit within {:?} of being killed",
                self.inner.label, TERMINATE_TIMEOUT
            );
        }

        Ok(())
    }

    fn take_kill_sender(&self) -> Option<oneshot::Sender<()>> {
        match self.inner.kill_tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Non-blocking check backed by the wait task's atomic flag
    pub fn has_exited(&self) -> bool {
        self.inner.exited.load(Ordering::Acquire)
    }

    /// True once `terminate` was requested or the process exited on its own
    pub fn is_terminated(&self) -> bool {
        self.inner.terminate_requested.load(Ordering::Acquire) || self.has_exited()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn id(&self) -> Option<u32> {
        self.inner.pid
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if !self.exited.load(Ordering::Acquire) {
            warn!("{} handle dropped while process may still be running", self.label);
            let tx = match self.kill_tx.get_mut() {
                Ok(slot) => slot.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            if let Some(tx) = tx {
                let _ = tx.send(());
            }
        }
    }
}
