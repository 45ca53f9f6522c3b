//! Test utilities for tool facades
//!
//! [`FakeTools`] implements every tool trait and [`Toolchain`] by recording
//! each call in order. Background processes are [`ProcessHandle::stub`]s, so
//! tests can check which ones were terminated.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use meteor_core::prelude::*;
use meteor_core::{EventSink, ResolvedDevice};

use crate::adb::DeviceBridge;
use crate::apple::{AppleLauncher, DeviceTool};
use crate::desktop::DesktopLauncher;
use crate::emulator::EmulatorRunner;
use crate::fast_dev::FastDeploy;
use crate::process::{ProcessHandle, ProcessResult};
use crate::tool_paths::HostPlatform;
use crate::toolchain::Toolchain;

/// One recorded tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Forward { serial: String, port: u16 },
    RemoveForward { serial: String },
    Install { serial: String, package: PathBuf },
    Uninstall { serial: String, app_id: String },
    Launch { serial: String, app_id: String },
    Flush { serial: String },
    Logcat { serial: String },
    RunEmulator { name: String, serial: String },
    PushAssemblies { serial: String, app_id: String },
    DebugSimulator { udid: String, debug_port: u16 },
    DebugDevice { serial: String, debug_port: u16 },
    InstallDevice { serial: String },
    TcpTunnel { serial: String, port: u16 },
    Proxy { serial: String, port: u16 },
    DeviceInstall { serial: String },
    OpenApp { app: PathBuf },
    StartExecutable { program: PathBuf },
}

impl ToolCall {
    /// Stable name, also used to inject failures with [`FakeTools::fail_on`]
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Forward { .. } => "forward",
            ToolCall::RemoveForward { .. } => "remove_forward",
            ToolCall::Install { .. } => "install",
            ToolCall::Uninstall { .. } => "uninstall",
            ToolCall::Launch { .. } => "launch",
            ToolCall::Flush { .. } => "flush",
            ToolCall::Logcat { .. } => "logcat",
            ToolCall::RunEmulator { .. } => "run_emulator",
            ToolCall::PushAssemblies { .. } => "push_assemblies",
            ToolCall::DebugSimulator { .. } => "debug_simulator",
            ToolCall::DebugDevice { .. } => "debug_device",
            ToolCall::InstallDevice { .. } => "install_device",
            ToolCall::TcpTunnel { .. } => "tcp_tunnel",
            ToolCall::Proxy { .. } => "proxy",
            ToolCall::DeviceInstall { .. } => "device_install",
            ToolCall::OpenApp { .. } => "open_app",
            ToolCall::StartExecutable { .. } => "start_executable",
        }
    }

    /// Device serial the call was addressed to, if any
    pub fn serial(&self) -> Option<&str> {
        match self {
            ToolCall::Forward { serial, .. }
            | ToolCall::RemoveForward { serial }
            | ToolCall::Install { serial, .. }
            | ToolCall::Uninstall { serial, .. }
            | ToolCall::Launch { serial, .. }
            | ToolCall::Flush { serial }
            | ToolCall::Logcat { serial }
            | ToolCall::PushAssemblies { serial, .. }
            | ToolCall::DebugDevice { serial, .. }
            | ToolCall::InstallDevice { serial }
            | ToolCall::TcpTunnel { serial, .. }
            | ToolCall::Proxy { serial, .. }
            | ToolCall::DeviceInstall { serial } => Some(serial),
            ToolCall::DebugSimulator { udid, .. } => Some(udid),
            ToolCall::RunEmulator { .. }
            | ToolCall::OpenApp { .. }
            | ToolCall::StartExecutable { .. } => None,
        }
    }
}

#[derive(Debug)]
struct FakeState {
    calls: Vec<ToolCall>,
    failing: HashSet<&'static str>,
    /// Calls that never complete, for cancellation tests
    stalling: HashSet<&'static str>,
    processes: Vec<ProcessHandle>,
    /// Serials with at least one active port forward
    forwarded: HashSet<String>,
    emulator_serial: String,
    native_apple: bool,
    open_result: ProcessResult,
    push_supported: bool,
}

/// Recording fake for the whole [`Toolchain`]
#[derive(Debug, Clone)]
pub struct FakeTools {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeTools {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                calls: Vec::new(),
                failing: HashSet::new(),
                stalling: HashSet::new(),
                processes: Vec::new(),
                forwarded: HashSet::new(),
                emulator_serial: "emulator-5554".to_string(),
                native_apple: true,
                open_result: ProcessResult {
                    code: Some(0),
                    ..Default::default()
                },
                push_supported: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake tool state poisoned")
    }

    pub fn with_emulator_serial(self, serial: impl Into<String>) -> Self {
        self.lock().emulator_serial = serial.into();
        self
    }

    pub fn with_native_apple(self, native_apple: bool) -> Self {
        self.lock().native_apple = native_apple;
        self
    }

    pub fn with_open_result(self, result: ProcessResult) -> Self {
        self.lock().open_result = result;
        self
    }

    pub fn with_push_supported(self, supported: bool) -> Self {
        self.lock().push_supported = supported;
        self
    }

    /// Make every call named `name` (see [`ToolCall::name`]) fail
    pub fn fail_on(self, name: &'static str) -> Self {
        self.lock().failing.insert(name);
        self
    }

    /// Make every call named `name` hang after being recorded
    pub fn stall_on(self, name: &'static str) -> Self {
        self.lock().stalling.insert(name);
        self
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.lock().calls.clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(ToolCall::name).collect()
    }

    /// Index of the first call named `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.lock().calls.iter().position(|c| c.name() == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.name() == name).count()
    }

    /// Every background process handed out so far
    pub fn processes(&self) -> Vec<ProcessHandle> {
        self.lock().processes.clone()
    }

    /// Active port forwards plus processes not yet terminated
    pub fn outstanding_resources(&self) -> usize {
        let state = self.lock();
        state.forwarded.len()
            + state
                .processes
                .iter()
                .filter(|p| !p.is_terminated())
                .count()
    }

    async fn record(&self, call: ToolCall) -> Result<()> {
        let name = call.name();
        let (fail, stall) = {
            let mut state = self.lock();
            state.calls.push(call);
            (state.failing.contains(name), state.stalling.contains(name))
        };

        if stall {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(Error::tool_failed(name, format!("{} failed", name)));
        }
        Ok(())
    }

    async fn spawn(&self, call: ToolCall) -> Result<ProcessHandle> {
        let label = call.name();
        self.record(call).await?;
        let handle = ProcessHandle::stub(label);
        self.lock().processes.push(handle.clone());
        Ok(handle)
    }
}

impl DeviceBridge for FakeTools {
    async fn forward(&self, serial: &str, port: u16) -> Result<()> {
        self.record(ToolCall::Forward {
            serial: serial.to_string(),
            port,
        })
        .await?;
        self.lock().forwarded.insert(serial.to_string());
        Ok(())
    }

    async fn remove_forward(&self, serial: &str) -> Result<()> {
        self.record(ToolCall::RemoveForward {
            serial: serial.to_string(),
        })
        .await?;
        self.lock().forwarded.remove(serial);
        Ok(())
    }

    async fn install(&self, serial: &str, package: &Path, _sink: &EventSink) -> Result<()> {
        self.record(ToolCall::Install {
            serial: serial.to_string(),
            package: package.to_path_buf(),
        })
        .await
    }

    async fn uninstall(&self, serial: &str, app_id: &str, _sink: &EventSink) -> Result<()> {
        self.record(ToolCall::Uninstall {
            serial: serial.to_string(),
            app_id: app_id.to_string(),
        })
        .await
    }

    async fn launch(&self, serial: &str, app_id: &str, _sink: &EventSink) -> Result<()> {
        self.record(ToolCall::Launch {
            serial: serial.to_string(),
            app_id: app_id.to_string(),
        })
        .await
    }

    async fn flush(&self, serial: &str) -> Result<()> {
        self.record(ToolCall::Flush {
            serial: serial.to_string(),
        })
        .await
    }

    async fn logcat(&self, serial: &str, _sink: &EventSink) -> Result<ProcessHandle> {
        self.spawn(ToolCall::Logcat {
            serial: serial.to_string(),
        })
        .await
    }
}

impl EmulatorRunner for FakeTools {
    async fn run(&self, name: &str, serial: &str) -> Result<String> {
        self.record(ToolCall::RunEmulator {
            name: name.to_string(),
            serial: serial.to_string(),
        })
        .await?;
        Ok(self.lock().emulator_serial.clone())
    }
}

impl FastDeploy for FakeTools {
    async fn try_push_assemblies(
        &self,
        device: &ResolvedDevice,
        _assets_path: Option<&Path>,
        app_id: &str,
        _sink: &EventSink,
    ) -> Result<bool> {
        self.record(ToolCall::PushAssemblies {
            serial: device.serial.clone(),
            app_id: app_id.to_string(),
        })
        .await?;
        Ok(self.lock().push_supported)
    }
}

impl AppleLauncher for FakeTools {
    async fn debug_simulator(
        &self,
        udid: &str,
        _app: &Path,
        debug_port: u16,
        _sink: &EventSink,
    ) -> Result<ProcessHandle> {
        self.spawn(ToolCall::DebugSimulator {
            udid: udid.to_string(),
            debug_port,
        })
        .await
    }

    async fn debug_device(
        &self,
        serial: &str,
        _app: &Path,
        debug_port: u16,
        _sink: &EventSink,
    ) -> Result<ProcessHandle> {
        self.spawn(ToolCall::DebugDevice {
            serial: serial.to_string(),
            debug_port,
        })
        .await
    }

    async fn install_device(&self, serial: &str, _app: &Path, _sink: &EventSink) -> Result<()> {
        self.record(ToolCall::InstallDevice {
            serial: serial.to_string(),
        })
        .await
    }

    async fn tcp_tunnel(&self, serial: &str, port: u16, _sink: &EventSink) -> Result<ProcessHandle> {
        self.spawn(ToolCall::TcpTunnel {
            serial: serial.to_string(),
            port,
        })
        .await
    }
}

impl DeviceTool for FakeTools {
    async fn proxy(&self, serial: &str, port: u16, _sink: &EventSink) -> Result<ProcessHandle> {
        self.spawn(ToolCall::Proxy {
            serial: serial.to_string(),
            port,
        })
        .await
    }

    async fn install(&self, serial: &str, _app: &Path, _sink: &EventSink) -> Result<()> {
        self.record(ToolCall::DeviceInstall {
            serial: serial.to_string(),
        })
        .await
    }
}

impl DesktopLauncher for FakeTools {
    async fn open_app(&self, app: &Path) -> Result<ProcessResult> {
        self.record(ToolCall::OpenApp {
            app: app.to_path_buf(),
        })
        .await?;
        Ok(self.lock().open_result.clone())
    }

    async fn start_executable(&self, program: &Path, _sink: &EventSink) -> Result<ProcessHandle> {
        self.spawn(ToolCall::StartExecutable {
            program: program.to_path_buf(),
        })
        .await
    }
}

impl Toolchain for FakeTools {
    type Bridge = FakeTools;
    type Emulator = FakeTools;
    type FastDeploy = FakeTools;
    type Apple = FakeTools;
    type DeviceTool = FakeTools;
    type Desktop = FakeTools;

    fn bridge(&self) -> &FakeTools {
        self
    }

    fn emulator(&self) -> &FakeTools {
        self
    }

    fn fast_deploy(&self) -> &FakeTools {
        self
    }

    fn apple(&self) -> &FakeTools {
        self
    }

    fn device_tool(&self) -> &FakeTools {
        self
    }

    fn desktop(&self) -> &FakeTools {
        self
    }

    fn host(&self) -> HostPlatform {
        HostPlatform::with_override(Some(self.lock().native_apple))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_records_calls_in_order() {
        let tools = FakeTools::new();
        DeviceBridge::forward(&tools, "emulator-5554", 9988)
            .await
            .unwrap();
        DeviceBridge::flush(&tools, "emulator-5554").await.unwrap();

        assert_eq!(tools.call_names(), vec!["forward", "flush"]);
        assert_eq!(tools.calls()[0].serial(), Some("emulator-5554"));
    }

    #[tokio::test]
    async fn test_fake_tracks_outstanding_resources() {
        let tools = FakeTools::new();
        let (sink, _rx) = EventSink::channel(4);

        DeviceBridge::forward(&tools, "S1", 9988).await.unwrap();
        let logcat = DeviceBridge::logcat(&tools, "S1", &sink).await.unwrap();
        assert_eq!(tools.outstanding_resources(), 2);

        logcat.terminate().await.unwrap();
        DeviceBridge::remove_forward(&tools, "S1").await.unwrap();
        assert_eq!(tools.outstanding_resources(), 0);
    }

    #[tokio::test]
    async fn test_fake_injected_failure_is_recorded() {
        let tools = FakeTools::new().fail_on("flush");
        let err = DeviceBridge::flush(&tools, "S1").await.unwrap_err();

        assert!(matches!(err, Error::ToolFailed { .. }));
        assert_eq!(tools.count("flush"), 1);
    }
}
