//! Apple device tooling
//!
//! - [`MonoLauncher`] drives `mlaunch`, which only runs on a macOS host with
//!   Xcode: simulator/device launch with a debugger port, device install, and
//!   USB TCP tunnels.
//! - [`IDeviceTool`] drives libimobiledevice (`iproxy`, `ideviceinstaller`),
//!   the fallback on hosts without Apple tooling. It can install but not
//!   launch or debug.

use std::path::{Path, PathBuf};

use meteor_core::prelude::*;
use meteor_core::EventSink;

use crate::process::{ProcessHandle, ProcessRunner};

const MLAUNCH: &str = "mlaunch";
const IPROXY: &str = "iproxy";
const IDEVICEINSTALLER: &str = "ideviceinstaller";

/// Environment variable the Mono runtime reads to find the debugger port
const DEBUG_PORT_ENV: &str = "__XAMARIN_DEBUG_PORT__";

/// Native launcher on a macOS host
#[trait_variant::make(AppleLauncher: Send)]
pub trait LocalAppleLauncher {
    /// Install and run the app on a simulator with the debugger agent on `debug_port`
    async fn debug_simulator(
        &self,
        udid: &str,
        app: &Path,
        debug_port: u16,
        sink: &EventSink,
    ) -> Result<ProcessHandle>;

    /// Run an installed app on a physical device with the debugger agent on `debug_port`
    async fn debug_device(
        &self,
        serial: &str,
        app: &Path,
        debug_port: u16,
        sink: &EventSink,
    ) -> Result<ProcessHandle>;

    async fn install_device(&self, serial: &str, app: &Path, sink: &EventSink) -> Result<()>;

    /// Tunnel host `port` to the same port on the device over USB
    async fn tcp_tunnel(&self, serial: &str, port: u16, sink: &EventSink) -> Result<ProcessHandle>;
}

/// [`AppleLauncher`] backed by `mlaunch`
#[derive(Debug, Clone)]
pub struct MonoLauncher {
    mlaunch: PathBuf,
}

impl MonoLauncher {
    pub fn new(mlaunch: impl Into<PathBuf>) -> Self {
        Self {
            mlaunch: mlaunch.into(),
        }
    }

    fn command(&self) -> ProcessRunner {
        ProcessRunner::new(&self.mlaunch, MLAUNCH)
    }
}

/// Arguments that make the launched app connect its debugger agent to `port`
fn debug_arguments(port: u16) -> Vec<String> {
    vec![
        "--argument=-monodevelop-port".to_string(),
        format!("--argument={}", port),
        format!("--setenv={}={}", DEBUG_PORT_ENV, port),
    ]
}

impl AppleLauncher for MonoLauncher {
    async fn debug_simulator(
        &self,
        udid: &str,
        app: &Path,
        debug_port: u16,
        sink: &EventSink,
    ) -> Result<ProcessHandle> {
        self.command()
            .arg("--launchsim")
            .arg(app)
            .arg("--device")
            .arg(format!(":v2:udid={}", udid))
            .args(debug_arguments(debug_port))
            .start(sink)
    }

    async fn debug_device(
        &self,
        serial: &str,
        app: &Path,
        debug_port: u16,
        sink: &EventSink,
    ) -> Result<ProcessHandle> {
        self.command()
            .arg("--launchdev")
            .arg(app)
            .args(["--devname", serial])
            .args(debug_arguments(debug_port))
            .start(sink)
    }

    async fn install_device(&self, serial: &str, app: &Path, sink: &EventSink) -> Result<()> {
        info!("Installing {} on {}", app.display(), serial);
        self.command()
            .arg("--installdev")
            .arg(app)
            .args(["--devname", serial])
            .run(Some(sink))
            .await?
            .check(MLAUNCH)?;
        Ok(())
    }

    async fn tcp_tunnel(&self, serial: &str, port: u16, sink: &EventSink) -> Result<ProcessHandle> {
        self.command()
            .arg(format!("--tcp-tunnel={}:{}", port, port))
            .args(["--devname", serial])
            .start(sink)
    }
}

/// Install-only tooling for hosts without Apple's native tools
#[trait_variant::make(DeviceTool: Send)]
pub trait LocalDeviceTool {
    /// Proxy host `port` to the same port on the device
    async fn proxy(&self, serial: &str, port: u16, sink: &EventSink) -> Result<ProcessHandle>;

    async fn install(&self, serial: &str, app: &Path, sink: &EventSink) -> Result<()>;
}

/// [`DeviceTool`] backed by libimobiledevice
#[derive(Debug, Clone)]
pub struct IDeviceTool {
    iproxy: PathBuf,
    installer: PathBuf,
}

impl IDeviceTool {
    pub fn new(iproxy: impl Into<PathBuf>, installer: impl Into<PathBuf>) -> Self {
        Self {
            iproxy: iproxy.into(),
            installer: installer.into(),
        }
    }
}

impl DeviceTool for IDeviceTool {
    async fn proxy(&self, serial: &str, port: u16, sink: &EventSink) -> Result<ProcessHandle> {
        let port = port.to_string();
        ProcessRunner::new(&self.iproxy, IPROXY)
            .args([port.as_str(), port.as_str(), "-u", serial])
            .start(sink)
    }

    async fn install(&self, serial: &str, app: &Path, sink: &EventSink) -> Result<()> {
        info!("Installing {} on {} via {}", app.display(), serial, IDEVICEINSTALLER);
        ProcessRunner::new(&self.installer, IDEVICEINSTALLER)
            .args(["-u", serial, "-i"])
            .arg(app)
            .run(Some(sink))
            .await?
            .check(IDEVICEINSTALLER)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_arguments() {
        let args = debug_arguments(55555);
        assert_eq!(
            args,
            vec![
                "--argument=-monodevelop-port",
                "--argument=55555",
                "--setenv=__XAMARIN_DEBUG_PORT__=55555",
            ]
        );
    }

    #[tokio::test]
    async fn test_install_without_mlaunch() {
        let launcher = MonoLauncher::new("/nonexistent/mlaunch");
        let (sink, _rx) = EventSink::channel(4);
        let err = AppleLauncher::install_device(&launcher, "00008030", Path::new("/out/App.app"), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_proxy_without_iproxy() {
        let tool = IDeviceTool::new("/nonexistent/iproxy", "/nonexistent/ideviceinstaller");
        let (sink, _rx) = EventSink::channel(4);
        let err = DeviceTool::proxy(&tool, "00008030", 9988, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }
}
