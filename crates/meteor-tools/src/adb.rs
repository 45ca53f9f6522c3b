//! Android Debug Bridge client
//!
//! Stateless: every call is keyed by device serial and maps to one `adb`
//! invocation. Only [`logcat`](LocalDeviceBridge::logcat) leaves a process
//! running.

use std::path::{Path, PathBuf};

use meteor_core::prelude::*;
use meteor_core::EventSink;

use crate::process::{ProcessHandle, ProcessResult, ProcessRunner};

const ADB: &str = "adb";

/// Device management commands used by the Android launch sequence
#[trait_variant::make(DeviceBridge: Send)]
pub trait LocalDeviceBridge {
    /// Forward host `port` to the same port on the device
    async fn forward(&self, serial: &str, port: u16) -> Result<()>;

    /// Remove every port forward of the device
    async fn remove_forward(&self, serial: &str) -> Result<()>;

    async fn install(&self, serial: &str, package: &Path, sink: &EventSink) -> Result<()>;

    async fn uninstall(&self, serial: &str, app_id: &str, sink: &EventSink) -> Result<()>;

    /// Start the application's launcher activity
    async fn launch(&self, serial: &str, app_id: &str, sink: &EventSink) -> Result<()>;

    /// Clear the device log buffers
    async fn flush(&self, serial: &str) -> Result<()>;

    /// Stream device logs into the sink until terminated
    async fn logcat(&self, serial: &str, sink: &EventSink) -> Result<ProcessHandle>;
}

/// [`DeviceBridge`] backed by the `adb` executable
#[derive(Debug, Clone)]
pub struct AdbBridge {
    adb: PathBuf,
}

impl AdbBridge {
    pub fn new(adb: impl Into<PathBuf>) -> Self {
        Self { adb: adb.into() }
    }

    pub fn path(&self) -> &Path {
        &self.adb
    }

    /// `adb -s <serial> ...`
    pub(crate) fn command(&self, serial: &str) -> ProcessRunner {
        ProcessRunner::new(&self.adb, ADB).args(["-s", serial])
    }

    /// `adb ...` without selecting a device
    pub(crate) fn global_command(&self) -> ProcessRunner {
        ProcessRunner::new(&self.adb, ADB)
    }
}

impl DeviceBridge for AdbBridge {
    async fn forward(&self, serial: &str, port: u16) -> Result<()> {
        let spec = format!("tcp:{}", port);
        self.command(serial)
            .args(["forward", spec.as_str(), spec.as_str()])
            .run(None)
            .await?
            .check(ADB)?;
        info!("Forwarded port {} on {}", port, serial);
        Ok(())
    }

    async fn remove_forward(&self, serial: &str) -> Result<()> {
        self.command(serial)
            .args(["forward", "--remove-all"])
            .run(None)
            .await?
            .check(ADB)?;
        info!("Removed port forwards on {}", serial);
        Ok(())
    }

    async fn install(&self, serial: &str, package: &Path, sink: &EventSink) -> Result<()> {
        info!("Installing {} on {}", package.display(), serial);
        let result = self
            .command(serial)
            .args(["install", "-r"])
            .arg(package)
            .run(Some(sink))
            .await?;
        check_package_manager(result, "install")
    }

    async fn uninstall(&self, serial: &str, app_id: &str, sink: &EventSink) -> Result<()> {
        info!("Uninstalling {} from {}", app_id, serial);
        let result = self
            .command(serial)
            .args(["uninstall", app_id])
            .run(Some(sink))
            .await?;
        check_package_manager(result, "uninstall")
    }

    async fn launch(&self, serial: &str, app_id: &str, sink: &EventSink) -> Result<()> {
        info!("Launching {} on {}", app_id, serial);
        let result = self
            .command(serial)
            .args([
                "shell",
                "monkey",
                "-p",
                app_id,
                "-c",
                "android.intent.category.LAUNCHER",
                "1",
            ])
            .run(Some(sink))
            .await?
            .check(ADB)?;

        // monkey reports a missing package on stdout and still exits 0
        if result.stdout.iter().any(|l| l.contains("monkey aborted")) {
            return Err(Error::tool_failed(
                ADB,
                format!("no launchable activity found for {}", app_id),
            ));
        }
        Ok(())
    }

    async fn flush(&self, serial: &str) -> Result<()> {
        self.command(serial)
            .args(["logcat", "-c"])
            .run(None)
            .await?
            .check(ADB)?;
        Ok(())
    }

    async fn logcat(&self, serial: &str, sink: &EventSink) -> Result<ProcessHandle> {
        self.command(serial).args(["logcat", "-v", "brief"]).start(sink)
    }
}

/// Older adb versions exit 0 even when the package manager reports
/// `Failure [...]`, so stdout has to be checked too.
fn check_package_manager(result: ProcessResult, action: &str) -> Result<()> {
    let failure = result
        .stdout
        .iter()
        .chain(result.stderr.iter())
        .find(|line| line.trim_start().starts_with("Failure"))
        .cloned();

    let result = result.check(ADB)?;
    match failure {
        Some(line) => Err(Error::tool_failed(ADB, format!("{} {}", action, line))),
        None => {
            trace!("{} output: {:?}", action, result.stdout);
            Ok(())
        }
    }
}
