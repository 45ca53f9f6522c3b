//! Android emulator runner
//!
//! Resolves a configured emulator to the adb serial of a running instance.
//! A known serial that adb already lists is reused as is; otherwise the AVD
//! is looked up by name and booted when no instance is up. The booted
//! emulator is left running after meteor exits.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

use meteor_core::prelude::*;

use crate::adb::AdbBridge;

/// How long to wait for a cold-booted emulator to report `sys.boot_completed`
const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(180);

/// Poll interval while waiting for the emulator to come up
const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One line of `adb devices`: `emulator-5554\tdevice`
static DEVICE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<serial>\S+)\s+(?P<state>device|offline|unauthorized|bootloader|recovery)\b")
        .expect("Invalid adb devices regex")
});

/// Starts (or finds) an emulator and reports its serial
#[trait_variant::make(EmulatorRunner: Send)]
pub trait LocalEmulatorRunner {
    /// Serial of the running emulator.
    ///
    /// `serial` wins when adb already lists it; otherwise the AVD `name` is
    /// found or booted. Either may be empty, not both.
    async fn run(&self, name: &str, serial: &str) -> Result<String>;
}

/// [`EmulatorRunner`] backed by the Android SDK `emulator` and `adb`
#[derive(Debug, Clone)]
pub struct AndroidEmulator {
    bridge: AdbBridge,
    emulator: PathBuf,
    boot_timeout: Duration,
}

impl AndroidEmulator {
    pub fn new(bridge: AdbBridge, emulator: impl Into<PathBuf>) -> Self {
        Self {
            bridge,
            emulator: emulator.into(),
            boot_timeout: DEFAULT_BOOT_TIMEOUT,
        }
    }

    pub fn with_boot_timeout(mut self, boot_timeout: Duration) -> Self {
        self.boot_timeout = boot_timeout;
        self
    }

    /// Serials of all emulators currently known to adb
    async fn running_emulators(&self) -> Result<Vec<String>> {
        let result = self
            .bridge
            .global_command()
            .arg("devices")
            .run(None)
            .await?
            .check("adb")?;

        Ok(parse_adb_devices(&result.stdout)
            .into_iter()
            .filter(|(serial, state)| serial.starts_with("emulator-") && state == "device")
            .map(|(serial, _)| serial)
            .collect())
    }

    /// AVD name of a running emulator (`adb -s <serial> emu avd name`)
    async fn avd_name(&self, serial: &str) -> Option<String> {
        let result = self
            .bridge
            .command(serial)
            .args(["emu", "avd", "name"])
            .run(None)
            .await
            .inspect_err(|e| debug!("avd name query failed for {}: {}", serial, e))
            .ok()?;

        if !result.success() {
            return None;
        }
        // Output is the AVD name followed by "OK"
        result
            .stdout
            .into_iter()
            .map(|l| l.trim().to_string())
            .find(|l| !l.is_empty() && l != "OK")
    }

    async fn find_running(&self, name: &str) -> Result<Option<String>> {
        for serial in self.running_emulators().await? {
            if self.avd_name(&serial).await.as_deref() == Some(name) {
                return Ok(Some(serial));
            }
        }
        Ok(None)
    }

    async fn boot_completed(&self, serial: &str) -> bool {
        self.bridge
            .command(serial)
            .args(["shell", "getprop", "sys.boot_completed"])
            .run(None)
            .await
            .map(|r| r.success() && r.stdout.iter().any(|l| l.trim() == "1"))
            .unwrap_or(false)
    }

    /// Start the emulator detached; it keeps running independently
    fn boot(&self, name: &str) -> Result<()> {
        info!("Booting emulator {}", name);

        let mut child = Command::new(&self.emulator)
            .args(["-avd", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found(self.emulator.to_string_lossy())
                } else {
                    Error::emulator(format!("Failed to start emulator: {}", e))
                }
            })?;

        // Reap the child whenever it exits; we never kill it
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(())
    }

    async fn wait_until_booted(&self, name: &str) -> Result<String> {
        loop {
            if let Some(serial) = self.find_running(name).await? {
                if self.boot_completed(&serial).await {
                    return Ok(serial);
                }
                trace!("{} is up as {} but still booting", name, serial);
            }
            tokio::time::sleep(BOOT_POLL_INTERVAL).await;
        }
    }
}

impl EmulatorRunner for AndroidEmulator {
    async fn run(&self, name: &str, serial: &str) -> Result<String> {
        if !serial.is_empty() {
            if self.running_emulators().await?.iter().any(|s| s == serial) {
                info!("Emulator {} already running", serial);
                return Ok(serial.to_string());
            }
            debug!("{} is not listed by adb, falling back to AVD name", serial);
        }

        if name.is_empty() {
            return Err(Error::emulator(format!(
                "{} is not running and no AVD name is configured to boot it",
                serial
            )));
        }

        if let Some(serial) = self.find_running(name).await? {
            info!("Emulator {} already running as {}", name, serial);
            return Ok(serial);
        }

        self.boot(name)?;

        let serial = tokio::time::timeout(self.boot_timeout, self.wait_until_booted(name))
            .await
            .map_err(|_| {
                Error::emulator(format!(
                    "{} did not finish booting within {:?}",
                    name, self.boot_timeout
                ))
            })??;

        info!("Emulator {} booted as {}", name, serial);
        Ok(serial)
    }
}

/// Parse `adb devices` output into `(serial, state)` pairs
fn parse_adb_devices(lines: &[String]) -> Vec<(String, String)> {
    lines
        .iter()
        .filter_map(|line| DEVICE_LINE.captures(line.trim()))
        .map(|caps| (caps["serial"].to_string(), caps["state"].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_adb_devices() {
        let output = lines(
            "List of devices attached\n\
             emulator-5554\tdevice\n\
             R58M123ABC\tunauthorized\n\
             emulator-5556\toffline\n",
        );
        let devices = parse_adb_devices(&output);

        assert_eq!(devices.len(), 3);
        assert_eq!(
            devices[0],
            ("emulator-5554".to_string(), "device".to_string())
        );
        assert_eq!(devices[1].1, "unauthorized");
        assert_eq!(devices[2].1, "offline");
    }

    #[test]
    fn test_parse_adb_devices_ignores_header_and_daemon_noise() {
        let output = lines(
            "* daemon not running; starting now at tcp:5037\n\
             * daemon started successfully\n\
             List of devices attached\n",
        );
        assert!(parse_adb_devices(&output).is_empty());
    }

    #[test]
    fn test_parse_adb_devices_long_format() {
        let output = lines("emulator-5554          device product:sdk_gphone64 model:sdk transport_id:1");
        let devices = parse_adb_devices(&output);
        assert_eq!(devices, vec![("emulator-5554".to_string(), "device".to_string())]);
    }

    #[tokio::test]
    async fn test_run_without_adb_fails() {
        let runner = AndroidEmulator::new(AdbBridge::new("/nonexistent/adb"), "/nonexistent/emulator")
            .with_boot_timeout(Duration::from_millis(100));
        let err = EmulatorRunner::run(&runner, "Pixel_6_API_33", "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }

    /// Write an `adb` stand-in that lists one running emulator
    #[cfg(unix)]
    fn fake_adb(dir: &std::path::Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("adb");
        let script = r#"#!/bin/sh
case "$*" in
  devices) printf 'List of devices attached\nemulator-5554\tdevice\n' ;;
  *"emu avd name"*) printf 'Pixel_6_API_33\nOK\n' ;;
  *) exit 1 ;;
esac
"#;
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reuses_running_serial_without_name() {
        let temp = tempfile::tempdir().unwrap();
        let runner = AndroidEmulator::new(AdbBridge::new(fake_adb(temp.path())), "/nonexistent/emulator")
            .with_boot_timeout(Duration::from_millis(100));

        let serial = EmulatorRunner::run(&runner, "", "emulator-5554")
            .await
            .unwrap();
        assert_eq!(serial, "emulator-5554");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_finds_running_avd_by_name() {
        let temp = tempfile::tempdir().unwrap();
        let runner = AndroidEmulator::new(AdbBridge::new(fake_adb(temp.path())), "/nonexistent/emulator")
            .with_boot_timeout(Duration::from_millis(100));

        let serial = EmulatorRunner::run(&runner, "Pixel_6_API_33", "emulator-5556")
            .await
            .unwrap();
        assert_eq!(serial, "emulator-5554");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_unknown_serial_without_name_fails() {
        let temp = tempfile::tempdir().unwrap();
        let runner = AndroidEmulator::new(AdbBridge::new(fake_adb(temp.path())), "/nonexistent/emulator")
            .with_boot_timeout(Duration::from_millis(100));

        let err = EmulatorRunner::run(&runner, "", "emulator-5560")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Emulator { .. }));
    }
}
