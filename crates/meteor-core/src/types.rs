//! Core domain type definitions

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Android package artifacts are named `<package>-Signed.apk` by the .NET build
static PACKAGE_ARTIFACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>.+?)(?:-Signed)?\.(?:apk|aab)$").expect("Invalid package artifact regex")
});

const DEFAULT_DEBUG_PORT: u16 = 55555;
const DEFAULT_RELOAD_HOST_PORT: u16 = 9988;

// ─────────────────────────────────────────────────────────
// Device Types
// ─────────────────────────────────────────────────────────

/// Target platform of a launch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum DeviceKind {
    #[serde(rename = "android")]
    Android,
    #[serde(rename = "iphone", alias = "ios")]
    IPhone,
    #[serde(rename = "maccatalyst", alias = "mac_catalyst")]
    MacCatalyst,
    #[serde(rename = "windows")]
    Windows,
}

impl DeviceKind {
    /// Whether this platform has a notion of emulator/simulator targets
    pub fn supports_emulator(&self) -> bool {
        matches!(self, DeviceKind::Android | DeviceKind::IPhone)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Android => write!(f, "Android"),
            DeviceKind::IPhone => write!(f, "iOS"),
            DeviceKind::MacCatalyst => write!(f, "Mac Catalyst"),
            DeviceKind::Windows => write!(f, "Windows"),
        }
    }
}

/// The device selected for a launch attempt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceIdentity {
    /// Device serial (adb serial, simulator UDID, device UDID).
    /// Empty for an Android emulator that is not running yet.
    #[serde(default)]
    pub serial: String,

    /// Human-readable name; the AVD name for Android emulators
    #[serde(default)]
    pub name: String,

    pub kind: DeviceKind,

    /// Whether this is an emulator/simulator
    #[serde(default)]
    pub emulator: bool,
}

impl DeviceIdentity {
    pub fn new(serial: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            serial: serial.into(),
            name: String::new(),
            kind,
            emulator: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_emulator(mut self, emulator: bool) -> Self {
        self.emulator = emulator;
        self
    }

    /// Resolve this identity as-is, without booting anything
    pub fn resolve(&self) -> ResolvedDevice {
        ResolvedDevice {
            serial: self.serial.clone(),
            name: self.name.clone(),
            kind: self.kind,
            emulator: self.emulator,
        }
    }

    /// Resolve this identity to the serial of a running instance
    pub fn resolve_with_serial(&self, serial: impl Into<String>) -> ResolvedDevice {
        ResolvedDevice {
            serial: serial.into(),
            ..self.resolve()
        }
    }

    /// Name used when talking to the emulator runner
    pub fn emulator_name(&self) -> &str {
        if self.name.is_empty() {
            &self.serial
        } else {
            &self.name
        }
    }
}

/// A device identity whose serial is known to address a reachable instance.
///
/// Produced once at the start of a strategy, before any bridge command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub serial: String,
    pub name: String,
    pub kind: DeviceKind,
    pub emulator: bool,
}

// ─────────────────────────────────────────────────────────
// Launch Configuration
// ─────────────────────────────────────────────────────────

/// Whether a debugger session is attached after launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    #[default]
    Debug,
    NoDebug,
}

impl LaunchMode {
    pub fn is_debug(&self) -> bool {
        matches!(self, LaunchMode::Debug)
    }
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchMode::Debug => write!(f, "debug"),
            LaunchMode::NoDebug => write!(f, "no-debug"),
        }
    }
}

/// Immutable input to one launch attempt
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LaunchConfiguration {
    pub device: DeviceIdentity,

    /// Build artifact: `.apk`, `.app` bundle, or native executable
    pub program: PathBuf,

    /// Application identifier; derived from the artifact name when absent
    #[serde(default)]
    pub app_id: Option<String>,

    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Host port of the hot reload channel
    #[serde(default = "default_reload_host_port")]
    pub reload_host_port: u16,

    /// Directory holding the managed assemblies for fast deployment
    #[serde(default)]
    pub assets_path: Option<PathBuf>,

    /// Uninstall the application before installing it
    #[serde(default)]
    pub uninstall_app: bool,

    #[serde(default)]
    pub mode: LaunchMode,
}

fn default_debug_port() -> u16 {
    DEFAULT_DEBUG_PORT
}

fn default_reload_host_port() -> u16 {
    DEFAULT_RELOAD_HOST_PORT
}

impl LaunchConfiguration {
    pub fn new(device: DeviceIdentity, program: impl Into<PathBuf>) -> Self {
        Self {
            device,
            program: program.into(),
            app_id: None,
            debug_port: DEFAULT_DEBUG_PORT,
            reload_host_port: DEFAULT_RELOAD_HOST_PORT,
            assets_path: None,
            uninstall_app: false,
            mode: LaunchMode::default(),
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_mode(mut self, mode: LaunchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_uninstall(mut self, uninstall_app: bool) -> Self {
        self.uninstall_app = uninstall_app;
        self
    }

    pub fn with_assets_path(mut self, assets_path: impl Into<PathBuf>) -> Self {
        self.assets_path = Some(assets_path.into());
        self
    }

    /// Application identifier used by install/launch commands.
    ///
    /// Falls back to the artifact file name:
    /// - `com.example.app-Signed.apk` -> `com.example.app`
    /// - `MyApp.app` -> `MyApp`
    pub fn application_id(&self) -> Result<String> {
        if let Some(id) = self.app_id.as_deref().filter(|id| !id.trim().is_empty()) {
            return Ok(id.trim().to_string());
        }

        application_id_from_artifact(&self.program).ok_or_else(|| {
            Error::config_invalid(format!(
                "cannot derive an application id from '{}'; set app_id",
                self.program.display()
            ))
        })
    }

    /// Check the configuration is complete for its device kind
    pub fn validate(&self) -> Result<()> {
        if self.program.as_os_str().is_empty() {
            return Err(Error::config_invalid("program path is empty"));
        }

        let device = &self.device;
        // A cold Android emulator is addressed by AVD name until it has booted
        let needs_serial = match device.kind {
            DeviceKind::Android => !device.emulator,
            DeviceKind::IPhone => true,
            DeviceKind::MacCatalyst | DeviceKind::Windows => false,
        };

        if device.kind == DeviceKind::Android && device.emulator && device.emulator_name().is_empty()
        {
            return Err(Error::config_invalid(
                "Android emulator needs a name (AVD) or a serial",
            ));
        }

        if needs_serial && device.serial.is_empty() {
            return Err(Error::config_invalid(format!(
                "{} device needs a serial",
                device.kind
            )));
        }

        if self.debug_port == 0 || self.reload_host_port == 0 {
            return Err(Error::config_invalid("ports must be non-zero"));
        }

        // Checked up front so a bad artifact never cold-boots an emulator
        if device.kind == DeviceKind::Android {
            self.application_id()?;
        }

        Ok(())
    }
}

fn application_id_from_artifact(program: &Path) -> Option<String> {
    let file_name = program.file_name()?.to_str()?;

    if let Some(caps) = PACKAGE_ARTIFACT.captures(file_name) {
        return caps.name("id").map(|m| m.as_str().to_string());
    }

    program
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ─────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────

/// Successful result of a launch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOutcome {
    /// The application was started (or handed to a launcher that started it)
    Launched,
    /// The application was installed but has to be started by hand
    InstalledOnly,
}

/// Address a debugger session reads from once `connect` has opened the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEndpoint {
    pub host: String,
    pub port: u16,
}

impl DebugEndpoint {
    pub fn localhost(port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
        }
    }
}

impl fmt::Display for DebugEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
