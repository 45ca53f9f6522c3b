//! Tool path resolution and host capability
//!
//! Every external tool can be pinned in `.meteor/config.toml`. Anything not
//! pinned is looked up in the Android SDK (for `adb`/`emulator`), then on
//! `PATH`, and finally falls back to the bare tool name so the spawn error
//! names the missing tool.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Tool paths as written in the `[tools]` configuration table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolOverrides {
    #[serde(default)]
    pub adb: Option<PathBuf>,
    #[serde(default)]
    pub emulator: Option<PathBuf>,
    #[serde(default)]
    pub mlaunch: Option<PathBuf>,
    #[serde(default)]
    pub iproxy: Option<PathBuf>,
    #[serde(default)]
    pub ideviceinstaller: Option<PathBuf>,
    #[serde(default)]
    pub open: Option<PathBuf>,
}

/// Resolved tool locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub adb: PathBuf,
    pub emulator: PathBuf,
    pub mlaunch: PathBuf,
    pub iproxy: PathBuf,
    pub ideviceinstaller: PathBuf,
    pub open: PathBuf,
}

impl ToolPaths {
    /// Resolve every tool once, at startup
    pub fn resolve(overrides: &ToolOverrides) -> Self {
        let paths = Self {
            adb: resolve_tool(
                overrides.adb.as_deref(),
                "adb",
                &android_sdk_candidates("platform-tools", "adb"),
            ),
            emulator: resolve_tool(
                overrides.emulator.as_deref(),
                "emulator",
                &android_sdk_candidates("emulator", "emulator"),
            ),
            mlaunch: resolve_tool(overrides.mlaunch.as_deref(), "mlaunch", &[]),
            iproxy: resolve_tool(overrides.iproxy.as_deref(), "iproxy", &[]),
            ideviceinstaller: resolve_tool(
                overrides.ideviceinstaller.as_deref(),
                "ideviceinstaller",
                &[],
            ),
            open: resolve_tool(
                overrides.open.as_deref(),
                "open",
                &[PathBuf::from("/usr/bin/open")],
            ),
        };

        tracing::debug!("Resolved tool paths: {:?}", paths);
        paths
    }
}

/// Candidate paths inside `ANDROID_HOME` / `ANDROID_SDK_ROOT`
fn android_sdk_candidates(subdir: &str, tool: &str) -> Vec<PathBuf> {
    let executable = if cfg!(windows) {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    };

    ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(|root| PathBuf::from(root).join(subdir).join(&executable))
        .collect()
}

fn resolve_tool(configured: Option<&Path>, name: &str, candidates: &[PathBuf]) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return found.clone();
    }

    which::which(name)
        .inspect_err(|e| tracing::debug!("{} not found on PATH: {}", name, e))
        .unwrap_or_else(|_| PathBuf::from(name))
}

/// Capabilities of the machine running meteor (not of the target device)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPlatform {
    /// Whether Apple's native tooling (mlaunch, simulators) runs here
    pub native_apple: bool,
}

impl HostPlatform {
    pub fn detect() -> Self {
        Self {
            native_apple: cfg!(target_os = "macos"),
        }
    }

    /// Detect, unless the configuration forces a value
    pub fn with_override(native_apple: Option<bool>) -> Self {
        match native_apple {
            Some(native_apple) => Self { native_apple },
            None => Self::detect(),
        }
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_configured_path_wins() {
        let overrides = ToolOverrides {
            adb: Some(PathBuf::from("/opt/sdk/adb")),
            ..Default::default()
        };
        let paths = ToolPaths::resolve(&overrides);
        assert_eq!(paths.adb, PathBuf::from("/opt/sdk/adb"));
    }

    #[test]
    fn test_unknown_tool_falls_back_to_name() {
        let path = resolve_tool(None, "meteor-definitely-not-installed", &[]);
        assert_eq!(path, PathBuf::from("meteor-definitely-not-installed"));
    }

    #[test]
    #[serial]
    fn test_android_home_candidate_is_used() {
        let sdk = tempfile::tempdir().unwrap();
        let tools = sdk.path().join("platform-tools");
        std::fs::create_dir_all(&tools).unwrap();
        let adb_name = if cfg!(windows) { "adb.exe" } else { "adb" };
        std::fs::write(tools.join(adb_name), b"").unwrap();

        std::env::set_var("ANDROID_HOME", sdk.path());
        let paths = ToolPaths::resolve(&ToolOverrides::default());
        std::env::remove_var("ANDROID_HOME");

        assert_eq!(paths.adb, tools.join(adb_name));
    }

    #[test]
    #[serial]
    fn test_sdk_candidates_include_sdk_root() {
        std::env::set_var("ANDROID_SDK_ROOT", "/test/sdk");
        let candidates = android_sdk_candidates("emulator", "emulator");
        std::env::remove_var("ANDROID_SDK_ROOT");

        assert!(candidates
            .iter()
            .any(|p| p.starts_with("/test/sdk/emulator")));
    }

    #[test]
    fn test_host_override() {
        assert!(HostPlatform::with_override(Some(true)).native_apple);
        assert!(!HostPlatform::with_override(Some(false)).native_apple);
        assert_eq!(
            HostPlatform::with_override(None).native_apple,
            cfg!(target_os = "macos")
        );
    }

    #[test]
    fn test_overrides_deserialize_partial_table() {
        let overrides: ToolOverrides =
            serde_json::from_str(r#"{ "mlaunch": "/usr/local/bin/mlaunch" }"#).unwrap();
        assert_eq!(
            overrides.mlaunch,
            Some(PathBuf::from("/usr/local/bin/mlaunch"))
        );
        assert!(overrides.adb.is_none());
    }
}
