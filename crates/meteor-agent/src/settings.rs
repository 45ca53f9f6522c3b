//! Settings parser for .meteor/config.toml and launch files

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use meteor_core::prelude::*;
use meteor_core::LaunchConfiguration;
use meteor_tools::{HostPlatform, ToolOverrides, ToolPaths};

const CONFIG_FILENAME: &str = "config.toml";
const METEOR_DIR: &str = ".meteor";

/// Contents of `.meteor/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub tools: ToolOverrides,

    #[serde(default)]
    pub host: HostSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostSettings {
    /// Force the native Apple path on or off instead of detecting it
    #[serde(default)]
    pub native_apple: Option<bool>,
}

impl Settings {
    pub fn tool_paths(&self) -> ToolPaths {
        ToolPaths::resolve(&self.tools)
    }

    pub fn host_platform(&self) -> HostPlatform {
        HostPlatform::with_override(self.host.native_apple)
    }
}

/// Load settings from `.meteor/config.toml`, falling back to defaults
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(METEOR_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Load a launch configuration from a TOML launch file.
///
/// Relative `program` and `assets_path` entries are resolved against the
/// directory holding the file. Unlike settings, a broken launch file is an
/// error: there is nothing sensible to launch by default.
pub fn load_launch_file(path: &Path) -> Result<LaunchConfiguration> {
    if !path.is_file() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading launch file {}", path.display()))?;
    let mut config: LaunchConfiguration = toml::from_str(&content)
        .map_err(|e| Error::config_invalid(format!("{}: {}", path.display(), e)))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.program = relative_to(base, &config.program);
    config.assets_path = config.assets_path.map(|p| relative_to(base, &p));

    debug!("Loaded launch file {:?}", path);
    Ok(config)
}

fn relative_to(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteor_core::{DeviceKind, LaunchMode};
    use tempfile::tempdir;

    #[test]
    fn test_load_settings_defaults() {
        let temp = tempdir().unwrap();
        let settings = load_settings(temp.path());

        assert_eq!(settings, Settings::default());
        assert!(settings.host.native_apple.is_none());
    }

    #[test]
    fn test_load_settings_custom() {
        let temp = tempdir().unwrap();
        let meteor_dir = temp.path().join(".meteor");
        std::fs::create_dir_all(&meteor_dir).unwrap();

        let config = r#"
[tools]
adb = "/opt/android/platform-tools/adb"

[host]
native_apple = false
"#;
        std::fs::write(meteor_dir.join("config.toml"), config).unwrap();

        let settings = load_settings(temp.path());
        assert_eq!(
            settings.tools.adb,
            Some(PathBuf::from("/opt/android/platform-tools/adb"))
        );
        assert!(settings.tools.mlaunch.is_none());
        assert!(!settings.host_platform().native_apple);
        assert_eq!(
            settings.tool_paths().adb,
            PathBuf::from("/opt/android/platform-tools/adb")
        );
    }

    #[test]
    fn test_load_settings_invalid_toml() {
        let temp = tempdir().unwrap();
        let meteor_dir = temp.path().join(".meteor");
        std::fs::create_dir_all(&meteor_dir).unwrap();

        std::fs::write(meteor_dir.join("config.toml"), "not valid toml {{{{").unwrap();

        let settings = load_settings(temp.path());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_launch_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("launch.toml");
        let content = r#"
program = "bin/com.example.app-Signed.apk"
assets_path = "obj/assets"
uninstall_app = true
mode = "no_debug"

[device]
kind = "android"
name = "Pixel_6_API_33"
emulator = true
"#;
        std::fs::write(&path, content).unwrap();

        let config = load_launch_file(&path).unwrap();

        assert_eq!(config.device.kind, DeviceKind::Android);
        assert!(config.device.emulator);
        assert_eq!(config.device.serial, "");
        assert_eq!(config.program, temp.path().join("bin/com.example.app-Signed.apk"));
        assert_eq!(config.assets_path, Some(temp.path().join("obj/assets")));
        assert_eq!(config.mode, LaunchMode::NoDebug);
        assert_eq!(config.debug_port, 55555);
        assert_eq!(config.reload_host_port, 9988);
        assert!(config.uninstall_app);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_launch_file_keeps_absolute_program() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("launch.toml");
        std::fs::write(
            &path,
            "program = \"/out/MyApp.exe\"\n\n[device]\nkind = \"windows\"\n",
        )
        .unwrap();

        let config = load_launch_file(&path).unwrap();
        assert_eq!(config.program, PathBuf::from("/out/MyApp.exe"));
    }

    #[test]
    fn test_load_launch_file_missing() {
        let temp = tempdir().unwrap();
        let err = load_launch_file(&temp.path().join("launch.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_launch_file_invalid() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("launch.toml");
        std::fs::write(&path, "program = \"App.exe\"\n[device]\nkind = \"blackberry\"\n").unwrap();

        let err = load_launch_file(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }
}
