//! Fast deployment of managed assemblies to Android
//!
//! Pushes the `.dll`/`.pdb` files of the build output into the app's
//! `files/.__override__` directory so the runtime loads them instead of the
//! ones packaged in the APK. Only debuggable builds allow `run-as`, so an
//! unsupported target is reported as `Ok(false)`, not as an error.

use std::path::{Path, PathBuf};

use meteor_core::prelude::*;
use meteor_core::{EventSink, ResolvedDevice};

use crate::adb::AdbBridge;

/// Staging directory on the device, readable by `run-as`
const STAGING_ROOT: &str = "/data/local/tmp/.__override__";

/// Override directory inside the application's private storage
const OVERRIDE_DIR: &str = "files/.__override__";

const ASSEMBLY_EXTENSIONS: &[&str] = &["dll", "pdb"];

/// Opportunistic assembly push
#[trait_variant::make(FastDeploy: Send)]
pub trait LocalFastDeploy {
    /// Returns `Ok(false)` when the target or build does not support it
    async fn try_push_assemblies(
        &self,
        device: &ResolvedDevice,
        assets_path: Option<&Path>,
        app_id: &str,
        sink: &EventSink,
    ) -> Result<bool>;
}

/// [`FastDeploy`] using `adb push` and `run-as`
#[derive(Debug, Clone)]
pub struct AndroidFastDev {
    bridge: AdbBridge,
}

impl AndroidFastDev {
    pub fn new(bridge: AdbBridge) -> Self {
        Self { bridge }
    }
}

impl FastDeploy for AndroidFastDev {
    async fn try_push_assemblies(
        &self,
        device: &ResolvedDevice,
        assets_path: Option<&Path>,
        app_id: &str,
        sink: &EventSink,
    ) -> Result<bool> {
        let Some(assets_path) = assets_path else {
            debug!("No assets path configured, skipping assembly push");
            return Ok(false);
        };

        let assemblies = collect_assemblies(assets_path).await?;
        if assemblies.is_empty() {
            debug!("No assemblies in {}, skipping push", assets_path.display());
            return Ok(false);
        }

        let staging = format!("{}/{}", STAGING_ROOT, app_id);

        self.bridge
            .command(&device.serial)
            .args(["shell", "mkdir", "-p", staging.as_str()])
            .run(None)
            .await?
            .check("adb")?;

        self.bridge
            .command(&device.serial)
            .arg("push")
            .args(&assemblies)
            .arg(&staging)
            .run(None)
            .await?
            .check("adb")?;

        let copy = format!(
            "mkdir -p {dir} && cp {staging}/* {dir}/",
            dir = OVERRIDE_DIR,
            staging = staging
        );
        let result = self
            .bridge
            .command(&device.serial)
            .args(["shell", "run-as", app_id, "sh", "-c", copy.as_str()])
            .run(None)
            .await?;

        if is_not_debuggable(&result.stdout) || is_not_debuggable(&result.stderr) {
            info!("{} is not debuggable, assembly push unsupported", app_id);
            return Ok(false);
        }
        result.check("adb")?;

        sink.output(
            "fastdev",
            format!("Pushed {} assemblies to {}", assemblies.len(), device.serial),
        )
        .await;
        Ok(true)
    }
}

fn is_not_debuggable(lines: &[String]) -> bool {
    lines
        .iter()
        .any(|l| l.contains("not debuggable") || l.contains("Unknown package"))
}

/// Assemblies directly inside `dir`, sorted for a stable push order
async fn collect_assemblies(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut assemblies = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_assembly = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| ASSEMBLY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_assembly && path.is_file() {
            assemblies.push(path);
        }
    }

    assemblies.sort();
    Ok(assemblies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteor_core::DeviceKind;

    fn device() -> ResolvedDevice {
        ResolvedDevice {
            serial: "emulator-5554".to_string(),
            name: String::new(),
            kind: DeviceKind::Android,
            emulator: true,
        }
    }

    #[tokio::test]
    async fn test_collect_assemblies_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["App.dll", "App.pdb", "App.xml", "Lib.DLL"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.dll")).unwrap();

        let found = collect_assemblies(dir.path()).await.unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["App.dll", "App.pdb", "Lib.DLL"]);
    }

    #[tokio::test]
    async fn test_collect_assemblies_missing_dir() {
        let found = collect_assemblies(Path::new("/nonexistent/assets"))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_push_without_assets_is_unsupported() {
        let fast_dev = AndroidFastDev::new(AdbBridge::new("/nonexistent/adb"));
        let (sink, _rx) = EventSink::channel(4);

        let pushed = FastDeploy::try_push_assemblies(&fast_dev, &device(), None, "com.example", &sink)
            .await
            .unwrap();
        assert!(!pushed);
    }

    #[tokio::test]
    async fn test_push_with_empty_assets_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let fast_dev = AndroidFastDev::new(AdbBridge::new("/nonexistent/adb"));
        let (sink, _rx) = EventSink::channel(4);

        let pushed = FastDeploy::try_push_assemblies(
            &fast_dev,
            &device(),
            Some(dir.path()),
            "com.example",
            &sink,
        )
        .await
        .unwrap();
        assert!(!pushed);
    }

    #[test]
    fn test_not_debuggable_detection() {
        let lines = vec!["run-as: package not debuggable: com.example".to_string()];
        assert!(is_not_debuggable(&lines));
        assert!(!is_not_debuggable(&["ok".to_string()]));
    }
}
