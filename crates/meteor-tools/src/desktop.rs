//! Desktop launchers: Mac Catalyst via `open`, Windows via direct spawn

use std::path::{Path, PathBuf};

use meteor_core::prelude::*;
use meteor_core::EventSink;

use crate::process::{ProcessHandle, ProcessResult, ProcessRunner};

const OPEN: &str = "open";

/// Launchers for apps that run on the host itself
#[trait_variant::make(DesktopLauncher: Send)]
pub trait LocalDesktopLauncher {
    /// Hand an app bundle to the platform `open` tool and wait for it to return
    async fn open_app(&self, app: &Path) -> Result<ProcessResult>;

    /// Spawn a native executable in the background
    async fn start_executable(&self, program: &Path, sink: &EventSink) -> Result<ProcessHandle>;
}

/// [`DesktopLauncher`] backed by the real host tools
#[derive(Debug, Clone)]
pub struct DesktopTools {
    open: PathBuf,
}

impl DesktopTools {
    pub fn new(open: impl Into<PathBuf>) -> Self {
        Self { open: open.into() }
    }
}

impl DesktopLauncher for DesktopTools {
    async fn open_app(&self, app: &Path) -> Result<ProcessResult> {
        info!("Opening {}", app.display());
        // The path is passed as one argument, so spaces need no quoting
        ProcessRunner::new(&self.open, OPEN).arg(app).run(None).await
    }

    async fn start_executable(&self, program: &Path, sink: &EventSink) -> Result<ProcessHandle> {
        let program = resolve_executable(program)?;
        let label = program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "app".to_string());

        ProcessRunner::new(&program, label).start(sink)
    }
}

/// Absolute, non-UNC path to an existing executable
pub fn resolve_executable(program: &Path) -> Result<PathBuf> {
    dunce::canonicalize(program).map_err(|e| {
        debug!("Cannot resolve {}: {}", program.display(), e);
        Error::ProgramNotFound {
            path: program.to_path_buf(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_executable() {
        let err = resolve_executable(Path::new("/nonexistent/MyApp.exe")).unwrap_err();
        assert!(matches!(err, Error::ProgramNotFound { .. }));
    }

    #[test]
    fn test_resolve_existing_executable_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("MyApp.exe");
        std::fs::write(&exe, b"").unwrap();

        let resolved = resolve_executable(&exe).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("MyApp.exe"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_open_app_reports_failure_output() {
        let dir = tempfile::tempdir().unwrap();
        let fake_open = dir.path().join("open");
        std::fs::write(&fake_open, "#!/bin/sh\necho A >&2\necho B >&2\nexit 1\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&fake_open, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tools = DesktopTools::new(&fake_open);
        let result = DesktopLauncher::open_app(&tools, Path::new("/out/My App.app"))
            .await
            .unwrap();

        assert!(!result.success());
        assert_eq!(result.stderr, vec!["A", "B"]);
    }
}
