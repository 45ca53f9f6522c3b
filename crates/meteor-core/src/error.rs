//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // External Tool Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Tool not found: '{tool}'. Check the [tools] section of .meteor/config.toml.")]
    ToolNotFound { tool: String },

    #[error("Failed to spawn {tool}: {reason}")]
    ProcessSpawn { tool: String, reason: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Emulator error: {message}")]
    Emulator { message: String },

    // ─────────────────────────────────────────────────────────────
    // Launch Errors
    // ─────────────────────────────────────────────────────────────
    /// Surfaced verbatim to the user; the message is the tool's own output.
    #[error("{message}")]
    Launch { message: String },

    #[error("Program not found: {path}")]
    ProgramNotFound { path: PathBuf },

    #[error("Launch cancelled")]
    Cancelled,

    #[error("Debugger error: {message}")]
    Debugger { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    pub fn spawn(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProcessSpawn {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn emulator(message: impl Into<String>) -> Self {
        Self::Emulator {
            message: message.into(),
        }
    }

    pub fn launch(message: impl Into<String>) -> Self {
        Self::Launch {
            message: message.into(),
        }
    }

    pub fn debugger(message: impl Into<String>) -> Self {
        Self::Debugger {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ToolFailed { .. } | Error::Debugger { .. } | Error::Cancelled // User chose to stop
        )
    }

    /// Check if this error should stop the whole tool, not just the current attempt
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound { .. }
                | Error::ProgramNotFound { .. }
                | Error::ConfigNotFound { .. }
                | Error::ConfigInvalid { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions (for use with color-eyre)
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::tool_failed("adb", "device offline");
        assert_eq!(err.to_string(), "adb failed: device offline");

        let err = Error::tool_not_found("mlaunch");
        assert!(err.to_string().contains("mlaunch"));
    }

    #[test]
    fn test_launch_error_is_verbatim() {
        let err = Error::launch("A\nB");
        assert_eq!(err.to_string(), "A\nB");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::tool_not_found("adb").is_fatal());
        assert!(Error::ProgramNotFound {
            path: PathBuf::from("/test/app.apk")
        }
        .is_fatal());
        assert!(!Error::tool_failed("adb", "test").is_fatal());
        assert!(!Error::Cancelled.is_fatal());
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(Error::tool_failed("adb", "test").is_recoverable());
        assert!(Error::debugger("refused").is_recoverable());
        assert!(Error::Cancelled.is_recoverable());
        assert!(!Error::tool_not_found("adb").is_recoverable());
    }

    #[test]
    fn test_context_preserves_error() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.context("reading settings").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
