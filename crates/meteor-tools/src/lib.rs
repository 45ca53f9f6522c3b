//! # meteor-tools - External Tool Facades
//!
//! Wraps the device and platform tools a launch drives (`adb`, `emulator`,
//! `mlaunch`, libimobiledevice, `open`) behind async traits, plus the process
//! handling they share.
//!
//! Depends on [`meteor_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Process Management
//! - [`ProcessRunner`] - Spawn a tool, either waiting for it or in the background
//! - [`ProcessHandle`] - Idempotently terminable background process
//! - [`ProcessResult`] - Exit code and captured output of a finished tool
//!
//! ### Tool Facades
//! - [`DeviceBridge`] / [`AdbBridge`] - Port forwarding, install, launch, logcat
//! - [`EmulatorRunner`] / [`AndroidEmulator`] - Find or boot an Android emulator
//! - [`FastDeploy`] / [`AndroidFastDev`] - Push assemblies to a debuggable build
//! - [`AppleLauncher`] / [`MonoLauncher`] - Simulator/device launch on a macOS host
//! - [`DeviceTool`] / [`IDeviceTool`] - Install-only fallback for iOS devices
//! - [`DesktopLauncher`] / [`DesktopTools`] - Mac Catalyst and Windows apps
//!
//! ### Tool Resolution
//! - [`ToolPaths`], [`ToolOverrides`] - Where each tool lives
//! - [`HostPlatform`] - Whether Apple's native tools are usable
//! - [`Toolchain`], [`SystemToolchain`] - All facades bundled for one launch

pub mod adb;
pub mod apple;
pub mod desktop;
pub mod emulator;
pub mod fast_dev;
pub mod process;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tool_paths;
pub mod toolchain;

// Only the Send variants are re-exported; the Local traits stay module-scoped
pub use adb::{AdbBridge, DeviceBridge};
pub use apple::{AppleLauncher, DeviceTool, IDeviceTool, MonoLauncher};
pub use desktop::{resolve_executable, DesktopLauncher, DesktopTools};
pub use emulator::{AndroidEmulator, EmulatorRunner};
pub use fast_dev::{AndroidFastDev, FastDeploy};
pub use process::{ProcessHandle, ProcessResult, ProcessRunner};
pub use tool_paths::{HostPlatform, ToolOverrides, ToolPaths};
pub use toolchain::{SystemToolchain, Toolchain};
