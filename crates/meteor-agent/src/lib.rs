//! # meteor-agent - Launch Orchestration
//!
//! Runs the per-platform install/launch sequence for a
//! [`LaunchConfiguration`](meteor_core::LaunchConfiguration) and guarantees
//! that every port forward, tunnel and background process it opened is
//! released exactly once.
//!
//! Depends on [`meteor_core`] for domain types and [`meteor_tools`] for the
//! tool facades.
//!
//! ## Public API
//!
//! - [`LaunchAgent`] - `launch` / `connect` / `dispose` for one attempt
//! - [`CancelHandle`] - Abort the step in flight
//! - [`DisposableRegistry`] - Teardown actions, drained last-in first-out
//! - [`LaunchContext`], [`StepKind`] - Step runner shared by the strategies
//! - [`DebuggerSession`] - Seam to the external debugger session
//! - [`load_settings()`], [`load_launch_file()`] - Configuration files

pub mod agent;
pub mod cancel;
pub mod context;
pub mod disposables;
pub mod session;
pub mod settings;
mod strategy;

pub use agent::LaunchAgent;
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use context::{LaunchContext, StepKind};
pub use disposables::DisposableRegistry;
pub use session::DebuggerSession;
pub use settings::{load_launch_file, load_settings, HostSettings, Settings};
