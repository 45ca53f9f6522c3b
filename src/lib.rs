//! meteor command-line runner
//!
//! Loads a launch file, drives a [`LaunchAgent`](meteor_agent::LaunchAgent)
//! with the real toolchain, and prints launch events until interrupted.

pub mod output;
pub mod runner;
pub mod session;
pub mod signals;

pub use output::OutputFormat;
pub use runner::{run, RunOptions};
pub use session::LogOnlySession;
