//! # meteor-core - Core Domain Types
//!
//! Foundation crate for meteor. Provides the launch configuration model,
//! error handling, launch events and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, regex, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`DeviceKind`] - Closed set of target platforms (Android, iPhone, MacCatalyst, Windows)
//! - [`DeviceIdentity`] - Serial/name/kind/emulator tuple for the selected target
//! - [`ResolvedDevice`] - Device identity after emulator boot (serial filled in)
//! - [`LaunchConfiguration`] - Immutable input to one launch attempt
//! - [`LaunchMode`] - Debug or no-debug
//! - [`LaunchOutcome`] - Result of a successful launch attempt
//! - [`DebugEndpoint`] - Address a debugger session should attach to
//!
//! ### Events (`events`)
//! - [`LaunchEvent`] - Process output and important messages relayed to the session
//! - [`EventSink`] - Cloneable sender side of the event channel
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use meteor_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all meteor crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use events::{EventSink, LaunchEvent};
pub use types::{
    DebugEndpoint, DeviceIdentity, DeviceKind, LaunchConfiguration, LaunchMode, LaunchOutcome,
    ResolvedDevice,
};
