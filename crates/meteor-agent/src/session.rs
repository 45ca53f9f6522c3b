//! Debugger session seam
//!
//! The wire protocol lives outside this crate. The agent only opens the
//! transport (port forward, USB tunnel) and tells the session where to attach.

use meteor_core::prelude::*;
use meteor_core::DebugEndpoint;

/// Receiver of the post-launch attach handshake
#[trait_variant::make(DebuggerSession: Send)]
pub trait LocalDebuggerSession {
    /// Attach to the debugger agent of the launched app
    async fn attach(&self, endpoint: DebugEndpoint) -> Result<()>;
}
