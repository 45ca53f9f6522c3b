//! Mac Catalyst: hand the bundle to `open`

use meteor_core::prelude::*;
use meteor_core::LaunchOutcome;
use meteor_tools::{DesktopLauncher, Toolchain};

use crate::context::LaunchContext;

/// Blocks until `open` returns. Nothing is registered: `open` hands the app
/// to the system and exits.
pub(super) async fn launch<T: Toolchain>(ctx: &mut LaunchContext<'_, T>) -> Result<LaunchOutcome> {
    let result = ctx
        .required("open", ctx.tools.desktop().open_app(&ctx.config.program))
        .await?;

    if !result.success() {
        return Err(Error::launch(result.stderr_text()));
    }

    Ok(LaunchOutcome::Launched)
}
