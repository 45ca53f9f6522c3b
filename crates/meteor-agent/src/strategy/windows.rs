//! Windows: run the executable directly

use meteor_core::prelude::*;
use meteor_core::LaunchOutcome;
use meteor_tools::{DesktopLauncher, Toolchain};

use crate::context::LaunchContext;

pub(super) async fn launch<T: Toolchain>(ctx: &mut LaunchContext<'_, T>) -> Result<LaunchOutcome> {
    let app = ctx
        .required(
            "start application",
            ctx.tools
                .desktop()
                .start_executable(&ctx.config.program, ctx.sink),
        )
        .await?;
    ctx.registry.push_process(app);

    Ok(LaunchOutcome::Launched)
}
