//! Android: forward, (uninstall), install, push, launch, logcat

use meteor_core::prelude::*;
use meteor_core::{DebugEndpoint, LaunchOutcome, ResolvedDevice};
use meteor_tools::{DeviceBridge, FastDeploy, Toolchain};

use crate::context::LaunchContext;
use crate::session::DebuggerSession;

pub(super) async fn launch<T: Toolchain>(
    ctx: &mut LaunchContext<'_, T>,
    device: &ResolvedDevice,
) -> Result<LaunchOutcome> {
    let config = ctx.config;
    let sink = ctx.sink;
    let app_id = config.application_id()?;
    let bridge = ctx.tools.bridge();
    let serial = device.serial.as_str();

    ctx.required(
        "forward hot reload port",
        bridge.forward(serial, config.reload_host_port),
    )
    .await?;
    register_remove_forward(ctx, serial);

    if config.uninstall_app {
        ctx.best_effort("uninstall", bridge.uninstall(serial, &app_id, sink))
            .await?;
    }

    ctx.required("install", bridge.install(serial, &config.program, sink))
        .await?;

    let pushed = ctx
        .best_effort(
            "push assemblies",
            ctx.tools.fast_deploy().try_push_assemblies(
                device,
                config.assets_path.as_deref(),
                &app_id,
                sink,
            ),
        )
        .await?;
    if pushed == Some(false) {
        debug!("Assembly push not supported for {}", app_id);
    }

    ctx.required("launch", bridge.launch(serial, &app_id, sink))
        .await?;
    ctx.required("flush device logs", bridge.flush(serial))
        .await?;

    let logcat = ctx.required("logcat", bridge.logcat(serial, sink)).await?;
    ctx.registry.push_process(logcat);

    Ok(LaunchOutcome::Launched)
}

/// Forward the debugger port and attach over it.
///
/// The forward is covered by the remove-all teardown `launch` registered.
pub(super) async fn connect<T, S>(
    ctx: &mut LaunchContext<'_, T>,
    device: &ResolvedDevice,
    session: &S,
) -> Result<()>
where
    T: Toolchain,
    S: DebuggerSession + Sync,
{
    let port = ctx.config.debug_port;

    ctx.required(
        "forward debugger port",
        ctx.tools.bridge().forward(&device.serial, port),
    )
    .await?;

    ctx.required("attach debugger", session.attach(DebugEndpoint::localhost(port)))
        .await
}

fn register_remove_forward<T: Toolchain>(ctx: &mut LaunchContext<'_, T>, serial: &str) {
    let bridge = ctx.tools.bridge().clone();
    let serial = serial.to_string();

    ctx.registry.push(
        format!("remove port forwards on {}", serial),
        move || async move { bridge.remove_forward(&serial).await },
    );
}
