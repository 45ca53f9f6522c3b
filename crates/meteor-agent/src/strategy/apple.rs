//! iOS simulator and device launch
//!
//! The native path (macOS host with `mlaunch`) can launch and debug. Without
//! it the app can only be installed, and the user starts it by hand.

use meteor_core::prelude::*;
use meteor_core::{DebugEndpoint, LaunchOutcome, ResolvedDevice};
use meteor_tools::{AppleLauncher, DeviceTool, Toolchain};

use crate::context::LaunchContext;
use crate::session::DebuggerSession;

const MANUAL_START_MESSAGE: &str =
    "Application installed on device. Please tap on the app icon to run it.";

pub(super) async fn launch<T: Toolchain>(
    ctx: &mut LaunchContext<'_, T>,
    device: &ResolvedDevice,
) -> Result<LaunchOutcome> {
    if !ctx.tools.host().native_apple {
        return install_only(ctx, device).await;
    }

    if device.emulator {
        launch_simulator(ctx, device).await
    } else {
        launch_device(ctx, device).await
    }
}

async fn launch_simulator<T: Toolchain>(
    ctx: &mut LaunchContext<'_, T>,
    device: &ResolvedDevice,
) -> Result<LaunchOutcome> {
    let config = ctx.config;

    let app = ctx
        .required(
            "launch on simulator",
            ctx.tools.apple().debug_simulator(
                &device.serial,
                &config.program,
                config.debug_port,
                ctx.sink,
            ),
        )
        .await?;
    ctx.registry.push_process(app);

    Ok(LaunchOutcome::Launched)
}

async fn launch_device<T: Toolchain>(
    ctx: &mut LaunchContext<'_, T>,
    device: &ResolvedDevice,
) -> Result<LaunchOutcome> {
    let config = ctx.config;
    let apple = ctx.tools.apple();
    let serial = device.serial.as_str();

    let tunnel = ctx
        .required(
            "tunnel hot reload port",
            apple.tcp_tunnel(serial, config.reload_host_port, ctx.sink),
        )
        .await?;
    ctx.registry.push_process(tunnel);

    ctx.required(
        "install on device",
        apple.install_device(serial, &config.program, ctx.sink),
    )
    .await?;

    let app = ctx
        .required(
            "launch on device",
            apple.debug_device(serial, &config.program, config.debug_port, ctx.sink),
        )
        .await?;
    ctx.registry.push_process(app);

    Ok(LaunchOutcome::Launched)
}

async fn install_only<T: Toolchain>(
    ctx: &mut LaunchContext<'_, T>,
    device: &ResolvedDevice,
) -> Result<LaunchOutcome> {
    let config = ctx.config;
    let tool = ctx.tools.device_tool();
    let serial = device.serial.as_str();

    info!("No native Apple tooling on this host, installing only");

    let proxy = ctx
        .required(
            "proxy hot reload port",
            tool.proxy(serial, config.reload_host_port, ctx.sink),
        )
        .await?;
    ctx.registry.push_process(proxy);

    ctx.required("install on device", tool.install(serial, &config.program, ctx.sink))
        .await?;

    ctx.sink.important(MANUAL_START_MESSAGE).await;
    Ok(LaunchOutcome::InstalledOnly)
}

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

    if !ctx.tools.host().native_apple {
        info!("App was installed only, nothing to attach to");
        return Ok(());
    }

    if !device.emulator {
        let tunnel = ctx
            .required(
                "tunnel debugger port",
                ctx.tools.apple().tcp_tunnel(&device.serial, port, ctx.sink),
            )
            .await?;
        ctx.registry.push_process(tunnel);
    }

    ctx.required("attach debugger", session.attach(DebugEndpoint::localhost(port)))
        .await
}
