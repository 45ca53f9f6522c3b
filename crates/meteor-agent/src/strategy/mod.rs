//! Per-platform launch strategies
//!
//! One module per [`DeviceKind`]. Each exposes `launch`, which runs the
//! platform's install/start sequence, and `connect`, which opens the debugger
//! transport and hands the endpoint to the session.

mod android;
mod apple;
mod catalyst;
mod windows;

use meteor_core::prelude::*;
use meteor_core::{DeviceKind, LaunchOutcome, ResolvedDevice};
use meteor_tools::{EmulatorRunner, Toolchain};

use crate::context::LaunchContext;
use crate::session::DebuggerSession;

/// Turn the configured device into one that bridge commands can address.
///
/// Only an Android emulator needs work here: the runner returns the serial
/// of the running instance, booting it first if needed. The emulator is left
/// running afterwards, so nothing is registered for teardown.
pub(crate) async fn resolve_device<T: Toolchain>(
    ctx: &LaunchContext<'_, T>,
) -> Result<ResolvedDevice> {
    let device = &ctx.config.device;

    if device.kind != DeviceKind::Android || !device.emulator {
        return Ok(device.resolve());
    }

    let serial = ctx
        .required(
            "start emulator",
            ctx.tools.emulator().run(&device.name, &device.serial),
        )
        .await?;

    info!("Emulator '{}' is running as {}", device.emulator_name(), serial);
    Ok(device.resolve_with_serial(serial))
}

pub(crate) async fn launch<T: Toolchain>(
    ctx: &mut LaunchContext<'_, T>,
    device: &ResolvedDevice,
) -> Result<LaunchOutcome> {
    match device.kind {
        DeviceKind::Android => android::launch(ctx, device).await,
        DeviceKind::IPhone => apple::launch(ctx, device).await,
        DeviceKind::MacCatalyst => catalyst::launch(ctx).await,
        DeviceKind::Windows => windows::launch(ctx).await,
    }
}

pub(crate) async fn connect<T, S>(
    ctx: &mut LaunchContext<'_, T>,
    device: &ResolvedDevice,
    session: &S,
) -> Result<()>
where
    T: Toolchain,
    S: DebuggerSession + Sync,
{
    match device.kind {
        DeviceKind::Android => android::connect(ctx, device, session).await,
        DeviceKind::IPhone => apple::connect(ctx, device, session).await,
        DeviceKind::MacCatalyst | DeviceKind::Windows => {
            let endpoint = meteor_core::DebugEndpoint::localhost(ctx.config.debug_port);
            ctx.required("attach debugger", session.attach(endpoint))
                .await
        }
    }
}
