//! The full set of external tools a launch attempt may use

use crate::adb::{AdbBridge, DeviceBridge};
use crate::apple::{AppleLauncher, DeviceTool, IDeviceTool, MonoLauncher};
use crate::desktop::{DesktopLauncher, DesktopTools};
use crate::emulator::{AndroidEmulator, EmulatorRunner};
use crate::fast_dev::{AndroidFastDev, FastDeploy};
use crate::tool_paths::{HostPlatform, ToolPaths};

/// Tool facades grouped per concern, plus the host capability that picks
/// between the native and fallback Apple paths.
///
/// The bridge is `Clone + 'static` because teardown actions own a copy of it.
pub trait Toolchain: Send + Sync {
    type Bridge: DeviceBridge + Clone + Send + Sync + 'static;
    type Emulator: EmulatorRunner + Sync;
    type FastDeploy: FastDeploy + Sync;
    type Apple: AppleLauncher + Sync;
    type DeviceTool: DeviceTool + Sync;
    type Desktop: DesktopLauncher + Sync;

    fn bridge(&self) -> &Self::Bridge;
    fn emulator(&self) -> &Self::Emulator;
    fn fast_deploy(&self) -> &Self::FastDeploy;
    fn apple(&self) -> &Self::Apple;
    fn device_tool(&self) -> &Self::DeviceTool;
    fn desktop(&self) -> &Self::Desktop;
    fn host(&self) -> HostPlatform;
}

/// [`Toolchain`] that shells out to the real tools
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    bridge: AdbBridge,
    emulator: AndroidEmulator,
    fast_deploy: AndroidFastDev,
    apple: MonoLauncher,
    device_tool: IDeviceTool,
    desktop: DesktopTools,
    host: HostPlatform,
}

impl SystemToolchain {
    pub fn new(paths: &ToolPaths, host: HostPlatform) -> Self {
        let bridge = AdbBridge::new(&paths.adb);
        Self {
            emulator: AndroidEmulator::new(bridge.clone(), &paths.emulator),
            fast_deploy: AndroidFastDev::new(bridge.clone()),
            apple: MonoLauncher::new(&paths.mlaunch),
            device_tool: IDeviceTool::new(&paths.iproxy, &paths.ideviceinstaller),
            desktop: DesktopTools::new(&paths.open),
            bridge,
            host,
        }
    }
}

impl Toolchain for SystemToolchain {
    type Bridge = AdbBridge;
    type Emulator = AndroidEmulator;
    type FastDeploy = AndroidFastDev;
    type Apple = MonoLauncher;
    type DeviceTool = IDeviceTool;
    type Desktop = DesktopTools;

    fn bridge(&self) -> &AdbBridge {
        &self.bridge
    }

    fn emulator(&self) -> &AndroidEmulator {
        &self.emulator
    }

    fn fast_deploy(&self) -> &AndroidFastDev {
        &self.fast_deploy
    }

    fn apple(&self) -> &MonoLauncher {
        &self.apple
    }

    fn device_tool(&self) -> &IDeviceTool {
        &self.device_tool
    }

    fn desktop(&self) -> &DesktopTools {
        &self.desktop
    }

    fn host(&self) -> HostPlatform {
        self.host
    }
}
