//! Launch agent: runs one launch attempt and owns its teardown

use meteor_core::prelude::*;
use meteor_core::{EventSink, LaunchConfiguration, LaunchOutcome, ResolvedDevice};
use meteor_tools::Toolchain;

use crate::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::context::LaunchContext;
use crate::disposables::DisposableRegistry;
use crate::session::DebuggerSession;
use crate::strategy;

#[derive(Debug)]
enum AgentState {
    /// `launch` has not been called yet
    Idle,
    Launched {
        device: ResolvedDevice,
        outcome: LaunchOutcome,
        sink: EventSink,
    },
    /// Launch or connect failed; the registry was drained on the way out
    Failed,
    Disposed,
}

/// Coordinates one launch attempt for one configuration.
///
/// ```text
/// launch ──ok──> connect ──> dispose
///    └──err──> (registry drained) ──> error returned
/// ```
///
/// Each agent owns its own [`DisposableRegistry`]; nothing is shared across
/// agents.
#[derive(Debug)]
pub struct LaunchAgent<T: Toolchain> {
    config: LaunchConfiguration,
    tools: T,
    registry: DisposableRegistry,
    cancel: CancelToken,
    cancel_handle: CancelHandle,
    state: AgentState,
}

impl<T: Toolchain> LaunchAgent<T> {
    pub fn new(config: LaunchConfiguration, tools: T) -> Self {
        let (cancel_handle, cancel) = cancel_pair();
        Self {
            config,
            tools,
            registry: DisposableRegistry::new(),
            cancel,
            cancel_handle,
            state: AgentState::Idle,
        }
    }

    pub fn config(&self) -> &LaunchConfiguration {
        &self.config
    }

    /// Handle that aborts whatever step is in flight
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Device the app was launched on, once `launch` succeeded
    pub fn device(&self) -> Option<&ResolvedDevice> {
        match &self.state {
            AgentState::Launched { device, .. } => Some(device),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<LaunchOutcome> {
        match &self.state {
            AgentState::Launched { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }

    /// Number of teardowns that `dispose` would run
    pub fn pending_teardowns(&self) -> usize {
        self.registry.len()
    }

    /// Run the platform sequence for the configured device.
    ///
    /// On failure (including cancellation) everything acquired so far is
    /// released before the error is returned. On success the resources stay
    /// up until [`dispose`](Self::dispose).
    pub async fn launch(&mut self, sink: &EventSink) -> Result<LaunchOutcome> {
        if !matches!(self.state, AgentState::Idle) {
            return Err(Error::launch("this agent has already run a launch"));
        }

        info!(
            "Launching {} on {} device '{}' ({})",
            self.config.program.display(),
            self.config.device.kind,
            self.config.device.serial,
            self.config.mode
        );

        let result = self.run_launch(sink).await;
        match result {
            Ok((device, outcome)) => {
                info!("Launch finished: {:?} on {}", outcome, device.serial);
                self.state = AgentState::Launched {
                    device,
                    outcome,
                    sink: sink.clone(),
                };
                Ok(outcome)
            }
            Err(e) => {
                warn!("Launch failed, releasing resources: {}", e);
                self.state = AgentState::Failed;
                self.registry.drain(Some(sink)).await;
                Err(e)
            }
        }
    }

    async fn run_launch(&mut self, sink: &EventSink) -> Result<(ResolvedDevice, LaunchOutcome)> {
        self.config.validate()?;

        let mut ctx = LaunchContext::new(
            &self.config,
            &self.tools,
            sink,
            &mut self.registry,
            &self.cancel,
        );

        let device = strategy::resolve_device(&ctx).await?;
        let outcome = strategy::launch(&mut ctx, &device).await?;
        Ok((device, outcome))
    }

    /// Attach the debugger session to the launched app.
    ///
    /// No-op in no-debug mode. Transports opened here (port forwards,
    /// tunnels) go into the same registry as the launch resources.
    pub async fn connect<S>(&mut self, session: &S) -> Result<()>
    where
        S: DebuggerSession + Sync,
    {
        if !self.config.mode.is_debug() {
            debug!("No-debug launch, not attaching a debugger");
            return Ok(());
        }

        let (device, sink) = match &self.state {
            AgentState::Launched { device, sink, .. } => (device.clone(), sink.clone()),
            _ => {
                return Err(Error::debugger(
                    "cannot attach before a successful launch",
                ))
            }
        };

        let mut ctx = LaunchContext::new(
            &self.config,
            &self.tools,
            &sink,
            &mut self.registry,
            &self.cancel,
        );

        let result = strategy::connect(&mut ctx, &device, session).await;
        if let Err(e) = result {
            warn!("Debugger attach failed, releasing resources: {}", e);
            self.state = AgentState::Failed;
            self.registry.drain(Some(&sink)).await;
            return Err(e);
        }

        info!("Debugger attached to {}", device.serial);
        Ok(())
    }

    /// Release every resource of the attempt. A second call does nothing.
    pub async fn dispose(&mut self) {
        let sink = match std::mem::replace(&mut self.state, AgentState::Disposed) {
            AgentState::Launched { sink, .. } => Some(sink),
            AgentState::Disposed => {
                debug!("Launch agent already disposed");
                return;
            }
            AgentState::Idle | AgentState::Failed => None,
        };

        info!("Disposing launch agent ({} teardowns)", self.registry.len());
        self.registry.drain(sink.as_ref()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::RecordingSession;
    use meteor_core::{DebugEndpoint, DeviceIdentity, DeviceKind, LaunchMode};
    use meteor_tools::test_utils::FakeTools;

    fn android(serial: &str) -> LaunchConfiguration {
        LaunchConfiguration::new(
            DeviceIdentity::new(serial, DeviceKind::Android),
            "/out/com.example.app-Signed.apk",
        )
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_any_tool_call() {
        let tools = FakeTools::new();
        let mut agent = LaunchAgent::new(android(""), tools.clone());
        let (sink, _rx) = EventSink::channel(16);

        let err = agent.launch(&sink).await.unwrap_err();

        assert!(matches!(err, Error::ConfigInvalid { .. }));
        assert!(tools.calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_launch_is_rejected() {
        let tools = FakeTools::new();
        let mut agent = LaunchAgent::new(android("R58M"), tools.clone());
        let (sink, _rx) = EventSink::channel(64);

        agent.launch(&sink).await.unwrap();
        let calls = tools.calls().len();

        assert!(agent.launch(&sink).await.is_err());
        assert_eq!(tools.calls().len(), calls);
        agent.dispose().await;
    }

    #[tokio::test]
    async fn test_connect_android_forwards_debug_port_and_attaches() {
        let tools = FakeTools::new();
        let mut agent = LaunchAgent::new(android("R58M"), tools.clone());
        let (sink, _rx) = EventSink::channel(64);
        let session = RecordingSession::default();

        agent.launch(&sink).await.unwrap();
        agent.connect(&session).await.unwrap();

        let forwards: Vec<_> = tools
            .calls()
            .into_iter()
            .filter(|c| c.name() == "forward")
            .collect();
        assert_eq!(forwards.len(), 2);
        assert_eq!(
            *session.endpoints.lock().unwrap(),
            vec![DebugEndpoint::localhost(55555)]
        );

        agent.dispose().await;
        assert_eq!(tools.outstanding_resources(), 0);
    }

    #[tokio::test]
    async fn test_connect_is_noop_without_debug() {
        let tools = FakeTools::new();
        let config = android("R58M").with_mode(LaunchMode::NoDebug);
        let mut agent = LaunchAgent::new(config, tools.clone());
        let (sink, _rx) = EventSink::channel(64);
        let session = RecordingSession::default();

        agent.launch(&sink).await.unwrap();
        let calls = tools.calls().len();
        agent.connect(&session).await.unwrap();

        assert_eq!(tools.calls().len(), calls);
        assert!(session.endpoints.lock().unwrap().is_empty());
        agent.dispose().await;
    }

    #[tokio::test]
    async fn test_connect_before_launch_fails() {
        let mut agent = LaunchAgent::new(android("R58M"), FakeTools::new());
        let err = agent
            .connect(&RecordingSession::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Debugger { .. }));
    }

    #[tokio::test]
    async fn test_failed_attach_releases_resources() {
        let tools = FakeTools::new();
        let mut agent = LaunchAgent::new(android("R58M"), tools.clone());
        let (sink, _rx) = EventSink::channel(64);
        let session = RecordingSession {
            fail: true,
            ..Default::default()
        };

        agent.launch(&sink).await.unwrap();
        assert!(agent.connect(&session).await.is_err());

        assert_eq!(agent.pending_teardowns(), 0);
        assert_eq!(tools.outstanding_resources(), 0);
    }

    #[tokio::test]
    async fn test_connect_ios_device_tunnels_debug_port() {
        let tools = FakeTools::new();
        let config = LaunchConfiguration::new(
            DeviceIdentity::new("00008030-001A", DeviceKind::IPhone),
            "/out/MyApp.app",
        );
        let mut agent = LaunchAgent::new(config, tools.clone());
        let (sink, _rx) = EventSink::channel(64);

        agent.launch(&sink).await.unwrap();
        agent.connect(&RecordingSession::default()).await.unwrap();

        assert_eq!(tools.count("tcp_tunnel"), 2);
        assert_eq!(agent.pending_teardowns(), 3);

        agent.dispose().await;
        assert_eq!(tools.outstanding_resources(), 0);
    }

    #[tokio::test]
    async fn test_dispose_twice_is_noop() {
        let tools = FakeTools::new();
        let mut agent = LaunchAgent::new(android("R58M"), tools.clone());
        let (sink, _rx) = EventSink::channel(64);

        agent.launch(&sink).await.unwrap();
        agent.dispose().await;
        let calls = tools.calls().len();
        agent.dispose().await;

        assert_eq!(tools.calls().len(), calls);
        assert_eq!(tools.count("remove_forward"), 1);
    }
}
