//! Stand-in debugger session for the command-line runner

use meteor_agent::DebuggerSession;
use meteor_core::prelude::*;
use meteor_core::{DebugEndpoint, EventSink};

/// Reports the debugger endpoint instead of speaking the debugger protocol,
/// so an IDE can attach to it by hand.
#[derive(Debug, Clone)]
pub struct LogOnlySession {
    sink: EventSink,
}

impl LogOnlySession {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }
}

impl DebuggerSession for LogOnlySession {
    async fn attach(&self, endpoint: DebugEndpoint) -> Result<()> {
        info!("Debugger endpoint ready at {}", endpoint);
        self.sink
            .important(format!("Debugger listening on {}", endpoint))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteor_core::LaunchEvent;

    #[tokio::test]
    async fn test_attach_reports_endpoint() {
        let (sink, mut rx) = EventSink::channel(4);
        let session = LogOnlySession::new(sink);

        session
            .attach(DebugEndpoint::localhost(55555))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(LaunchEvent::Important {
                message: "Debugger listening on 127.0.0.1:55555".to_string()
            })
        );
    }
}
