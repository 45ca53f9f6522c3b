//! Launch event definitions
//!
//! Everything a launch attempt has to say to the debug session goes through
//! an [`EventSink`]: raw process output, and "important" user-facing status
//! messages. Presentation is left to the receiver.

use serde::Serialize;
use tokio::sync::mpsc;

/// Events relayed from a launch attempt to the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LaunchEvent {
    /// Stdout line of an external process
    Output { source: String, line: String },

    /// Stderr line of an external process, or an advisory failure
    ErrorOutput { source: String, line: String },

    /// User-facing status message
    Important { message: String },

    /// A managed background process has exited
    ProcessExited { source: String, code: Option<i32> },
}

impl LaunchEvent {
    pub fn is_important(&self) -> bool {
        matches!(self, LaunchEvent::Important { .. })
    }
}

/// Sender side of the launch event channel
///
/// Cheap to clone; background output relays each hold one. Sends never fail:
/// once the receiver is gone, events are dropped with a trace log.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<LaunchEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<LaunchEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<LaunchEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: LaunchEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::trace!("launch event receiver closed");
        }
    }

    pub async fn output(&self, source: &str, line: impl Into<String>) {
        self.send(LaunchEvent::Output {
            source: source.to_string(),
            line: line.into(),
        })
        .await;
    }

    pub async fn error_output(&self, source: &str, line: impl Into<String>) {
        self.send(LaunchEvent::ErrorOutput {
            source: source.to_string(),
            line: line.into(),
        })
        .await;
    }

    pub async fn important(&self, message: impl Into<String>) {
        self.send(LaunchEvent::Important {
            message: message.into(),
        })
        .await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_relays_in_order() {
        let (sink, mut rx) = EventSink::channel(8);
        sink.output("adb", "Success").await;
        sink.important("Installed").await;

        assert_eq!(
            rx.recv().await,
            Some(LaunchEvent::Output {
                source: "adb".to_string(),
                line: "Success".to_string()
            })
        );
        assert!(rx.recv().await.unwrap().is_important());
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_is_silent() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        sink.important("nobody listening").await;
        assert!(sink.is_closed());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LaunchEvent::ProcessExited {
            source: "logcat".to_string(),
            code: Some(0),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"process_exited""#));
        assert!(json.contains(r#""source":"logcat""#));
    }
}
