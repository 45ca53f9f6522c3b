//! Launch event output
//!
//! Plain mode prints one human-readable line per event. JSON mode prints
//! NDJSON, one object per line, with the event's own fields plus a
//! millisecond timestamp:
//!
//! ```json
//! {"event":"output","source":"adb","line":"Success","timestamp":1704700001000}
//! {"event":"important","message":"Application installed on device. Please tap on the app icon to run it.","timestamp":1704700002000}
//! ```

use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

use meteor_core::LaunchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Debug, Serialize)]
struct TimestampedEvent<'a> {
    #[serde(flatten)]
    event: &'a LaunchEvent,
    timestamp: i64,
}

/// Render one event as a plain text line
pub fn format_plain(event: &LaunchEvent) -> String {
    match event {
        LaunchEvent::Output { source, line } => format!("[{}] {}", source, line),
        LaunchEvent::ErrorOutput { source, line } => format!("[{}] ! {}", source, line),
        LaunchEvent::Important { message } => format!(">> {}", message),
        LaunchEvent::ProcessExited { source, code } => match code {
            Some(code) => format!("[{}] exited with code {}", source, code),
            None => format!("[{}] exited", source),
        },
    }
}

/// Render one event as an NDJSON line (without the newline)
pub fn format_json(event: &LaunchEvent) -> serde_json::Result<String> {
    serde_json::to_string(&TimestampedEvent {
        event,
        timestamp: Utc::now().timestamp_millis(),
    })
}

fn emit(event: &LaunchEvent, format: OutputFormat) {
    let line = match format {
        OutputFormat::Plain => format_plain(event),
        OutputFormat::Json => match format_json(event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize launch event: {}", e);
                return;
            }
        },
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", line) {
        error!("Failed to write launch event to stdout: {}", e);
        return;
    }

    // Flush so piped consumers see events as they happen
    if let Err(e) = stdout.flush() {
        error!("Failed to flush stdout: {}", e);
    }
}

/// Print every event until all senders are gone
pub fn spawn_printer(mut rx: mpsc::Receiver<LaunchEvent>, format: OutputFormat) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            emit(&event, format);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_formatting() {
        let event = LaunchEvent::Output {
            source: "adb".to_string(),
            line: "Success".to_string(),
        };
        assert_eq!(format_plain(&event), "[adb] Success");

        let event = LaunchEvent::ProcessExited {
            source: "logcat".to_string(),
            code: None,
        };
        assert_eq!(format_plain(&event), "[logcat] exited");
    }

    #[test]
    fn test_json_has_event_tag_and_timestamp() {
        let event = LaunchEvent::Important {
            message: "installed".to_string(),
        };
        let json = format_json(&event).expect("serialization failed");
        let value: serde_json::Value = serde_json::from_str(&json).expect("invalid JSON");

        assert_eq!(value["event"], "important");
        assert_eq!(value["message"], "installed");
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_json_process_exited() {
        let event = LaunchEvent::ProcessExited {
            source: "mlaunch".to_string(),
            code: Some(1),
        };
        let value: serde_json::Value =
            serde_json::from_str(&format_json(&event).unwrap()).unwrap();

        assert_eq!(value["event"], "process_exited");
        assert_eq!(value["source"], "mlaunch");
        assert_eq!(value["code"], 1);
    }
}
