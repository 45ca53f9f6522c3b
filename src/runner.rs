//! Command-line launch flow
//!
//! ```text
//! load settings + launch file
//!   -> launch  (Ctrl-C here cancels the step in flight)
//!   -> connect (debug mode only)
//!   -> wait for Ctrl-C
//!   -> dispose
//! ```

use std::path::PathBuf;
use std::time::Duration;

use color_eyre::eyre::WrapErr;
use tokio::task::JoinHandle;

use meteor_agent::{load_launch_file, load_settings, CancelHandle, LaunchAgent};
use meteor_core::prelude::*;
use meteor_core::{EventSink, LaunchMode, LaunchOutcome};
use meteor_tools::SystemToolchain;

use crate::output::{spawn_printer, OutputFormat};
use crate::session::LogOnlySession;
use crate::signals::wait_for_signal;

const EVENT_BUFFER: usize = 256;

/// How long to wait for output relays to finish after disposal
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub launch_file: PathBuf,
    pub debug: bool,
    pub uninstall: bool,
    pub json: bool,
}

/// Run one launch from the command line
pub async fn run(options: RunOptions) -> color_eyre::Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("meteor starting");
    info!("Launch file: {}", options.launch_file.display());
    info!("═══════════════════════════════════════════════════════");

    let project_path = std::env::current_dir().wrap_err("cannot read working directory")?;
    let settings = load_settings(&project_path);

    let mut config = load_launch_file(&options.launch_file)?;
    if options.debug {
        config.mode = LaunchMode::Debug;
    }
    if options.uninstall {
        config.uninstall_app = true;
    }

    let tools = SystemToolchain::new(&settings.tool_paths(), settings.host_platform());
    let format = if options.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };

    let (sink, rx) = EventSink::channel(EVENT_BUFFER);
    let printer = spawn_printer(rx, format);

    let mut agent = LaunchAgent::new(config, tools);
    let signal = spawn_signal_canceller(agent.cancel_handle());

    let result = launch_and_connect(&mut agent, &sink).await;

    match &result {
        Ok(outcome) => {
            if *outcome == LaunchOutcome::InstalledOnly {
                info!("App installed, waiting for the user to start it");
            }
            sink.important("Running. Press Ctrl-C to stop.").await;
            // The canceller task ends once the signal arrives
            if let Err(e) = signal.await {
                warn!("Signal task failed: {}", e);
            }
            agent.dispose().await;
        }
        Err(e) => {
            signal.abort();
            if e.is_fatal() {
                error!("Launch cannot proceed: {}", e);
                eprintln!(
                    "See {} for details.",
                    meteor_core::logging::get_current_log_file().display()
                );
            } else if e.is_recoverable() {
                warn!("Launch stopped: {}", e);
            }
        }
    }

    drop(agent);
    drop(sink);
    if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, printer)
        .await
        .is_err()
    {
        debug!("Output relays still open after {:?}", OUTPUT_DRAIN_TIMEOUT);
    }

    info!("meteor exiting");
    result.map(|_| ()).map_err(Into::into)
}

async fn launch_and_connect(
    agent: &mut LaunchAgent<SystemToolchain>,
    sink: &EventSink,
) -> Result<LaunchOutcome> {
    let outcome = agent.launch(sink).await?;
    agent.connect(&LogOnlySession::new(sink.clone())).await?;
    Ok(outcome)
}

/// Cancel the agent on the first termination signal.
///
/// During the launch this aborts the step in flight; afterwards the runner
/// awaits the task to know when to shut down.
fn spawn_signal_canceller(cancel: CancelHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            error!("Signal handler error: {}", e);
            return;
        }

        info!("Shutdown signal received");
        cancel.cancel();
    })
}
