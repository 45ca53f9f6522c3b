//! meteor - install, launch and debug .NET apps on devices
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use meteor::RunOptions;

/// meteor - install, launch and debug .NET mobile and desktop apps
#[derive(Parser, Debug)]
#[command(name = "meteor")]
#[command(about = "Install, launch and debug .NET apps on devices", long_about = None)]
struct Args {
    /// Launch file (TOML) describing the device and build artifact
    #[arg(value_name = "LAUNCH_FILE")]
    launch_file: PathBuf,

    /// Launch in debug mode and report the debugger endpoint
    #[arg(long)]
    debug: bool,

    /// Uninstall the app before installing it
    #[arg(long)]
    uninstall: bool,

    /// Print events as NDJSON instead of plain text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    meteor_core::logging::init()?;

    meteor::run(RunOptions {
        launch_file: args.launch_file,
        debug: args.debug,
        uninstall: args.uninstall,
        json: args.json,
    })
    .await
}
