// src/bin/conveyor-server.rs

//! Process entry point: load config, init tracing, run the HTTP
//! surface and queue workers until the process is killed.

use clap::Parser;
use conveyor::config::Config;
use conveyor::{server, telemetry};

#[derive(Parser)]
#[command(name = "conveyor-server")]
#[command(about = "Runs the conveyor HTTP API and queue workers")]
struct Args {
    /// Path to a conveyor.toml config file; falls back to built-in defaults
    /// layered with CONVEYOR_* environment variables.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    server::run_server(config).await
}
