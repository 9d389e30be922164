mod cli;
mod engine;
mod model;
mod notify;
mod orchestrator;
mod parse;
mod report;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

// One thread: every command and the email are awaited strictly in sequence.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    cli::run(args).await
}
