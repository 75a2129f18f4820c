//! qdials: Qpid Dispatch Idle Auto-Link Scrubber.
//! Polls a router's autoLink configuration and removes inbound autoLinks whose
//! address has had no subscribers for two consecutive polls.

use clap::Parser;

mod cli;
mod poll_loop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Exits non-zero on invalid arguments (e.g. --router with --edge).
    let args = cli::Cli::parse();

    let filter = std::env::var("QDIALS_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| args.default_log_filter().to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    tracing::info!("qdials {} starting", env!("CARGO_PKG_VERSION"));

    poll_loop::run_daemon(&args).await
}
