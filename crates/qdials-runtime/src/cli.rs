//! CLI definition using clap derive.

use std::time::Duration;

use clap::Parser;
use qdials_mgmt::MgmtTarget;

use crate::poll_loop::ScrubberConfig;

#[derive(Parser, Debug)]
#[command(
    name = "qdials",
    version,
    about = "Qpid Dispatch Idle Auto-Link Scrubber",
    long_about = "Periodically removes inbound autoLinks whose address has had no \
                  subscribers for two consecutive polls."
)]
pub struct Cli {
    /// The address of the Qpid Dispatch Router (qdrouterd)
    #[arg(long, env = "QDIALS_BUS", default_value = "localhost:5672")]
    pub bus: String,

    /// Polling interval in seconds
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll: u64,

    /// Fail if the router is unresponsive for timeout seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Remote router id [Advanced]
    #[arg(long, conflicts_with = "edge")]
    pub router: Option<String>,

    /// Remote edge router id [Advanced]
    #[arg(long)]
    pub edge: Option<String>,

    /// Also delete the outbound autoLink sharing an expired inbound autoLink's address
    #[arg(long)]
    pub remove_outlinks: bool,

    /// Enable DEBUG logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn target(&self) -> MgmtTarget {
        // clap rejects --router together with --edge
        MgmtTarget::from_ids(self.router.clone(), self.edge.clone()).unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn scrubber_config(&self) -> ScrubberConfig {
        ScrubberConfig {
            poll_interval: Duration::from_secs(self.poll),
            remove_outlinks: self.remove_outlinks,
        }
    }

    /// Default tracing filter when neither `QDIALS_LOG` nor `RUST_LOG` is set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "warn" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("qdials").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]).expect("defaults parse");
        assert_eq!(cli.poll, 60);
        assert_eq!(cli.timeout(), Duration::from_secs(30));
        assert_eq!(cli.target(), MgmtTarget::Local);
        assert!(!cli.remove_outlinks);
        assert_eq!(cli.default_log_filter(), "warn");
        let config = cli.scrubber_config();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert!(!config.remove_outlinks);
    }

    #[test]
    fn router_target() {
        let cli = parse(&["--router", "R2", "--remove-outlinks", "--debug"]).expect("parse");
        assert_eq!(cli.target(), MgmtTarget::Router("R2".into()));
        assert!(cli.scrubber_config().remove_outlinks);
        assert_eq!(cli.default_log_filter(), "debug");
    }

    #[test]
    fn edge_target() {
        let cli = parse(&["--edge", "E7", "--poll", "5", "--timeout", "2"]).expect("parse");
        assert_eq!(cli.target(), MgmtTarget::Edge("E7".into()));
        assert_eq!(cli.scrubber_config().poll_interval, Duration::from_secs(5));
        assert_eq!(cli.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn router_and_edge_conflict() {
        let err = parse(&["--router", "R", "--edge", "E"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn zero_poll_rejected() {
        assert!(parse(&["--poll", "0"]).is_err());
    }
}
