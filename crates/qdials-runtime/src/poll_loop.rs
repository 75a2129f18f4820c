//! Poll loop: connect → query autoLinks → read address usage → debounce → delete.
//!
//! Each cycle runs on a blocking thread with a fresh management connection
//! that is released on every exit path. Connect and query failures abort the
//! cycle and reset the debounce baseline, so an unreachable router can never
//! contribute an "idle" vote.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use qdials_core::{
    ADDRESS_TYPE, AUTOLINK_ATTRIBUTES, AUTOLINK_TYPE, AddressUsage, CandidateKey,
    EligibilityTracker, LinkRecord, OutboundIndex,
};
use qdials_mgmt::{Connector, JsonLineConnector, ManagementChannel, MgmtClient};

use crate::cli::Cli;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubberConfig {
    pub poll_interval: Duration,
    /// Delete the outbound autoLink paired with each expired inbound one.
    pub remove_outlinks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// Connect or query failed; the debounce baseline was reset.
    Aborted(String),
    /// Shutdown was requested mid-cycle.
    Cancelled,
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    /// autoLink rows returned by the query.
    pub records: usize,
    /// Rows that failed validation.
    pub skipped: usize,
    /// Inbound links observed idle this cycle.
    pub candidates: usize,
    /// Inbound links idle this cycle and the previous one.
    pub confirmed: usize,
    pub deleted_inbound: usize,
    pub deleted_outbound: usize,
    pub delete_failures: usize,
}

impl CycleReport {
    fn new(cycle: u64) -> Self {
        Self {
            cycle,
            started_at: Utc::now(),
            outcome: CycleOutcome::Completed,
            records: 0,
            skipped: 0,
            candidates: 0,
            confirmed: 0,
            deleted_inbound: 0,
            deleted_outbound: 0,
            delete_failures: 0,
        }
    }

    fn log(&self) {
        match &self.outcome {
            CycleOutcome::Completed => tracing::info!(
                cycle = self.cycle,
                started_at = %self.started_at,
                records = self.records,
                skipped = self.skipped,
                candidates = self.candidates,
                confirmed = self.confirmed,
                deleted_inbound = self.deleted_inbound,
                deleted_outbound = self.deleted_outbound,
                delete_failures = self.delete_failures,
                "poll cycle completed"
            ),
            CycleOutcome::Aborted(reason) => {
                tracing::warn!(cycle = self.cycle, "poll cycle aborted: {reason}")
            }
            CycleOutcome::Cancelled => tracing::info!(cycle = self.cycle, "poll cycle cancelled"),
        }
    }
}

enum CycleStop {
    Aborted(String),
    Cancelled,
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), CycleStop> {
    if cancel.is_cancelled() {
        Err(CycleStop::Cancelled)
    } else {
        Ok(())
    }
}

/// Owns the debounce baseline; runs one cycle at a time.
pub struct Scrubber<C: Connector> {
    connector: C,
    config: ScrubberConfig,
    tracker: EligibilityTracker,
    cycles: u64,
}

impl<C: Connector> Scrubber<C> {
    pub fn new(connector: C, config: ScrubberConfig) -> Self {
        Self {
            connector,
            config,
            tracker: EligibilityTracker::new(),
            cycles: 0,
        }
    }

    pub fn tracker(&self) -> &EligibilityTracker {
        &self.tracker
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one blocking poll cycle.
    pub fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleReport {
        self.cycles += 1;
        let span = tracing::info_span!("poll_cycle", cycle = self.cycles);
        let _enter = span.enter();

        let mut report = CycleReport::new(self.cycles);
        report.outcome = match self.scrub(cancel, &mut report) {
            Ok(()) => CycleOutcome::Completed,
            Err(CycleStop::Cancelled) => CycleOutcome::Cancelled,
            Err(CycleStop::Aborted(reason)) => {
                self.tracker.reset();
                CycleOutcome::Aborted(reason)
            }
        };
        report
    }

    fn scrub(
        &mut self,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> Result<(), CycleStop> {
        checkpoint(cancel)?;
        let channel = self.connector.connect().map_err(|e| {
            tracing::error!("connection to router failed: {e}. Retrying..");
            CycleStop::Aborted(format!("connect: {e}"))
        })?;
        // Dropping the client on any early return closes the connection.
        let mut client = MgmtClient::new(channel);

        checkpoint(cancel)?;
        let rows = client
            .query(AUTOLINK_TYPE, &AUTOLINK_ATTRIBUTES)
            .map_err(|e| {
                tracing::error!("query for all autoLink records failed");
                CycleStop::Aborted(format!("query: {e}"))
            })?;
        report.records = rows.len();

        let mut outbound = OutboundIndex::new();
        let mut idle: HashSet<CandidateKey> = HashSet::new();

        for attrs in rows {
            let link = match LinkRecord::from_attributes(&attrs) {
                Ok(link) => link,
                Err(e) => {
                    tracing::warn!("skipping autoLink row {attrs:?}: {e}");
                    report.skipped += 1;
                    continue;
                }
            };

            if !link.is_inbound() {
                outbound.insert(&link);
                continue;
            }

            checkpoint(cancel)?;
            let Some(usage) = address_usage(&mut client, &link) else {
                continue;
            };
            if usage.is_idle() {
                tracing::info!(
                    "autoLink {} has no subscribers - monitoring it for deletion",
                    link.address
                );
                idle.insert(CandidateKey::new(link.identity, link.address));
            }
        }
        report.candidates = idle.len();

        let confirmed = self.tracker.advance(idle);
        report.confirmed = confirmed.len();
        tracing::info!("found {} autoLinks ready for deletion", confirmed.len());

        for key in confirmed {
            checkpoint(cancel)?;
            tracing::info!(
                "deleting inbound autoLink record id={} address={}",
                key.identity,
                key.address
            );
            match client.delete(AUTOLINK_TYPE, &key.identity) {
                Ok(()) => report.deleted_inbound += 1,
                Err(_) => report.delete_failures += 1,
            }

            if !self.config.remove_outlinks {
                continue;
            }
            if let Some(out_identity) = outbound.get(&key.address) {
                checkpoint(cancel)?;
                tracing::info!(
                    "deleting outbound autoLink record id={out_identity} address={}",
                    key.address
                );
                match client.delete(AUTOLINK_TYPE, out_identity) {
                    Ok(()) => report.deleted_outbound += 1,
                    Err(_) => report.delete_failures += 1,
                }
            }
        }

        client.close();
        Ok(())
    }
}

/// Live usage of the link's queue address, or `None` when the router has no
/// such address (or the read failed). `None` never counts as idle.
fn address_usage<Ch: ManagementChannel>(
    client: &mut MgmtClient<Ch>,
    link: &LinkRecord,
) -> Option<AddressUsage> {
    let queue_key = link.queue_key();
    let attrs = match client.read(ADDRESS_TYPE, &queue_key) {
        Ok(attrs) => attrs,
        Err(_) => {
            tracing::debug!(
                "no active address for autoLink address {} ({queue_key})",
                link.address
            );
            return None;
        }
    };
    AddressUsage::from_attributes(&attrs)
        .inspect_err(|e| tracing::warn!("unusable usage stats for {queue_key}: {e}"))
        .ok()
}

/// Sleep, run a cycle, repeat until `cancel` fires. Returns the scrubber so
/// callers can inspect its final state.
pub async fn run_poll_loop<C>(
    mut scrubber: Scrubber<C>,
    cancel: CancellationToken,
) -> anyhow::Result<Scrubber<C>>
where
    C: Connector + 'static,
{
    let interval = scrubber.config.poll_interval;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        let token = cancel.clone();
        let (returned, report) = tokio::task::spawn_blocking(move || {
            let report = scrubber.run_cycle(&token);
            (scrubber, report)
        })
        .await?;
        scrubber = returned;
        report.log();
        tracing::debug!(
            "{} autoLinks idle after cycle {}",
            scrubber.tracker().previous().len(),
            report.cycle
        );

        if cancel.is_cancelled() {
            break;
        }
    }

    tracing::info!("poll loop stopped after {} cycles", scrubber.cycles());
    Ok(scrubber)
}

/// Run the scrubber until ctrl-c or SIGTERM.
pub async fn run_daemon(cli: &Cli) -> anyhow::Result<()> {
    let connector = JsonLineConnector::new(cli.bus.clone(), cli.target(), cli.timeout());
    tracing::info!(
        "scrubbing autoLinks on {} via {} every {}s",
        connector.bus(),
        connector.target(),
        cli.poll
    );
    let scrubber = Scrubber::new(connector, cli.scrubber_config());

    let cancel = CancellationToken::new();
    let mut poll_handle = tokio::spawn(run_poll_loop(scrubber, cancel.clone()));

    // Wait for shutdown signal (ctrl-c or SIGTERM)
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                },
                Err(e) => {
                    tracing::warn!("cannot register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                    tracing::info!("received ctrl-c, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    tokio::select! {
        () = shutdown => {
            cancel.cancel();
            // The in-flight management call, if any, returns within --timeout.
            poll_handle.await??;
        }
        res = &mut poll_handle => {
            tracing::warn!("poll loop exited unexpectedly");
            res??;
        }
    }

    tracing::info!("qdials stopped");
    Ok(())
}
