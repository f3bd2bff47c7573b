//! Command handlers behind the CLI.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{Cli, Command, PayArgs, RecordArgs, RegisterArgs, SchedulerConfig};
use crate::error::PaymentError;
use crate::ledger::LedgerVariant;
use crate::registration::register_participants;
use crate::registry::{resolve_agreement, DeploymentRecord};
use crate::scheduler::RoundScheduler;
use crate::types::{Address, Outcome, RunReport};

/// Receipt polling interval used by commands that do not configure one.
const DEFAULT_RECEIPT_POLL: Duration = Duration::from_secs(1);

pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Pay(args) => pay(&cli, args).await.map(|_| ()),
        Command::Register(args) => register(&cli, args).await,
        Command::Record(args) => record(&cli.deployment_file, args).await,
    }
}

fn connect(rpc_url: Option<&str>, receipt_poll: Duration) -> Result<LedgerVariant> {
    let url = rpc_url.ok_or_else(|| {
        PaymentError::Configuration("no JSON-RPC endpoint: pass --rpc-url or set RPC_URL".into())
    })?;
    let ledger = LedgerVariant::json_rpc(url, receipt_poll)
        .map_err(|e| PaymentError::Configuration(e.to_string()))?;
    info!("Connected to {} ledger at {}", ledger.name(), url);
    Ok(ledger)
}

async fn agreement_for(cli: &Cli) -> Result<Address> {
    Ok(resolve_agreement(cli.agreement, &cli.deployment_file).await?)
}

pub async fn pay(cli: &Cli, args: &PayArgs) -> Result<RunReport> {
    let config = SchedulerConfig::from(args);
    config.validate()?;

    let ledger = connect(cli.rpc_url.as_deref(), DEFAULT_RECEIPT_POLL.min(config.poll_interval()))?;
    let agreement = agreement_for(cli).await?;

    let scheduler = RoundScheduler::new(ledger, agreement, config);
    let report = scheduler
        .pay(&args.participants.participants)
        .await
        .context("payment run aborted")?;

    log_summary(&report);
    Ok(report)
}

pub async fn register(cli: &Cli, args: &RegisterArgs) -> Result<()> {
    let ledger = connect(cli.rpc_url.as_deref(), DEFAULT_RECEIPT_POLL)?;
    let agreement = agreement_for(cli).await?;

    register_participants(
        &ledger,
        &agreement,
        &args.participants.participants,
        args.seed_unlimited_authorization,
        Duration::from_secs(args.confirmation_timeout_secs),
    )
    .await
    .context("registration aborted")?;
    Ok(())
}

pub async fn record(path: &Path, args: &RecordArgs) -> Result<()> {
    let mut record = DeploymentRecord::new(args.address, Utc::now());
    record.factory = args.factory;
    record.tx_hash = args.tx_hash.clone();
    record.args = args.args.iter().cloned().collect();
    record.save(path).await
}

fn log_summary(report: &RunReport) {
    let (mut confirmed, mut skipped, mut failed) = (0, 0, 0);
    for round in &report.rounds {
        confirmed += round.confirmed();
        skipped += round.skipped();
        failed += round.failed();
    }
    info!(
        "Run finished over {} round(s): confirmed={}, skipped={}, failed={}",
        report.rounds.len(),
        confirmed,
        skipped,
        failed
    );

    for round in &report.rounds {
        for attempt in &round.attempts {
            if let Outcome::Failed(e) = &attempt.outcome {
                warn!("  round {} / {}: {}", round.round.index, attempt.participant, e);
            }
        }
    }
}
