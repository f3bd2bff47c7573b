use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::types::Address;

pub const DEFAULT_DEPLOYMENT_FILE: &str = "deployments/SavingCircle.json";

/// Command-line interface. Every flag also reads from the environment.
#[derive(Debug, Parser)]
#[command(name = "roundpay", version, about = "Pays saving circle installments round by round")]
pub struct Cli {
    /// JSON-RPC endpoint of a node that manages the participant accounts.
    #[arg(long, env = "RPC_URL", global = true)]
    pub rpc_url: Option<String>,

    /// Saving circle address; falls back to the deployment file.
    #[arg(long, env = "AGREEMENT_ADDRESS", global = true)]
    pub agreement: Option<Address>,

    /// Deployment record written when the circle was created.
    #[arg(long, env = "DEPLOYMENT_FILE", default_value = DEFAULT_DEPLOYMENT_FILE, global = true)]
    pub deployment_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pay installments for every participant, round after round.
    Pay(PayArgs),
    /// Register every participant in the circle.
    Register(RegisterArgs),
    /// Write the deployment record for an already deployed circle.
    Record(RecordArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ParticipantArgs {
    /// Participant as `label=0xaddress`; repeat or comma-separate.
    #[arg(
        long = "participant",
        env = "PARTICIPANTS",
        value_delimiter = ',',
        value_parser = parse_participant,
        required = true
    )]
    pub participants: Vec<(String, Address)>,
}

#[derive(Debug, Clone, Args)]
pub struct PayArgs {
    #[command(flatten)]
    pub participants: ParticipantArgs,

    /// Pay only this round.
    #[arg(long, env = "ROUND", conflicts_with = "current_round")]
    pub round: Option<u64>,

    /// Pay only the round the circle currently reports.
    #[arg(long)]
    pub current_round: bool,

    /// Default auction size; otherwise the protocol reward (or 1).
    #[arg(long, env = "AUCTION_SIZE")]
    pub auction_size: Option<String>,

    /// Per-participant auction size as `label=amount`.
    #[arg(
        long = "auction-size-override",
        env = "AUCTION_SIZE_OVERRIDES",
        value_delimiter = ',',
        value_parser = parse_key_value
    )]
    pub auction_size_overrides: Vec<(String, String)>,

    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 5)]
    pub poll_interval_secs: u64,

    #[arg(long, env = "CONFIRMATION_TIMEOUT_SECS", default_value_t = 120)]
    pub confirmation_timeout_secs: u64,

    /// Consecutive ledger clock failures tolerated while waiting for a round.
    #[arg(long, default_value_t = 3)]
    pub clock_retry_limit: u32,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    #[command(flatten)]
    pub participants: ParticipantArgs,

    /// Also approve an unlimited amount of both circle assets.
    #[arg(long)]
    pub seed_unlimited_authorization: bool,

    #[arg(long, env = "CONFIRMATION_TIMEOUT_SECS", default_value_t = 120)]
    pub confirmation_timeout_secs: u64,
}

#[derive(Debug, Clone, Args)]
pub struct RecordArgs {
    /// Address of the deployed circle.
    pub address: Address,

    #[arg(long)]
    pub factory: Option<Address>,

    #[arg(long)]
    pub tx_hash: Option<String>,

    /// Extra constructor argument as `name=value`.
    #[arg(long = "arg", value_parser = parse_key_value)]
    pub args: Vec<(String, String)>,
}

/// Which rounds a run pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RoundSelection {
    /// Every round of the schedule, in order.
    #[default]
    All,
    /// A single explicit round.
    Only(u64),
    /// The round the agreement reports as current.
    Current,
}

/// Scheduler configuration, built once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on a single sleep while waiting for a round to open.
    pub poll_interval_secs: u64,

    /// How long to wait for any transaction to be mined.
    pub confirmation_timeout_secs: u64,

    /// Consecutive clock failures tolerated in the round-start wait.
    pub clock_retry_limit: u32,

    /// Explicit default auction size, validated as a positive integer.
    pub default_auction_size: Option<String>,

    /// Per-participant auction sizes keyed by label.
    pub auction_size_overrides: HashMap<String, String>,

    pub rounds: RoundSelection,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            poll_interval_secs: 5,
            confirmation_timeout_secs: 120,
            clock_retry_limit: 3,
            default_auction_size: None,
            auction_size_overrides: HashMap::new(),
            rounds: RoundSelection::All,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.poll_interval_secs == 0 {
            return Err(PaymentError::Configuration(
                "poll interval must be at least one second".to_string(),
            ));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(PaymentError::Configuration(
                "confirmation timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&PayArgs> for SchedulerConfig {
    fn from(args: &PayArgs) -> Self {
        let rounds = match (args.round, args.current_round) {
            (Some(round), _) => RoundSelection::Only(round),
            (None, true) => RoundSelection::Current,
            (None, false) => RoundSelection::All,
        };

        SchedulerConfig {
            poll_interval_secs: args.poll_interval_secs,
            confirmation_timeout_secs: args.confirmation_timeout_secs,
            clock_retry_limit: args.clock_retry_limit,
            default_auction_size: args.auction_size.clone(),
            auction_size_overrides: args.auction_size_overrides.iter().cloned().collect(),
            rounds,
        }
    }
}

fn split_pair(raw: &str) -> Result<(&str, &str), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `name=value`, got \"{}\"", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty name in \"{}\"", raw));
    }
    Ok((key, value.trim()))
}

pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = split_pair(raw)?;
    Ok((key.to_string(), value.to_string()))
}

pub fn parse_participant(raw: &str) -> Result<(String, Address), String> {
    let (label, address) = split_pair(raw)?;
    let identity = address.parse::<Address>().map_err(|e| e.to_string())?;
    Ok((label.to_string(), identity))
}
