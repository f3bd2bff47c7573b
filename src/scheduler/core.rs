//! Core RoundScheduler struct and run preparation - no round loop.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auction;
use crate::config::{RoundSelection, SchedulerConfig};
use crate::error::PaymentError;
use crate::ledger::{fetch_metadata, LedgerVariant};
use crate::schedule::load_schedule;
use crate::traits::AgreementContract;
use crate::types::{Address, AgreementSchedule, AssetMetadata, Participant, Round};

/// Read-only inputs shared by every payment executor of a run.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    pub agreement: Address,
    pub schedule: AgreementSchedule,
    pub installment: AssetMetadata,
    pub reward: AssetMetadata,
    pub confirmation_timeout: Duration,
}

/// Drives payments for one agreement, round after round.
pub struct RoundScheduler {
    /// Ledger backend, shared with every payment task.
    pub ledger: Arc<LedgerVariant>,

    /// Saving circle being paid into.
    pub agreement: Address,

    pub config: SchedulerConfig,
}

impl RoundScheduler {
    pub fn new(ledger: LedgerVariant, agreement: Address, config: SchedulerConfig) -> Self {
        Self {
            ledger: Arc::new(ledger),
            agreement,
            config,
        }
    }

    /// Load the schedule and resolve every participant's auction size.
    ///
    /// All fatal validation happens here, before any round starts.
    pub async fn prepare(
        &self,
        identities: &[(String, Address)],
    ) -> Result<(AgreementSchedule, Vec<Participant>), PaymentError> {
        self.config.validate()?;

        info!(
            "Using agreement {} via {} ledger",
            self.agreement,
            self.ledger.name()
        );
        let schedule = load_schedule(self.ledger.as_ref(), &self.agreement).await?;
        let participants = auction::resolve_participants(
            identities,
            &schedule,
            self.config.default_auction_size.as_deref(),
            &self.config.auction_size_overrides,
        )?;
        Ok((schedule, participants))
    }

    /// Rounds this run will pay, in order.
    pub async fn select_rounds(
        &self,
        schedule: &AgreementSchedule,
    ) -> Result<Vec<Round>, PaymentError> {
        let only = |index: u64| {
            schedule.round(index).map(|r| vec![r]).ok_or_else(|| {
                PaymentError::Configuration(format!(
                    "round {} is outside the schedule ({} rounds)",
                    index, schedule.num_rounds
                ))
            })
        };

        match self.config.rounds {
            RoundSelection::All => Ok(schedule.rounds().collect()),
            RoundSelection::Only(index) => only(index),
            RoundSelection::Current => {
                let index = self
                    .ledger
                    .current_round(&self.agreement)
                    .await
                    .map_err(PaymentError::ScheduleUnavailable)?;
                info!("No round given; agreement reports current round {}", index);
                only(index)
            }
        }
    }

    /// Shared context for the run, including best-effort asset metadata.
    pub async fn payment_context(&self, schedule: &AgreementSchedule) -> PaymentContext {
        let (installment, reward) = tokio::join!(
            fetch_metadata(
                self.ledger.as_ref(),
                &schedule.installment_asset,
                "installment token"
            ),
            fetch_metadata(self.ledger.as_ref(), &schedule.reward_asset, "protocol token"),
        );

        PaymentContext {
            agreement: self.agreement,
            schedule: schedule.clone(),
            installment,
            reward,
            confirmation_timeout: self.config.confirmation_timeout(),
        }
    }
}
