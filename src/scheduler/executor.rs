//! Per-(round, participant) payment state machine.
//!
//! Start -> already paid? -> deadline passed? -> preconditions for both
//! assets -> deposit -> confirmation. Every step re-reads the ledger; nothing
//! is remembered between invocations.

use tracing::{info, warn};

use super::core::PaymentContext;
use crate::error::{LedgerError, PaymentError};
use crate::preconditions::{ensure_authorization, ensure_balance};
use crate::traits::Ledger;
use crate::types::{Outcome, Participant, Round};

/// Run the state machine once and report its terminal outcome.
///
/// Never retries and never panics on ledger errors: any failure becomes
/// `Outcome::Failed` for this pair only.
pub async fn pay_round_once<L>(
    ledger: &L,
    ctx: &PaymentContext,
    round: Round,
    participant: &Participant,
) -> Outcome
where
    L: Ledger + ?Sized,
{
    match try_pay(ledger, ctx, round, participant).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(
                "Round {} payment for {} failed: {}",
                round.index, participant.label, e
            );
            Outcome::Failed(e)
        }
    }
}

async fn try_pay<L>(
    ledger: &L,
    ctx: &PaymentContext,
    round: Round,
    participant: &Participant,
) -> Result<Outcome, PaymentError>
where
    L: Ledger + ?Sized,
{
    let contributed = ledger
        .contribution(&ctx.agreement, round.index, &participant.identity)
        .await?;
    if contributed > 0 {
        info!(
            "{} already paid round {} ({} contributed), skipping",
            participant.label, round.index, contributed
        );
        return Ok(Outcome::SkippedAlreadyPaid { contributed });
    }

    let now = ledger.now().await?;
    if now >= round.deadline {
        warn!(
            "{} missed round {}: ledger time {} is past deadline {}",
            participant.label, round.index, now, round.deadline
        );
        return Ok(Outcome::SkippedDeadlineMissed {
            now,
            deadline: round.deadline,
        });
    }

    info!(
        "Paying round {} for {} ({}) with installment={} {}, auction_size={} {}",
        round.index,
        participant.label,
        participant.identity,
        ctx.schedule.installment_size,
        ctx.installment.symbol,
        participant.auction_size,
        ctx.reward.symbol
    );

    let requirements = [
        (
            &ctx.schedule.installment_asset,
            ctx.installment.symbol.as_str(),
            ctx.schedule.installment_size,
        ),
        (
            &ctx.schedule.reward_asset,
            ctx.reward.symbol.as_str(),
            participant.auction_size,
        ),
    ];
    for (asset, symbol, amount) in requirements {
        ensure_balance(ledger, participant, asset, symbol, amount).await?;
        ensure_authorization(
            ledger,
            participant,
            asset,
            symbol,
            &ctx.agreement,
            amount,
            ctx.confirmation_timeout,
        )
        .await?;
    }

    let tx_hash = ledger
        .deposit_round(
            &ctx.agreement,
            &participant.identity,
            round.index,
            participant.auction_size,
        )
        .await
        .map_err(PaymentError::SubmissionRejected)?;
    info!("  deposit tx submitted: {}", tx_hash);

    let receipt = ledger
        .wait_for_receipt(&tx_hash, ctx.confirmation_timeout)
        .await
        .map_err(|e| match e {
            LedgerError::Timeout { tx, waited_secs } => {
                PaymentError::ConfirmationTimeout { tx, waited_secs }
            }
            LedgerError::Reverted(_) => PaymentError::SubmissionRejected(e),
            other => PaymentError::Ledger(other),
        })?;
    info!(
        "  deposit of {} for round {} confirmed in block {}",
        participant.label, round.index, receipt.block_number
    );

    Ok(Outcome::Confirmed(receipt))
}
