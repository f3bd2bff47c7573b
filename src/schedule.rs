//! One-shot fetch of the agreement's immutable schedule.

use tracing::info;

use crate::error::PaymentError;
use crate::traits::AgreementContract;
use crate::types::{Address, AgreementSchedule};

/// Read every schedule field concurrently and validate the result.
///
/// Any failed read aborts with `ScheduleUnavailable`; there is no partial
/// schedule.
pub async fn load_schedule<L>(ledger: &L, agreement: &Address) -> Result<AgreementSchedule, PaymentError>
where
    L: AgreementContract + ?Sized,
{
    let (
        start_time,
        round_duration,
        num_rounds,
        installment_size,
        protocol_reward_per_installment,
        max_auction_size,
        installment_asset,
        reward_asset,
    ) = tokio::try_join!(
        ledger.start_time(agreement),
        ledger.round_duration(agreement),
        ledger.num_rounds(agreement),
        ledger.installment_size(agreement),
        ledger.protocol_reward(agreement),
        ledger.max_auction_size(agreement),
        ledger.installment_asset(agreement),
        ledger.reward_asset(agreement),
    )
    .map_err(PaymentError::ScheduleUnavailable)?;

    let schedule = AgreementSchedule {
        start_time,
        round_duration,
        num_rounds,
        installment_size,
        protocol_reward_per_installment,
        max_auction_size,
        installment_asset,
        reward_asset,
    };
    validate_schedule(&schedule)?;

    info!(
        "Loaded schedule of {}: start_time={}, round_duration={}s, num_rounds={}, installment_size={}, reward={}, max_auction={}",
        agreement,
        schedule.start_time,
        schedule.round_duration,
        schedule.num_rounds,
        schedule.installment_size,
        schedule.protocol_reward_per_installment,
        schedule.max_auction_size
    );
    Ok(schedule)
}

/// Rejects schedules whose rounds would be empty or never end.
pub fn validate_schedule(schedule: &AgreementSchedule) -> Result<(), PaymentError> {
    if schedule.num_rounds == 0 {
        return Err(PaymentError::InvalidSchedule(
            "agreement has zero rounds".to_string(),
        ));
    }
    if schedule.round_duration == 0 {
        return Err(PaymentError::InvalidSchedule(
            "round duration is zero, every window would be empty".to_string(),
        ));
    }
    let last_deadline = schedule
        .round_duration
        .checked_mul(schedule.num_rounds)
        .and_then(|span| span.checked_add(schedule.start_time));
    if last_deadline.is_none() {
        return Err(PaymentError::InvalidSchedule(format!(
            "{} rounds of {}s starting at {} overflow the clock",
            schedule.num_rounds, schedule.round_duration, schedule.start_time
        )));
    }
    Ok(())
}
