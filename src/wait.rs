//! Waiting on the ledger clock instead of the local one.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PaymentError;
use crate::traits::LedgerClock;

/// Poll `clock` until it reports `target` or later and return that time.
///
/// Sleeps `min(remaining, poll_interval)` between reads, so the loop adapts
/// to early or late blocks. Up to `retry_limit` consecutive clock failures
/// are re-polled before giving up with `ClockUnavailable`. Dropping the
/// future cancels the wait.
pub async fn wait_for_ledger_time<C>(
    clock: &C,
    target: u64,
    poll_interval: Duration,
    retry_limit: u32,
) -> Result<u64, PaymentError>
where
    C: LedgerClock + ?Sized,
{
    let mut failures = 0u32;
    loop {
        match clock.now().await {
            Ok(now) if now >= target => return Ok(now),
            Ok(now) => {
                failures = 0;
                let remaining = Duration::from_secs(target - now);
                let nap = remaining.min(poll_interval);
                debug!(
                    "ledger time {} is {}s before {}, sleeping {:?}",
                    now,
                    target - now,
                    target,
                    nap
                );
                tokio::time::sleep(nap).await;
            }
            Err(e) => {
                failures += 1;
                if failures > retry_limit {
                    return Err(PaymentError::ClockUnavailable(e));
                }
                warn!(
                    "ledger clock read failed ({}/{}): {}",
                    failures, retry_limit, e
                );
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
