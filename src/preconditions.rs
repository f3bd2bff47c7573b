//! Balance and authorization checks run before every deposit.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::{LedgerError, PaymentError};
use crate::traits::{AssetContract, TransactionTracker};
use crate::types::{Address, Amount, Participant, Receipt};

/// Fails with `InsufficientBalance` unless `participant` holds `amount` of `asset`.
pub async fn ensure_balance<L>(
    ledger: &L,
    participant: &Participant,
    asset: &Address,
    symbol: &str,
    amount: Amount,
) -> Result<(), PaymentError>
where
    L: AssetContract + ?Sized,
{
    let available = ledger.balance_of(asset, &participant.identity).await?;
    if available < amount {
        return Err(PaymentError::InsufficientBalance {
            asset: symbol.to_string(),
            required: amount,
            available,
        });
    }
    debug!(
        "{} holds {} {} (needs {})",
        participant.label, available, symbol, amount
    );
    Ok(())
}

/// Raises `spender`'s authorization to exactly `amount` when it is short.
///
/// Returns the approval receipt, or `None` when the existing authorization
/// already covers `amount` and nothing was submitted.
pub async fn ensure_authorization<L>(
    ledger: &L,
    participant: &Participant,
    asset: &Address,
    symbol: &str,
    spender: &Address,
    amount: Amount,
    confirmation_timeout: Duration,
) -> Result<Option<Receipt>, PaymentError>
where
    L: AssetContract + TransactionTracker + ?Sized,
{
    let current = ledger
        .allowance(asset, &participant.identity, spender)
        .await?;
    if current >= amount {
        return Ok(None);
    }

    info!(
        "Approving {} for {} (needed {}, allowance {})",
        symbol, participant.label, amount, current
    );
    let failed = |source: LedgerError| PaymentError::AuthorizationTransactionFailed {
        asset: symbol.to_string(),
        source,
    };
    let tx_hash = ledger
        .approve(asset, &participant.identity, spender, amount)
        .await
        .map_err(failed)?;
    info!("  approve tx submitted: {}", tx_hash);

    let receipt = ledger
        .wait_for_receipt(&tx_hash, confirmation_timeout)
        .await
        .map_err(failed)?;
    info!("  approve confirmed in block {}", receipt.block_number);
    Ok(Some(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MockLedger, SubmittedTx};

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn alice() -> Participant {
        Participant {
            label: "account_1".to_string(),
            identity: Address([0xa1; 20]),
            auction_size: 10,
        }
    }

    #[tokio::test]
    async fn short_balance_reports_required_and_available() {
        let ledger = MockLedger::new(Address([9; 20]), 0);
        let usdc = Address([1; 20]);
        ledger.set_balance(usdc, alice().identity, 40);

        let err = ensure_balance(&ledger, &alice(), &usdc, "USDC", 100)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PaymentError::InsufficientBalance {
                asset: "USDC".to_string(),
                required: 100,
                available: 40,
            }
        );
        assert!(ensure_balance(&ledger, &alice(), &usdc, "USDC", 40).await.is_ok());
    }

    #[tokio::test]
    async fn sufficient_authorization_submits_nothing() {
        let agreement = Address([9; 20]);
        let ledger = MockLedger::new(agreement, 0);
        let usdc = Address([1; 20]);
        ledger.set_allowance(usdc, alice().identity, agreement, 500);

        let receipt =
            ensure_authorization(&ledger, &alice(), &usdc, "USDC", &agreement, 100, TIMEOUT)
                .await
                .unwrap();
        assert!(receipt.is_none());
        assert!(ledger.submitted().is_empty());
        assert_eq!(ledger.allowance_of(usdc, alice().identity, agreement), 500);
    }

    #[tokio::test]
    async fn short_authorization_is_raised_to_exact_amount_once() {
        let agreement = Address([9; 20]);
        let ledger = MockLedger::new(agreement, 0);
        let usdc = Address([1; 20]);
        ledger.set_allowance(usdc, alice().identity, agreement, 30);

        let receipt =
            ensure_authorization(&ledger, &alice(), &usdc, "USDC", &agreement, 100, TIMEOUT)
                .await
                .unwrap();
        assert!(receipt.is_some());
        assert_eq!(
            ledger.submitted(),
            vec![SubmittedTx::Approve {
                asset: usdc,
                from: alice().identity,
                spender: agreement,
                amount: 100,
            }]
        );
        assert_eq!(ledger.allowance_of(usdc, alice().identity, agreement), 100);
    }

    #[tokio::test]
    async fn failed_approval_is_an_authorization_failure() {
        let agreement = Address([9; 20]);
        let ledger = MockLedger::new(agreement, 0);
        let usdc = Address([1; 20]);
        ledger.fail_approvals_from(alice().identity);

        let err = ensure_authorization(&ledger, &alice(), &usdc, "USDC", &agreement, 100, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::AuthorizationTransactionFailed { ref asset, .. } if asset == "USDC"
        ));
    }
}
