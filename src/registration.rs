//! One-shot participant registration.

use std::time::Duration;

use tracing::info;

use crate::error::{LedgerError, PaymentError};
use crate::traits::Ledger;
use crate::types::{Address, Amount, Receipt};

/// Authorization granted when seeding, so later rounds never need to approve.
///
/// Encoded on the wire as the uint256 maximum.
pub const UNLIMITED_AUTHORIZATION: Amount = Amount::MAX;

/// Registers every participant in order; the first failure stops the batch.
///
/// With `seed_authorization`, each participant also approves
/// `UNLIMITED_AUTHORIZATION` of both circle assets to the agreement right
/// after its registration is confirmed.
pub async fn register_participants<L>(
    ledger: &L,
    agreement: &Address,
    identities: &[(String, Address)],
    seed_authorization: bool,
    confirmation_timeout: Duration,
) -> Result<Vec<Receipt>, PaymentError>
where
    L: Ledger + ?Sized,
{
    let assets = if seed_authorization {
        let (installment, reward) = tokio::try_join!(
            ledger.installment_asset(agreement),
            ledger.reward_asset(agreement),
        )
        .map_err(PaymentError::ScheduleUnavailable)?;
        vec![installment, reward]
    } else {
        Vec::new()
    };

    let mut receipts = Vec::new();
    for (label, identity) in identities {
        info!("Registering {} ({})", label, identity);
        let tx_hash = ledger.register(agreement, identity).await?;
        let receipt = ledger
            .wait_for_receipt(&tx_hash, confirmation_timeout)
            .await?;
        info!("  {} registered in block {}", label, receipt.block_number);
        receipts.push(receipt);

        for asset in &assets {
            let failed = |source: LedgerError| PaymentError::AuthorizationTransactionFailed {
                asset: asset.to_string(),
                source,
            };
            let tx_hash = ledger
                .approve(asset, identity, agreement, UNLIMITED_AUTHORIZATION)
                .await
                .map_err(failed)?;
            let receipt = ledger
                .wait_for_receipt(&tx_hash, confirmation_timeout)
                .await
                .map_err(failed)?;
            info!("  {} authorized unlimited {} for {}", label, asset, agreement);
            receipts.push(receipt);
        }
    }

    info!("Registered {} participant(s)", identities.len());
    Ok(receipts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MockLedger, SubmittedTx};
    use crate::types::AgreementSchedule;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn agreement() -> Address {
        Address([0xc1; 20])
    }

    fn ledger() -> MockLedger {
        MockLedger::new(agreement(), 1_000).with_schedule(AgreementSchedule {
            start_time: 1_000,
            round_duration: 60,
            num_rounds: 3,
            installment_size: 100,
            protocol_reward_per_installment: 10,
            max_auction_size: 1_000,
            installment_asset: Address([0x01; 20]),
            reward_asset: Address([0x02; 20]),
        })
    }

    fn identities() -> Vec<(String, Address)> {
        vec![
            ("account_1".to_string(), Address([0xa1; 20])),
            ("account_2".to_string(), Address([0xa2; 20])),
        ]
    }

    #[tokio::test]
    async fn test_registers_in_order() -> anyhow::Result<()> {
        let ledger = ledger();

        let receipts =
            register_participants(&ledger, &agreement(), &identities(), false, TIMEOUT).await?;

        assert_eq!(receipts.len(), 2);
        assert_eq!(ledger.registered(), vec![Address([0xa1; 20]), Address([0xa2; 20])]);
        Ok(())
    }

    #[tokio::test]
    async fn test_seeds_unlimited_authorization_for_both_assets() -> anyhow::Result<()> {
        let ledger = ledger();

        register_participants(&ledger, &agreement(), &identities()[..1], true, TIMEOUT).await?;

        let alice = Address([0xa1; 20]);
        assert_eq!(
            ledger.submitted(),
            vec![
                SubmittedTx::Register { from: alice },
                SubmittedTx::Approve {
                    asset: Address([0x01; 20]),
                    from: alice,
                    spender: agreement(),
                    amount: UNLIMITED_AUTHORIZATION,
                },
                SubmittedTx::Approve {
                    asset: Address([0x02; 20]),
                    from: alice,
                    spender: agreement(),
                    amount: UNLIMITED_AUTHORIZATION,
                },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_batch() {
        let ledger = ledger();
        let mut identities = identities();
        let repeated = identities[0].clone();
        identities.insert(1, repeated);

        let err = register_participants(&ledger, &agreement(), &identities, false, TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Ledger(LedgerError::Reverted(_))));
        assert_eq!(ledger.registered(), vec![Address([0xa1; 20])]);
    }
}
