use std::time::Duration;

use async_trait::async_trait;

use super::mock::MockLedger;
use super::rpc::JsonRpcLedger;
use crate::error::LedgerError;
use crate::traits::{AgreementContract, AssetContract, LedgerClock, TransactionTracker};
use crate::types::{Address, Amount, Receipt, TxHash};

/// Enum representing all ledger backends.
pub enum LedgerVariant {
    JsonRpc(JsonRpcLedger),
    Mock(MockLedger),
}

impl LedgerVariant {
    /// Connect to a JSON-RPC node at `endpoint`.
    pub fn json_rpc(endpoint: &str, receipt_poll_interval: Duration) -> Result<Self, LedgerError> {
        Ok(LedgerVariant::JsonRpc(
            JsonRpcLedger::new(endpoint)?.with_receipt_poll_interval(receipt_poll_interval),
        ))
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerVariant::JsonRpc(_) => "json-rpc",
            LedgerVariant::Mock(_) => "mock",
        }
    }
}

#[async_trait]
impl LedgerClock for LedgerVariant {
    async fn now(&self) -> Result<u64, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.now().await,
            LedgerVariant::Mock(inner) => inner.now().await,
        }
    }
}

#[async_trait]
impl TransactionTracker for LedgerVariant {
    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Receipt, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.wait_for_receipt(tx_hash, timeout).await,
            LedgerVariant::Mock(inner) => inner.wait_for_receipt(tx_hash, timeout).await,
        }
    }
}

#[async_trait]
impl AgreementContract for LedgerVariant {
    async fn current_round(&self, agreement: &Address) -> Result<u64, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.current_round(agreement).await,
            LedgerVariant::Mock(inner) => inner.current_round(agreement).await,
        }
    }

    async fn contribution(
        &self,
        agreement: &Address,
        round: u64,
        participant: &Address,
    ) -> Result<Amount, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.contribution(agreement, round, participant).await,
            LedgerVariant::Mock(inner) => inner.contribution(agreement, round, participant).await,
        }
    }

    async fn start_time(&self, agreement: &Address) -> Result<u64, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.start_time(agreement).await,
            LedgerVariant::Mock(inner) => inner.start_time(agreement).await,
        }
    }

    async fn round_duration(&self, agreement: &Address) -> Result<u64, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.round_duration(agreement).await,
            LedgerVariant::Mock(inner) => inner.round_duration(agreement).await,
        }
    }

    async fn num_rounds(&self, agreement: &Address) -> Result<u64, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.num_rounds(agreement).await,
            LedgerVariant::Mock(inner) => inner.num_rounds(agreement).await,
        }
    }

    async fn installment_size(&self, agreement: &Address) -> Result<Amount, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.installment_size(agreement).await,
            LedgerVariant::Mock(inner) => inner.installment_size(agreement).await,
        }
    }

    async fn protocol_reward(&self, agreement: &Address) -> Result<Amount, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.protocol_reward(agreement).await,
            LedgerVariant::Mock(inner) => inner.protocol_reward(agreement).await,
        }
    }

    async fn max_auction_size(&self, agreement: &Address) -> Result<Amount, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.max_auction_size(agreement).await,
            LedgerVariant::Mock(inner) => inner.max_auction_size(agreement).await,
        }
    }

    async fn installment_asset(&self, agreement: &Address) -> Result<Address, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.installment_asset(agreement).await,
            LedgerVariant::Mock(inner) => inner.installment_asset(agreement).await,
        }
    }

    async fn reward_asset(&self, agreement: &Address) -> Result<Address, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.reward_asset(agreement).await,
            LedgerVariant::Mock(inner) => inner.reward_asset(agreement).await,
        }
    }

    async fn deposit_round(
        &self,
        agreement: &Address,
        from: &Address,
        round: u64,
        auction_size: Amount,
    ) -> Result<TxHash, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => {
                inner.deposit_round(agreement, from, round, auction_size).await
            }
            LedgerVariant::Mock(inner) => {
                inner.deposit_round(agreement, from, round, auction_size).await
            }
        }
    }

    async fn register(&self, agreement: &Address, from: &Address) -> Result<TxHash, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.register(agreement, from).await,
            LedgerVariant::Mock(inner) => inner.register(agreement, from).await,
        }
    }
}

#[async_trait]
impl AssetContract for LedgerVariant {
    async fn balance_of(&self, asset: &Address, holder: &Address) -> Result<Amount, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.balance_of(asset, holder).await,
            LedgerVariant::Mock(inner) => inner.balance_of(asset, holder).await,
        }
    }

    async fn allowance(
        &self,
        asset: &Address,
        holder: &Address,
        spender: &Address,
    ) -> Result<Amount, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.allowance(asset, holder, spender).await,
            LedgerVariant::Mock(inner) => inner.allowance(asset, holder, spender).await,
        }
    }

    async fn approve(
        &self,
        asset: &Address,
        from: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<TxHash, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.approve(asset, from, spender, amount).await,
            LedgerVariant::Mock(inner) => inner.approve(asset, from, spender, amount).await,
        }
    }

    async fn symbol(&self, asset: &Address) -> Result<String, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.symbol(asset).await,
            LedgerVariant::Mock(inner) => inner.symbol(asset).await,
        }
    }

    async fn decimals(&self, asset: &Address) -> Result<u8, LedgerError> {
        match self {
            LedgerVariant::JsonRpc(inner) => inner.decimals(asset).await,
            LedgerVariant::Mock(inner) => inner.decimals(asset).await,
        }
    }
}
