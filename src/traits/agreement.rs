use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::{Address, Amount, TxHash};

/// Read/write surface of the saving circle contract.
#[async_trait]
pub trait AgreementContract: Send + Sync {
    async fn current_round(&self, agreement: &Address) -> Result<u64, LedgerError>;

    /// Amount `participant` already deposited in `round`. Non-zero means settled.
    async fn contribution(
        &self,
        agreement: &Address,
        round: u64,
        participant: &Address,
    ) -> Result<Amount, LedgerError>;

    async fn start_time(&self, agreement: &Address) -> Result<u64, LedgerError>;
    async fn round_duration(&self, agreement: &Address) -> Result<u64, LedgerError>;
    async fn num_rounds(&self, agreement: &Address) -> Result<u64, LedgerError>;
    async fn installment_size(&self, agreement: &Address) -> Result<Amount, LedgerError>;
    async fn protocol_reward(&self, agreement: &Address) -> Result<Amount, LedgerError>;
    async fn max_auction_size(&self, agreement: &Address) -> Result<Amount, LedgerError>;
    async fn installment_asset(&self, agreement: &Address) -> Result<Address, LedgerError>;
    async fn reward_asset(&self, agreement: &Address) -> Result<Address, LedgerError>;

    /// Submit `depositRound(round, auction_size, from)` signed by `from`.
    async fn deposit_round(
        &self,
        agreement: &Address,
        from: &Address,
        round: u64,
        auction_size: Amount,
    ) -> Result<TxHash, LedgerError>;

    /// Submit `register()` signed by `from`.
    async fn register(&self, agreement: &Address, from: &Address) -> Result<TxHash, LedgerError>;
}
