use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::{Address, Amount, TxHash};

/// Fungible asset surface (ERC-20 style).
#[async_trait]
pub trait AssetContract: Send + Sync {
    async fn balance_of(&self, asset: &Address, holder: &Address) -> Result<Amount, LedgerError>;

    async fn allowance(
        &self,
        asset: &Address,
        holder: &Address,
        spender: &Address,
    ) -> Result<Amount, LedgerError>;

    /// Submit `approve(spender, amount)` signed by `from`.
    async fn approve(
        &self,
        asset: &Address,
        from: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<TxHash, LedgerError>;

    async fn symbol(&self, asset: &Address) -> Result<String, LedgerError>;

    async fn decimals(&self, asset: &Address) -> Result<u8, LedgerError>;
}
