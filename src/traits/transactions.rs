use std::time::Duration;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::Receipt;

/// Confirmation tracking for submitted transactions.
#[async_trait]
pub trait TransactionTracker: Send + Sync {
    /// Wait until `tx_hash` is mined.
    ///
    /// Returns `LedgerError::Reverted` when the receipt reports failure and
    /// `LedgerError::Timeout` when nothing is mined within `timeout`.
    async fn wait_for_receipt(&self, tx_hash: &str, timeout: Duration)
        -> Result<Receipt, LedgerError>;
}
