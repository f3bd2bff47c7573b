use async_trait::async_trait;

use crate::error::LedgerError;

/// The ledger's own notion of "now".
#[async_trait]
pub trait LedgerClock: Send + Sync {
    /// Timestamp of the latest block in unix seconds.
    ///
    /// Every call is a fresh remote read; implementations must not cache.
    async fn now(&self) -> Result<u64, LedgerError>;
}
