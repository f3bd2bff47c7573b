use thiserror::Error;

use crate::types::Amount;

/// Failure of a single remote call against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("rpc call `{method}` failed: {message}")]
    Rpc { method: String, message: String },

    #[error("rpc call `{0}` returned no data")]
    EmptyResponse(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("transaction {tx} not confirmed after {waited_secs}s")]
    Timeout { tx: String, waited_secs: u64 },

    #[error("cannot decode ledger value: {0}")]
    Decode(String),
}

/// Error taxonomy of the payment scheduler.
///
/// `Configuration`, `ScheduleUnavailable`, `InvalidSchedule`,
/// `ClockUnavailable`, `AuctionSizeExceedsCeiling` and `InvalidAuctionSize`
/// abort the run. Everything else is scoped to one (round, participant) pair
/// and ends up in that pair's `Attempt`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("agreement schedule unavailable: {0}")]
    ScheduleUnavailable(LedgerError),

    #[error("invalid agreement schedule: {0}")]
    InvalidSchedule(String),

    #[error("ledger clock unavailable: {0}")]
    ClockUnavailable(LedgerError),

    #[error("{label} auction size {amount} exceeds ceiling {ceiling}")]
    AuctionSizeExceedsCeiling {
        label: String,
        amount: Amount,
        ceiling: Amount,
    },

    #[error("invalid auction size for {label}: \"{value}\"")]
    InvalidAuctionSize { label: String, value: String },

    #[error("insufficient {asset} balance: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: Amount,
        available: Amount,
    },

    #[error("authorization of {asset} failed: {source}")]
    AuthorizationTransactionFailed { asset: String, source: LedgerError },

    #[error("deposit rejected: {0}")]
    SubmissionRejected(LedgerError),

    #[error("deposit {tx} not confirmed after {waited_secs}s")]
    ConfirmationTimeout { tx: String, waited_secs: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("payment task aborted: {0}")]
    TaskAborted(String),
}

impl PaymentError {
    /// Whether this error aborts the whole run rather than a single payment.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PaymentError::Configuration(_)
                | PaymentError::ScheduleUnavailable(_)
                | PaymentError::InvalidSchedule(_)
                | PaymentError::ClockUnavailable(_)
                | PaymentError::AuctionSizeExceedsCeiling { .. }
                | PaymentError::InvalidAuctionSize { .. }
        )
    }
}
