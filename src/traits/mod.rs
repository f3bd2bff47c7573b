pub mod agreement;
pub mod asset;
pub mod clock;
pub mod transactions;

pub use agreement::AgreementContract;
pub use asset::AssetContract;
pub use clock::LedgerClock;
pub use transactions::TransactionTracker;

/// Everything the scheduler needs from a ledger backend.
pub trait Ledger: LedgerClock + TransactionTracker + AgreementContract + AssetContract {}

impl<T> Ledger for T where T: LedgerClock + TransactionTracker + AgreementContract + AssetContract {}
