// Library exports for testing and external use

pub mod app;
pub mod auction;
pub mod config;
pub mod error;
pub mod ledger;
pub mod preconditions;
pub mod registration;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod wait;

// Re-export commonly used types and traits
pub use config::{Cli, RoundSelection, SchedulerConfig};
pub use error::{LedgerError, PaymentError};
pub use registry::DeploymentRecord;
pub use scheduler::{pay_round_once, PaymentContext, RoundScheduler};
pub use traits::{AgreementContract, AssetContract, Ledger, LedgerClock, TransactionTracker};
pub use types::{
    Address, AgreementSchedule, Amount, Attempt, Outcome, Participant, Round, RoundReport,
    RunReport,
};

// Re-export ledger backends for convenience
pub use ledger::{JsonRpcLedger, LedgerVariant, MockLedger, SubmittedTx};
