pub mod abi;
pub mod metadata;
pub mod mock;
pub mod rpc;
pub mod variant;

pub use metadata::fetch_metadata;
pub use mock::{MockLedger, SubmittedTx};
pub use rpc::JsonRpcLedger;
pub use variant::LedgerVariant;
