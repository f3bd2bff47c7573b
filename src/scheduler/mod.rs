//! Round-based payment scheduler.
//!
//! This module provides:
//! - `core`: RoundScheduler struct, run preparation and round selection
//! - `executor`: the per-(round, participant) payment state machine
//! - `tasks`: round loop and per-participant fan-out with tokio::spawn
//! - `tests`: unit tests driven by the mock ledger

pub mod core;
pub mod executor;
pub mod tasks;

pub use self::core::{PaymentContext, RoundScheduler};
pub use executor::pay_round_once;
