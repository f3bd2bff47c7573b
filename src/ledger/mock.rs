use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::traits::{AgreementContract, AssetContract, LedgerClock, TransactionTracker};
use crate::types::{Address, AgreementSchedule, Amount, Receipt, TxHash};

/// Transaction accepted by the mock ledger, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmittedTx {
    Approve {
        asset: Address,
        from: Address,
        spender: Address,
        amount: Amount,
    },
    Deposit {
        round: u64,
        from: Address,
        auction_size: Amount,
    },
    Register {
        from: Address,
    },
}

impl SubmittedTx {
    pub fn sender(&self) -> &Address {
        match self {
            SubmittedTx::Approve { from, .. } => from,
            SubmittedTx::Deposit { from, .. } => from,
            SubmittedTx::Register { from } => from,
        }
    }
}

#[derive(Default)]
struct MockState {
    schedule: Option<AgreementSchedule>,
    current_round: u64,
    balances: HashMap<(Address, Address), Amount>,
    allowances: HashMap<(Address, Address, Address), Amount>,
    contributions: HashMap<(u64, Address), Amount>,
    symbols: HashMap<Address, String>,
    registered: Vec<Address>,
    submitted: Vec<(TxHash, SubmittedTx, u64)>,
    clock_offset: u64,
    clock_failures: u32,
    clock_reads: u64,
    asset_reads: u64,
    schedule_unavailable: bool,
    reject_deposits: HashSet<Address>,
    drop_deposits: HashSet<Address>,
    fail_approvals: HashSet<Address>,
    dropped: HashSet<TxHash>,
}

/// In-memory ledger for tests.
///
/// The clock starts at `genesis_ts` and follows tokio's clock, so tests that
/// run with paused time see ledger time advance only when the runtime does.
/// Deposits behave like the real contract: they move funds, consume
/// allowance and revert outside the round window or when already paid.
#[derive(Clone)]
pub struct MockLedger {
    pub agreement: Address,
    genesis_ts: u64,
    origin: tokio::time::Instant,
    state: Arc<Mutex<MockState>>,
}

impl MockLedger {
    pub fn new(agreement: Address, genesis_ts: u64) -> Self {
        Self {
            agreement,
            genesis_ts,
            origin: tokio::time::Instant::now(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn with_schedule(self, schedule: AgreementSchedule) -> Self {
        self.state.lock().unwrap().schedule = Some(schedule);
        self
    }

    pub fn set_current_round(&self, round: u64) {
        self.state.lock().unwrap().current_round = round;
    }

    pub fn set_balance(&self, asset: Address, holder: Address, amount: Amount) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert((asset, holder), amount);
    }

    pub fn set_allowance(&self, asset: Address, holder: Address, spender: Address, amount: Amount) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((asset, holder, spender), amount);
    }

    pub fn set_contribution(&self, round: u64, participant: Address, amount: Amount) {
        self.state
            .lock()
            .unwrap()
            .contributions
            .insert((round, participant), amount);
    }

    pub fn set_symbol(&self, asset: Address, symbol: &str) {
        self.state
            .lock()
            .unwrap()
            .symbols
            .insert(asset, symbol.to_string());
    }

    /// Move ledger time forward without waiting on the runtime.
    pub fn advance(&self, secs: u64) {
        self.state.lock().unwrap().clock_offset += secs;
    }

    /// Make the next `count` clock reads fail.
    pub fn fail_clock_reads(&self, count: u32) {
        self.state.lock().unwrap().clock_failures = count;
    }

    pub fn make_schedule_unavailable(&self) {
        self.state.lock().unwrap().schedule_unavailable = true;
    }

    /// Deposits from `from` are rejected at submission.
    pub fn reject_deposits_from(&self, from: Address) {
        self.state.lock().unwrap().reject_deposits.insert(from);
    }

    /// Deposits from `from` are accepted but never mined.
    pub fn drop_deposits_from(&self, from: Address) {
        self.state.lock().unwrap().drop_deposits.insert(from);
    }

    pub fn fail_approvals_from(&self, from: Address) {
        self.state.lock().unwrap().fail_approvals.insert(from);
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.state
            .lock()
            .unwrap()
            .submitted
            .iter()
            .map(|(_, tx, _)| tx.clone())
            .collect()
    }

    pub fn submitted_by(&self, from: &Address) -> Vec<SubmittedTx> {
        self.submitted()
            .into_iter()
            .filter(|tx| tx.sender() == from)
            .collect()
    }

    /// Ledger timestamps at which each transaction was accepted.
    pub fn submission_times(&self) -> Vec<(SubmittedTx, u64)> {
        self.state
            .lock()
            .unwrap()
            .submitted
            .iter()
            .map(|(_, tx, ts)| (tx.clone(), *ts))
            .collect()
    }

    pub fn registered(&self) -> Vec<Address> {
        self.state.lock().unwrap().registered.clone()
    }

    pub fn clock_reads(&self) -> u64 {
        self.state.lock().unwrap().clock_reads
    }

    /// Number of balance and allowance reads served so far.
    pub fn asset_reads(&self) -> u64 {
        self.state.lock().unwrap().asset_reads
    }

    pub fn balance(&self, asset: Address, holder: Address) -> Amount {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&(asset, holder))
            .copied()
            .unwrap_or(0)
    }

    pub fn allowance_of(&self, asset: Address, holder: Address, spender: Address) -> Amount {
        self.state
            .lock()
            .unwrap()
            .allowances
            .get(&(asset, holder, spender))
            .copied()
            .unwrap_or(0)
    }

    fn ledger_now(&self, state: &MockState) -> u64 {
        self.genesis_ts + self.origin.elapsed().as_secs() + state.clock_offset
    }

    fn record(&self, state: &mut MockState, tx: SubmittedTx) -> TxHash {
        let now = self.ledger_now(state);
        let hash = format!("0x{:064x}", state.submitted.len() + 1);
        state.submitted.push((hash.clone(), tx, now));
        hash
    }

    fn schedule(&self, state: &MockState) -> Result<AgreementSchedule, LedgerError> {
        if state.schedule_unavailable {
            return Err(LedgerError::EmptyResponse("eth_call".to_string()));
        }
        state
            .schedule
            .clone()
            .ok_or_else(|| LedgerError::EmptyResponse("eth_call".to_string()))
    }

    /// Moves `amounts` from `holder` through `spender`'s allowance, all or nothing.
    fn spend(
        state: &mut MockState,
        holder: Address,
        spender: Address,
        amounts: &[(Address, Amount)],
    ) -> Result<(), LedgerError> {
        for (asset, amount) in amounts {
            let balance = state.balances.get(&(*asset, holder)).copied().unwrap_or(0);
            let allowance = state
                .allowances
                .get(&(*asset, holder, spender))
                .copied()
                .unwrap_or(0);
            if balance < *amount {
                return Err(LedgerError::Reverted(
                    "transfer amount exceeds balance".to_string(),
                ));
            }
            if allowance < *amount {
                return Err(LedgerError::Reverted("insufficient allowance".to_string()));
            }
        }
        for (asset, amount) in amounts {
            if let Some(balance) = state.balances.get_mut(&(*asset, holder)) {
                *balance -= amount;
            }
            if let Some(allowance) = state.allowances.get_mut(&(*asset, holder, spender)) {
                *allowance -= amount;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClock for MockLedger {
    async fn now(&self) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.clock_reads += 1;
        if state.clock_failures > 0 {
            state.clock_failures -= 1;
            return Err(LedgerError::EmptyResponse("eth_getBlockByNumber".to_string()));
        }
        Ok(self.ledger_now(&state))
    }
}

#[async_trait]
impl TransactionTracker for MockLedger {
    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Receipt, LedgerError> {
        let found = {
            let state = self.state.lock().unwrap();
            if state.dropped.contains(tx_hash) {
                None
            } else {
                state
                    .submitted
                    .iter()
                    .position(|(hash, _, _)| hash == tx_hash)
                    .map(|pos| pos as u64 + 1)
            }
        };

        match found {
            Some(block_number) => Ok(Receipt {
                tx_hash: tx_hash.to_string(),
                block_number,
            }),
            None => {
                tokio::time::sleep(timeout).await;
                Err(LedgerError::Timeout {
                    tx: tx_hash.to_string(),
                    waited_secs: timeout.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl AgreementContract for MockLedger {
    async fn current_round(&self, _agreement: &Address) -> Result<u64, LedgerError> {
        Ok(self.state.lock().unwrap().current_round)
    }

    async fn contribution(
        &self,
        _agreement: &Address,
        round: u64,
        participant: &Address,
    ) -> Result<Amount, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .contributions
            .get(&(round, *participant))
            .copied()
            .unwrap_or(0))
    }

    async fn start_time(&self, _agreement: &Address) -> Result<u64, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(self.schedule(&state)?.start_time)
    }

    async fn round_duration(&self, _agreement: &Address) -> Result<u64, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(self.schedule(&state)?.round_duration)
    }

    async fn num_rounds(&self, _agreement: &Address) -> Result<u64, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(self.schedule(&state)?.num_rounds)
    }

    async fn installment_size(&self, _agreement: &Address) -> Result<Amount, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(self.schedule(&state)?.installment_size)
    }

    async fn protocol_reward(&self, _agreement: &Address) -> Result<Amount, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(self.schedule(&state)?.protocol_reward_per_installment)
    }

    async fn max_auction_size(&self, _agreement: &Address) -> Result<Amount, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(self.schedule(&state)?.max_auction_size)
    }

    async fn installment_asset(&self, _agreement: &Address) -> Result<Address, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(self.schedule(&state)?.installment_asset)
    }

    async fn reward_asset(&self, _agreement: &Address) -> Result<Address, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(self.schedule(&state)?.reward_asset)
    }

    async fn deposit_round(
        &self,
        agreement: &Address,
        from: &Address,
        round: u64,
        auction_size: Amount,
    ) -> Result<TxHash, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_deposits.contains(from) {
            return Err(LedgerError::Reverted("deposit rejected".to_string()));
        }

        let schedule = self.schedule(&state)?;
        let window = schedule
            .round(round)
            .ok_or_else(|| LedgerError::Reverted(format!("round {} does not exist", round)))?;
        let now = self.ledger_now(&state);
        if !window.is_open_at(now) {
            return Err(LedgerError::Reverted(format!(
                "round {} is not open at {}",
                round, now
            )));
        }
        if state.contributions.get(&(round, *from)).copied().unwrap_or(0) > 0 {
            return Err(LedgerError::Reverted("already deposited".to_string()));
        }

        let deposit = SubmittedTx::Deposit {
            round,
            from: *from,
            auction_size,
        };
        if state.drop_deposits.contains(from) {
            let hash = self.record(&mut state, deposit);
            state.dropped.insert(hash.clone());
            return Ok(hash);
        }

        Self::spend(
            &mut state,
            *from,
            *agreement,
            &[
                (schedule.installment_asset, schedule.installment_size),
                (schedule.reward_asset, auction_size),
            ],
        )?;
        state
            .contributions
            .insert((round, *from), schedule.installment_size);

        Ok(self.record(&mut state, deposit))
    }

    async fn register(&self, _agreement: &Address, from: &Address) -> Result<TxHash, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.registered.contains(from) {
            return Err(LedgerError::Reverted("already registered".to_string()));
        }
        state.registered.push(*from);
        Ok(self.record(&mut state, SubmittedTx::Register { from: *from }))
    }
}

#[async_trait]
impl AssetContract for MockLedger {
    async fn balance_of(&self, asset: &Address, holder: &Address) -> Result<Amount, LedgerError> {
        self.state.lock().unwrap().asset_reads += 1;
        Ok(self.balance(*asset, *holder))
    }

    async fn allowance(
        &self,
        asset: &Address,
        holder: &Address,
        spender: &Address,
    ) -> Result<Amount, LedgerError> {
        self.state.lock().unwrap().asset_reads += 1;
        Ok(self.allowance_of(*asset, *holder, *spender))
    }

    async fn approve(
        &self,
        asset: &Address,
        from: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<TxHash, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_approvals.contains(from) {
            return Err(LedgerError::Rpc {
                method: "eth_sendTransaction".to_string(),
                message: "account locked".to_string(),
            });
        }
        state.allowances.insert((*asset, *from, *spender), amount);
        Ok(self.record(
            &mut state,
            SubmittedTx::Approve {
                asset: *asset,
                from: *from,
                spender: *spender,
                amount,
            },
        ))
    }

    async fn symbol(&self, asset: &Address) -> Result<String, LedgerError> {
        self.state
            .lock()
            .unwrap()
            .symbols
            .get(asset)
            .cloned()
            .ok_or_else(|| LedgerError::Reverted("symbol() not implemented".to_string()))
    }

    async fn decimals(&self, _asset: &Address) -> Result<u8, LedgerError> {
        Ok(6)
    }
}
