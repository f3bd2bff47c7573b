use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LedgerError, PaymentError};

/// Token amounts and contribution values.
pub type Amount = u128;

/// Hex-encoded transaction hash as returned by the ledger.
pub type TxHash = String;

/// 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| LedgerError::Decode(format!("address \"{}\": {}", s, e)))?;
        let raw: [u8; 20] = bytes.try_into().map_err(|_| {
            LedgerError::Decode(format!("address \"{}\" is not 20 bytes long", s))
        })?;
        Ok(Address(raw))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Immutable parameters of a saving circle, read once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementSchedule {
    /// Start of round 0 (ledger seconds).
    pub start_time: u64,
    /// Length of every round in seconds.
    pub round_duration: u64,
    pub num_rounds: u64,
    pub installment_size: Amount,
    pub protocol_reward_per_installment: Amount,
    /// Ceiling for any participant's auction contribution.
    pub max_auction_size: Amount,
    pub installment_asset: Address,
    pub reward_asset: Address,
}

impl AgreementSchedule {
    /// Window of round `index`, or `None` past the last round.
    pub fn round(&self, index: u64) -> Option<Round> {
        if index >= self.num_rounds {
            return None;
        }
        let window_start = self
            .start_time
            .saturating_add(self.round_duration.saturating_mul(index));
        Some(Round {
            index,
            window_start,
            deadline: window_start.saturating_add(self.round_duration),
        })
    }

    pub fn rounds(&self) -> impl Iterator<Item = Round> + '_ {
        (0..self.num_rounds).filter_map(move |i| self.round(i))
    }
}

/// Half-open payment window `[window_start, deadline)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Round {
    pub index: u64,
    pub window_start: u64,
    pub deadline: u64,
}

impl Round {
    pub fn is_open_at(&self, now: u64) -> bool {
        now >= self.window_start && now < self.deadline
    }
}

/// A circle member paying installments under its own account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub label: String,
    /// Account the ledger node submits transactions from.
    pub identity: Address,
    /// Resolved reward-asset contribution per round.
    pub auction_size: Amount,
}

/// Best-effort token metadata, used for log context only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub symbol: String,
    pub decimals: u8,
}

/// Confirmation data of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// Terminal state of one payment executor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SkippedAlreadyPaid { contributed: Amount },
    SkippedDeadlineMissed { now: u64, deadline: u64 },
    Failed(PaymentError),
    Confirmed(Receipt),
}

impl Outcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Outcome::SkippedAlreadyPaid { .. } | Outcome::SkippedDeadlineMissed { .. }
        )
    }
}

/// Outcome of one (round, participant) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub round: u64,
    pub participant: String,
    pub outcome: Outcome,
}

/// All attempts collected for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: Round,
    pub attempts: Vec<Attempt>,
}

impl RoundReport {
    pub fn outcome_of(&self, label: &str) -> Option<&Outcome> {
        self.attempts
            .iter()
            .find(|a| a.participant == label)
            .map(|a| &a.outcome)
    }

    pub fn confirmed(&self) -> usize {
        self.attempts.iter().filter(|a| a.outcome.is_confirmed()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempts.iter().filter(|a| a.outcome.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.attempts.iter().filter(|a| a.outcome.is_skipped()).count()
    }
}

/// Summary of a scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub rounds: Vec<RoundReport>,
}

impl RunReport {
    pub fn round(&self, index: u64) -> Option<&RoundReport> {
        self.rounds.iter().find(|r| r.round.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(start: u64, duration: u64, rounds: u64) -> AgreementSchedule {
        AgreementSchedule {
            start_time: start,
            round_duration: duration,
            num_rounds: rounds,
            installment_size: 100,
            protocol_reward_per_installment: 10,
            max_auction_size: 1_000,
            installment_asset: Address([1u8; 20]),
            reward_asset: Address([2u8; 20]),
        }
    }

    #[test]
    fn round_windows_are_contiguous() {
        let s = schedule(1_000, 60, 5);
        let rounds: Vec<Round> = s.rounds().collect();
        assert_eq!(rounds.len(), 5);
        for (i, r) in rounds.iter().enumerate() {
            assert_eq!(r.window_start, 1_000 + 60 * i as u64);
            assert_eq!(r.deadline, 1_000 + 60 * (i as u64 + 1));
            assert!(r.window_start < r.deadline);
        }
        for pair in rounds.windows(2) {
            assert_eq!(pair[0].deadline, pair[1].window_start);
        }
        assert!(s.round(5).is_none());
    }

    #[test]
    fn round_window_is_half_open() {
        let r = schedule(1_000, 60, 1).round(0).unwrap();
        assert!(!r.is_open_at(999));
        assert!(r.is_open_at(1_000));
        assert!(r.is_open_at(1_059));
        assert!(!r.is_open_at(1_060));
    }

    #[test]
    fn address_parses_with_and_without_prefix() {
        let a: Address = "0x61d8485717c7DDa1a1A6723EF511c0814ddDb738".parse().unwrap();
        let b: Address = "61d8485717c7dda1a1a6723ef511c0814dddb738".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0x61d8485717c7dda1a1a6723ef511c0814dddb738");
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not-an-address".parse::<Address>().is_err());
    }

    #[test]
    fn address_serializes_as_hex_string() {
        let a = Address([0xab; 20]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
