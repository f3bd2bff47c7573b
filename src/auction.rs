//! Per-participant auction size resolution.
//!
//! Precedence: participant override, then explicit default override, then the
//! protocol reward, then the minimal unit.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::error::PaymentError;
use crate::types::{Address, AgreementSchedule, Amount, Participant};

pub const MINIMAL_AUCTION_SIZE: Amount = 1;

/// Parses a strictly positive integer amount.
pub fn parse_auction_size(value: &str, label: &str) -> Result<Amount, PaymentError> {
    match value.trim().parse::<Amount>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(PaymentError::InvalidAuctionSize {
            label: label.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Default auction size for participants without their own override.
pub fn resolve_default(
    explicit_override: Option<&str>,
    protocol_reward: Amount,
) -> Result<Amount, PaymentError> {
    if let Some(value) = explicit_override {
        return parse_auction_size(value, "default auction size");
    }
    if protocol_reward > 0 {
        return Ok(protocol_reward);
    }
    Ok(MINIMAL_AUCTION_SIZE)
}

pub fn resolve_for_participant(
    label: &str,
    overrides: &HashMap<String, String>,
    default_amount: Amount,
) -> Result<Amount, PaymentError> {
    match overrides.get(label) {
        Some(value) => parse_auction_size(value, label),
        None => Ok(default_amount),
    }
}

pub fn check_ceiling(label: &str, amount: Amount, ceiling: Amount) -> Result<Amount, PaymentError> {
    if amount > ceiling {
        return Err(PaymentError::AuctionSizeExceedsCeiling {
            label: label.to_string(),
            amount,
            ceiling,
        });
    }
    Ok(amount)
}

/// Builds the participant set for a run, failing fast on any invalid amount.
///
/// Labels and identities must be unique: no two payment tasks may act under
/// the same account.
pub fn resolve_participants(
    identities: &[(String, Address)],
    schedule: &AgreementSchedule,
    explicit_default: Option<&str>,
    overrides: &HashMap<String, String>,
) -> Result<Vec<Participant>, PaymentError> {
    if identities.is_empty() {
        return Err(PaymentError::Configuration(
            "no participants configured".to_string(),
        ));
    }

    let default_amount = resolve_default(explicit_default, schedule.protocol_reward_per_installment)?;
    check_ceiling("default", default_amount, schedule.max_auction_size)?;

    for label in overrides.keys() {
        if !identities.iter().any(|(l, _)| l == label) {
            return Err(PaymentError::Configuration(format!(
                "auction size override for unknown participant {}",
                label
            )));
        }
    }

    let mut labels = HashSet::new();
    let mut accounts = HashSet::new();
    let mut participants = Vec::with_capacity(identities.len());
    for (label, identity) in identities {
        if !labels.insert(label.as_str()) {
            return Err(PaymentError::Configuration(format!(
                "participant {} listed twice",
                label
            )));
        }
        if !accounts.insert(*identity) {
            return Err(PaymentError::Configuration(format!(
                "account {} is shared by more than one participant",
                identity
            )));
        }

        let amount = resolve_for_participant(label, overrides, default_amount)?;
        let auction_size = check_ceiling(label, amount, schedule.max_auction_size)?;
        info!("{} ({}) auction size {}", label, identity, auction_size);
        participants.push(Participant {
            label: label.clone(),
            identity: *identity,
            auction_size,
        });
    }
    Ok(participants)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(reward: Amount, ceiling: Amount) -> AgreementSchedule {
        AgreementSchedule {
            start_time: 0,
            round_duration: 60,
            num_rounds: 3,
            installment_size: 100,
            protocol_reward_per_installment: reward,
            max_auction_size: ceiling,
            installment_asset: Address([1; 20]),
            reward_asset: Address([2; 20]),
        }
    }

    fn identities() -> Vec<(String, Address)> {
        vec![
            ("account_1".to_string(), Address([0xa1; 20])),
            ("account_2".to_string(), Address([0xa2; 20])),
        ]
    }

    #[test]
    fn protocol_reward_is_the_default() {
        assert_eq!(resolve_default(None, 10).unwrap(), 10);
    }

    #[test]
    fn zero_reward_falls_back_to_minimal_unit() {
        assert_eq!(resolve_default(None, 0).unwrap(), 1);
    }

    #[test]
    fn explicit_override_beats_reward() {
        assert_eq!(resolve_default(Some("25"), 10).unwrap(), 25);
        assert!(matches!(
            resolve_default(Some("0"), 10),
            Err(PaymentError::InvalidAuctionSize { .. })
        ));
        assert!(resolve_default(Some("-3"), 10).is_err());
        assert!(resolve_default(Some("ten"), 10).is_err());
    }

    #[test]
    fn participant_override_always_wins() {
        let mut overrides = HashMap::new();
        overrides.insert("account_2".to_string(), "7".to_string());

        assert_eq!(resolve_for_participant("account_1", &overrides, 10).unwrap(), 10);
        assert_eq!(resolve_for_participant("account_2", &overrides, 10).unwrap(), 7);
    }

    #[test]
    fn ceiling_is_inclusive() {
        assert_eq!(check_ceiling("a", 100, 100).unwrap(), 100);
        let err = check_ceiling("a", 101, 100).unwrap_err();
        assert_eq!(
            err,
            PaymentError::AuctionSizeExceedsCeiling {
                label: "a".to_string(),
                amount: 101,
                ceiling: 100,
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn resolves_every_participant() {
        let mut overrides = HashMap::new();
        overrides.insert("account_2".to_string(), "3".to_string());

        let participants =
            resolve_participants(&identities(), &schedule(10, 1_000), None, &overrides).unwrap();
        assert_eq!(participants[0].auction_size, 10);
        assert_eq!(participants[1].auction_size, 3);
        assert_eq!(participants[1].identity, Address([0xa2; 20]));
    }

    #[test]
    fn any_amount_over_ceiling_fails_the_whole_set() {
        let mut overrides = HashMap::new();
        overrides.insert("account_2".to_string(), "5000".to_string());

        let err = resolve_participants(&identities(), &schedule(10, 1_000), None, &overrides)
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::AuctionSizeExceedsCeiling { ref label, amount: 5000, ceiling: 1_000 }
                if label == "account_2"
        ));

        let err = resolve_participants(&identities(), &schedule(2_000, 1_000), None, &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, PaymentError::AuctionSizeExceedsCeiling { .. }));
    }

    #[test]
    fn rejects_shared_accounts_and_unknown_overrides() {
        let mut shared = identities();
        shared[1].1 = shared[0].1;
        assert!(matches!(
            resolve_participants(&shared, &schedule(10, 1_000), None, &HashMap::new()),
            Err(PaymentError::Configuration(_))
        ));

        let mut overrides = HashMap::new();
        overrides.insert("account_9".to_string(), "3".to_string());
        assert!(matches!(
            resolve_participants(&identities(), &schedule(10, 1_000), None, &overrides),
            Err(PaymentError::Configuration(_))
        ));

        assert!(resolve_participants(&[], &schedule(10, 1_000), None, &HashMap::new()).is_err());
    }
}
