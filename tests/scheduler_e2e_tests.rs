use std::collections::HashMap;

use ::roundpay::*;
use anyhow::Result;

// ===== Test Helper Functions =====

const START: u64 = 1_700_000_000;
const ROUND_SECS: u64 = 60;

fn agreement() -> Address {
    Address([0xc1; 20])
}

fn usdc() -> Address {
    Address([0x01; 20])
}

fn sct() -> Address {
    Address([0x02; 20])
}

fn test_schedule() -> AgreementSchedule {
    AgreementSchedule {
        start_time: START,
        round_duration: ROUND_SECS,
        num_rounds: 3,
        installment_size: 100,
        protocol_reward_per_installment: 10,
        max_auction_size: 1_000,
        installment_asset: usdc(),
        reward_asset: sct(),
    }
}

fn identities() -> Vec<(String, Address)> {
    (1..=3u8)
        .map(|i| (format!("account_{}", i), Address([0xa0 + i; 20])))
        .collect()
}

/// Funded circle whose ledger clock starts at `genesis`.
fn funded_circle(genesis: u64) -> MockLedger {
    let ledger = MockLedger::new(agreement(), genesis).with_schedule(test_schedule());
    ledger.set_symbol(usdc(), "USDC");
    ledger.set_symbol(sct(), "SCT");
    for (_, identity) in identities() {
        ledger.set_balance(usdc(), identity, 1_000);
        ledger.set_balance(sct(), identity, 1_000);
    }
    ledger
}

fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval_secs: 5,
        confirmation_timeout_secs: 30,
        ..SchedulerConfig::default()
    }
}

fn scheduler(ledger: &MockLedger, config: SchedulerConfig) -> RoundScheduler {
    RoundScheduler::new(LedgerVariant::Mock(ledger.clone()), agreement(), config)
}

// ===== E2E Tests =====

#[tokio::test(start_paused = true)]
async fn test_three_rounds_gated_by_ledger_clock() -> Result<()> {
    println!("\n=== E2E Test: three rounds, three participants ===\n");

    let ledger = funded_circle(START - 30);
    let report = scheduler(&ledger, test_config()).pay(&identities()).await?;

    assert_eq!(report.rounds.len(), 3);
    for round in &report.rounds {
        println!(
            "round {}: confirmed={} skipped={} failed={}",
            round.round.index,
            round.confirmed(),
            round.skipped(),
            round.failed()
        );
        assert_eq!(round.confirmed(), 3);
    }

    // Every deposit landed inside its own round window.
    let schedule = test_schedule();
    let mut deposits_per_round: HashMap<u64, usize> = HashMap::new();
    for (tx, ts) in ledger.submission_times() {
        if let SubmittedTx::Deposit { round, .. } = tx {
            let window = schedule.round(round).unwrap();
            assert!(
                window.is_open_at(ts),
                "deposit for round {} at {} outside [{}, {})",
                round,
                ts,
                window.window_start,
                window.deadline
            );
            *deposits_per_round.entry(round).or_default() += 1;
        }
    }
    assert_eq!(deposits_per_round.len(), 3);
    assert!(deposits_per_round.values().all(|&n| n == 3));

    // Exact approvals are consumed by each deposit, so every round re-approves.
    for (_, identity) in identities() {
        let txs = ledger.submitted_by(&identity);
        let approvals = txs
            .iter()
            .filter(|tx| matches!(tx, SubmittedTx::Approve { .. }))
            .count();
        assert_eq!(approvals, 6);
        assert_eq!(txs.len(), 9);
        assert_eq!(ledger.balance(usdc(), identity), 700);
        assert_eq!(ledger.balance(sct(), identity), 970);
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rerun_is_idempotent() -> Result<()> {
    let ledger = funded_circle(START - 30);
    scheduler(&ledger, test_config()).pay(&identities()).await?;
    let submitted = ledger.submitted().len();

    let rerun = scheduler(&ledger, test_config()).pay(&identities()).await?;

    assert_eq!(ledger.submitted().len(), submitted);
    for round in &rerun.rounds {
        assert_eq!(round.skipped(), 3);
        for attempt in &round.attempts {
            assert_eq!(attempt.outcome, Outcome::SkippedAlreadyPaid { contributed: 100 });
        }
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_one_failing_participant_does_not_block_others() -> Result<()> {
    let ledger = funded_circle(START - 30);
    let (_, bob) = identities()[1].clone();
    ledger.set_balance(usdc(), bob, 0);

    let report = scheduler(&ledger, test_config()).pay(&identities()).await?;

    for round in &report.rounds {
        assert!(round.outcome_of("account_1").unwrap().is_confirmed());
        assert!(matches!(
            round.outcome_of("account_2").unwrap(),
            Outcome::Failed(PaymentError::InsufficientBalance { .. })
        ));
        assert!(round.outcome_of("account_3").unwrap().is_confirmed());
    }
    assert!(ledger.submitted_by(&bob).is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_late_start_skips_closed_rounds() -> Result<()> {
    let ledger = funded_circle(START + ROUND_SECS + 10);

    let report = scheduler(&ledger, test_config()).pay(&identities()).await?;

    let first = report.round(0).unwrap();
    assert_eq!(first.skipped(), 3);
    assert!(matches!(
        first.outcome_of("account_1").unwrap(),
        Outcome::SkippedDeadlineMissed { deadline, .. } if *deadline == START + ROUND_SECS
    ));
    assert_eq!(report.round(1).unwrap().confirmed(), 3);
    assert_eq!(report.round(2).unwrap().confirmed(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_violation_aborts_before_any_round() -> Result<()> {
    let ledger = funded_circle(START - 30);
    let mut config = test_config();
    config
        .auction_size_overrides
        .insert("account_3".to_string(), "1001".to_string());

    let err = scheduler(&ledger, config)
        .pay(&identities())
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        PaymentError::AuctionSizeExceedsCeiling { amount: 1001, ceiling: 1_000, .. }
    ));
    assert!(ledger.submitted().is_empty());
    assert_eq!(ledger.clock_reads(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_clock_aborts_run() -> Result<()> {
    let ledger = funded_circle(START - 30);
    ledger.fail_clock_reads(10);

    let err = scheduler(&ledger, test_config())
        .pay(&identities())
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::ClockUnavailable(_)));
    assert_eq!(ledger.clock_reads(), 4);
    assert!(ledger.submitted().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_single_round_modes() -> Result<()> {
    let ledger = funded_circle(START + ROUND_SECS);
    ledger.set_current_round(1);

    let current = scheduler(
        &ledger,
        SchedulerConfig {
            rounds: RoundSelection::Current,
            ..test_config()
        },
    )
    .pay(&identities())
    .await?;
    assert_eq!(current.rounds.len(), 1);
    assert_eq!(current.round(1).unwrap().confirmed(), 3);

    let explicit = scheduler(
        &ledger,
        SchedulerConfig {
            rounds: RoundSelection::Only(1),
            ..test_config()
        },
    )
    .pay(&identities())
    .await?;
    assert_eq!(explicit.round(1).unwrap().skipped(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_missing_schedule_is_fatal() -> Result<()> {
    let ledger = funded_circle(START);
    ledger.make_schedule_unavailable();

    let err = scheduler(&ledger, test_config())
        .pay(&identities())
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::ScheduleUnavailable(_)));
    Ok(())
}
