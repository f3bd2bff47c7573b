//! Round loop and per-participant fan-out - calls the executor from executor.rs

use std::sync::Arc;

use kanal::unbounded_async;
use tracing::{error, info, info_span, span, warn, Instrument, Level};

use super::core::{PaymentContext, RoundScheduler};
use super::executor::pay_round_once;
use crate::error::PaymentError;
use crate::types::{
    Address, AgreementSchedule, Attempt, Outcome, Participant, Round, RoundReport, RunReport,
};
use crate::wait::wait_for_ledger_time;

impl RoundScheduler {
    /// Prepare and run: load the schedule, resolve participants, pay rounds.
    pub async fn pay(&self, identities: &[(String, Address)]) -> Result<RunReport, PaymentError> {
        let (schedule, participants) = self.prepare(identities).await?;
        self.run(&schedule, &participants).await
    }

    /// Pay every selected round in order.
    ///
    /// Each round waits for the ledger clock to reach its window start, runs
    /// one task per participant and joins all of them before the next round.
    /// Individual failures never end the run; only clock or configuration
    /// errors do.
    pub async fn run(
        &self,
        schedule: &AgreementSchedule,
        participants: &[Participant],
    ) -> Result<RunReport, PaymentError> {
        let span = span!(Level::INFO, "scheduler_run", agreement = %self.agreement);
        async move {
            let rounds = self.select_rounds(schedule).await?;
            let ctx = Arc::new(self.payment_context(schedule).await);

            info!(
                "Paying {} round(s) for {} participant(s); installment={} {}, max_auction={} {}",
                rounds.len(),
                participants.len(),
                schedule.installment_size,
                ctx.installment.symbol,
                schedule.max_auction_size,
                ctx.reward.symbol
            );

            let mut report = RunReport::default();
            for round in rounds {
                info!(
                    "Waiting for round {} to open at ledger time {}",
                    round.index, round.window_start
                );
                let now = wait_for_ledger_time(
                    self.ledger.as_ref(),
                    round.window_start,
                    self.config.poll_interval(),
                    self.config.clock_retry_limit,
                )
                .await?;
                info!(
                    "Round {} open at ledger time {} (deadline {})",
                    round.index, now, round.deadline
                );

                let round_report = self.run_round(&ctx, round, participants).await;
                info!(
                    "Round {} finished: confirmed={}, skipped={}, failed={}",
                    round.index,
                    round_report.confirmed(),
                    round_report.skipped(),
                    round_report.failed()
                );
                for attempt in &round_report.attempts {
                    if let Outcome::Failed(e) = &attempt.outcome {
                        warn!("  {} failed round {}: {}", attempt.participant, round.index, e);
                    }
                }
                report.rounds.push(round_report);
            }

            info!("All {} round(s) processed", report.rounds.len());
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Run one payment task per participant and collect every outcome.
    ///
    /// Outcomes travel over a channel so that one task failing or panicking
    /// never hides the others. A task that ends without reporting is recorded
    /// as `TaskAborted`.
    pub async fn run_round(
        &self,
        ctx: &Arc<PaymentContext>,
        round: Round,
        participants: &[Participant],
    ) -> RoundReport {
        let (attempt_tx, attempt_rx) = unbounded_async::<Attempt>();

        let mut handles = Vec::with_capacity(participants.len());
        for participant in participants {
            let ledger = Arc::clone(&self.ledger);
            let ctx = Arc::clone(ctx);
            let participant = participant.clone();
            let attempt_tx = attempt_tx.clone();
            let label = participant.label.clone();
            let span = info_span!("payment", round = round.index, participant = %participant.label);

            let handle = tokio::spawn(
                async move {
                    let outcome = pay_round_once(ledger.as_ref(), &ctx, round, &participant).await;
                    let attempt = Attempt {
                        round: round.index,
                        participant: participant.label,
                        outcome,
                    };
                    if attempt_tx.send(attempt).await.is_err() {
                        error!("Attempt channel closed before outcome was reported");
                    }
                }
                .instrument(span),
            );
            handles.push((label, handle));
        }
        drop(attempt_tx);

        let mut attempts = Vec::with_capacity(participants.len());
        while let Ok(attempt) = attempt_rx.recv().await {
            attempts.push(attempt);
        }

        for (label, handle) in handles {
            if let Err(e) = handle.await {
                error!("Payment task for {} in round {} aborted: {}", label, round.index, e);
                if !attempts.iter().any(|a| a.participant == label) {
                    attempts.push(Attempt {
                        round: round.index,
                        participant: label,
                        outcome: Outcome::Failed(PaymentError::TaskAborted(e.to_string())),
                    });
                }
            }
        }

        attempts.sort_by_key(|a| {
            participants
                .iter()
                .position(|p| p.label == a.participant)
                .unwrap_or(usize::MAX)
        });

        RoundReport { round, attempts }
    }
}
