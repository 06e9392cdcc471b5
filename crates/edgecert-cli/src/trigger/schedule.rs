use chrono::Utc;
use cron::Schedule;
use edgecert_renewal::{RenewalRunner, TriggerKind};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Parse a six-field cron expression (seconds first), e.g. `0 0 3 * * *`.
pub fn parse_schedule(expression: &str) -> anyhow::Result<Schedule> {
    Schedule::from_str(expression)
        .map_err(|e| anyhow::anyhow!("Invalid cron expression '{}': {}", expression, e))
}

fn delay_until_next(schedule: &Schedule) -> Option<(chrono::DateTime<Utc>, Duration)> {
    let next = schedule.upcoming(Utc).next()?;
    let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Some((next, delay))
}

/// Run renewals on `schedule` until cancelled. A run in progress is not
/// interrupted; cancellation is observed while waiting for the next tick.
pub async fn run_schedule(
    schedule: Schedule,
    runner: Arc<RenewalRunner>,
    cancellation_token: CancellationToken,
) {
    loop {
        let Some((next_run, delay)) = delay_until_next(&schedule) else {
            warn!("Cron schedule has no upcoming runs, scheduler stopping");
            return;
        };
        info!(next_run = %next_run, "Next scheduled renewal");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancellation_token.cancelled() => {
                info!("Scheduler received cancellation signal, stopping");
                return;
            }
        }

        let outcome = runner.trigger(TriggerKind::Scheduled).await;
        if outcome.success {
            info!(domain = %runner.domain(), "Scheduled renewal completed");
        } else {
            error!(
                domain = %runner.domain(),
                "Scheduled renewal failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use edgecert_renewal::{RenewalOutcome, RenewalRequest, Renewer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRenewer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Renewer for CountingRenewer {
        async fn renew(&self, _request: &RenewalRequest) -> RenewalOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RenewalOutcome {
                success: true,
                result: None,
                error: None,
            }
        }
    }

    #[test]
    fn test_parse_default_schedule() {
        let schedule = parse_schedule("0 0 3 * * *").unwrap();
        let (next, delay) = delay_until_next(&schedule).unwrap();
        assert_eq!(next.format("%H:%M:%S").to_string(), "03:00:00");
        assert!(delay <= Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_parse_rejects_invalid_expression() {
        let err = parse_schedule("every night").unwrap_err();
        assert!(err.to_string().contains("every night"));
    }

    #[tokio::test]
    async fn test_cancelled_scheduler_stops_without_running() {
        let renewer = Arc::new(CountingRenewer {
            calls: AtomicUsize::new(0),
        });
        let runner = Arc::new(RenewalRunner::new(renewer.clone(), "example.com"));
        let token = CancellationToken::new();
        token.cancel();

        // Yearly schedule: the only way out is the cancellation
        run_schedule(parse_schedule("0 0 0 1 1 *").unwrap(), runner, token).await;

        assert_eq!(renewer.calls.load(Ordering::SeqCst), 0);
    }
}
