use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::errors::RenewalError;
use crate::orchestrator::RenewalOrchestrator;
use crate::outcome::{RenewalOutcome, RenewalRequest, TriggerKind};

/// Something that can perform a renewal run.
#[async_trait]
pub trait Renewer: Send + Sync {
    async fn renew(&self, request: &RenewalRequest) -> RenewalOutcome;
}

#[async_trait]
impl Renewer for RenewalOrchestrator {
    async fn renew(&self, request: &RenewalRequest) -> RenewalOutcome {
        self.run(request).await
    }
}

/// Entry point shared by every trigger.
///
/// Challenge records have no lease, so two runs for the same domain would
/// delete each other's records. A trigger that arrives while a run is in
/// flight is rejected instead of queued.
///
/// Each run executes on its own task. Dropping the future returned by
/// [`RenewalRunner::trigger`] does not cancel the run, so its cleanup
/// always happens.
pub struct RenewalRunner {
    renewer: Arc<dyn Renewer>,
    domain: String,
    in_flight: Arc<Mutex<()>>,
}

impl RenewalRunner {
    pub fn new(renewer: Arc<dyn Renewer>, domain: impl Into<String>) -> Self {
        Self {
            renewer,
            domain: domain.into(),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    pub async fn trigger(&self, trigger: TriggerKind) -> RenewalOutcome {
        let Ok(guard) = self.in_flight.clone().try_lock_owned() else {
            warn!(
                domain = %self.domain,
                trigger = %trigger,
                "Renewal already in progress, ignoring trigger"
            );
            return RenewalOutcome::failed(&RenewalError::AlreadyRunning);
        };

        let request = RenewalRequest::new(self.domain.clone(), trigger);
        let renewer = self.renewer.clone();
        let run = tokio::spawn(async move {
            let _guard = guard;
            renewer.renew(&request).await
        });

        match run.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(domain = %self.domain, "Renewal task failed: {}", e);
                RenewalOutcome::failed(&RenewalError::TaskFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    /// Blocks every run until released.
    #[derive(Default)]
    struct GatedRenewer {
        started: Notify,
        release: Notify,
        finished: Notify,
        requests: std::sync::Mutex<Vec<(String, TriggerKind)>>,
    }

    impl GatedRenewer {
        fn runs(&self) -> Vec<(String, TriggerKind)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Renewer for GatedRenewer {
        async fn renew(&self, request: &RenewalRequest) -> RenewalOutcome {
            self.requests
                .lock()
                .unwrap()
                .push((request.domain.clone(), request.trigger));
            self.started.notify_one();
            self.release.notified().await;
            self.finished.notify_one();
            RenewalOutcome {
                success: true,
                result: None,
                error: None,
            }
        }
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_rejected() {
        let renewer = Arc::new(GatedRenewer::default());
        let runner = Arc::new(RenewalRunner::new(renewer.clone(), "example.com"));

        let first = tokio::spawn({
            let runner = runner.clone();
            async move { runner.trigger(TriggerKind::Scheduled).await }
        });
        renewer.started.notified().await;
        assert!(runner.is_running());

        let second = runner.trigger(TriggerKind::Http).await;
        assert!(!second.success);
        assert_eq!(second.error.as_deref(), Some("renewal already in progress"));

        renewer.release.notify_one();
        let first = first.await.unwrap();
        assert!(first.success);
        assert_eq!(
            renewer.runs(),
            vec![("example.com".to_string(), TriggerKind::Scheduled)]
        );
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_dropped_trigger_does_not_cancel_run() {
        let renewer = Arc::new(GatedRenewer::default());
        let runner = Arc::new(RenewalRunner::new(renewer.clone(), "example.com"));

        let caller = tokio::spawn({
            let runner = runner.clone();
            async move { runner.trigger(TriggerKind::Http).await }
        });
        renewer.started.notified().await;

        // The HTTP client went away mid-run
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());
        assert!(runner.is_running());

        renewer.release.notify_one();
        renewer.finished.notified().await;
        tokio::task::yield_now().await;

        assert!(!runner.is_running());
        assert_eq!(
            renewer.runs(),
            vec![("example.com".to_string(), TriggerKind::Http)]
        );

        // The lock was released with the finished run
        renewer.release.notify_one();
        assert!(runner.trigger(TriggerKind::Manual).await.success);
    }

    #[tokio::test]
    async fn test_sequential_triggers_both_run() {
        let renewer = Arc::new(GatedRenewer::default());
        let runner = RenewalRunner::new(renewer.clone(), "example.com");

        // A stored permit lets the run complete as soon as it starts
        renewer.release.notify_one();
        assert!(runner.trigger(TriggerKind::Manual).await.success);
        renewer.release.notify_one();
        assert!(runner.trigger(TriggerKind::Manual).await.success);

        assert_eq!(renewer.runs().len(), 2);
    }
}
