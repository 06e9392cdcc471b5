use edgecert_acme::{AcmeClient, AuthorizationChallenge};
use edgecert_core::{poll_until, Attempt, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::RenewalError;

/// Bounded retries around the ACME client's local challenge check.
///
/// Every error is a failed attempt. Running out of attempts fails the whole
/// run, not just the current authorization.
pub struct ChallengeVerifier {
    acme: Arc<dyn AcmeClient>,
    policy: RetryPolicy,
}

impl ChallengeVerifier {
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(acme: Arc<dyn AcmeClient>) -> Self {
        Self {
            acme,
            policy: RetryPolicy::fixed(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_INTERVAL),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the attempt that succeeded.
    pub async fn verify(&self, challenge: &AuthorizationChallenge) -> Result<u32, RenewalError> {
        let result = poll_until(&self.policy, |attempt| async move {
            match self.acme.verify_challenge(challenge).await {
                Ok(()) => Attempt::Done(attempt),
                Err(e) => {
                    warn!(
                        domain = %challenge.domain,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        "Challenge verification failed: {}",
                        e
                    );
                    Attempt::Failed(e)
                }
            }
        })
        .await;

        match result {
            Ok(attempt) => {
                info!(domain = %challenge.domain, attempt, "Challenge verified");
                Ok(attempt)
            }
            Err(exhausted) => Err(RenewalError::ChallengeVerificationExhausted {
                domain: challenge.domain.clone(),
                attempts: exhausted.attempts,
                last_error: exhausted
                    .last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no attempt was made".to_string()),
            }),
        }
    }
}
