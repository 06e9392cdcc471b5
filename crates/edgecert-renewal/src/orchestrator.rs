//! Renewal state machine
//!
//! ```text
//! Init -> OrderCreated
//!      -> (DnsProvisioned -> DnsPropagated -> ChallengeVerified) per authorization
//!      -> OrderFinalized -> CertificateIssued -> Deployed -> Done
//! ```
//!
//! Any step can move the run to `Failed`. Authorizations are handled one at a
//! time: the provisioner's list-then-delete step is not safe to interleave.
//! Challenge records created during the run are removed once issuance ends,
//! whether it succeeded or not, and before the certificate is deployed.
//!
//! When two authorizations map to the same record name, the second record
//! replaces the first only after the server has marked the earlier
//! authorization valid.

use chrono::Utc;
use edgecert_acme::{
    extract_expiration_time, generate_csr, AcmeClient, AcmeError, AuthorizationChallenge,
    AuthorizationStatus, CertificateBundle, ChallengeStatus, LetsEncryptClient, OrderHandle,
};
use edgecert_cdn::{
    unique_certificate_name, AliyunCdnPublisher, CertificatePublisher, CertificateUpload,
    DEFAULT_CERTIFICATE_NAME_PREFIX,
};
use edgecert_core::{poll_until, Attempt, RetryPolicy};
use edgecert_dns::{
    CloudflareProvider, DnsProvider, DohResolver, MatchMode, PropagationVerifier,
    RecordProvisioner, TxtResolver,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RenewalConfig;
use crate::errors::RenewalError;
use crate::outcome::{RenewalOutcome, RenewalReport, RenewalRequest};
use crate::verification::ChallengeVerifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenewalState {
    Init,
    OrderCreated,
    DnsProvisioned,
    DnsPropagated,
    ChallengeVerified,
    OrderFinalized,
    CertificateIssued,
    Deployed,
    Done,
    Failed,
}

impl fmt::Display for RenewalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-run bookkeeping. Dropped when the run ends.
struct RunContext {
    run_id: Uuid,
    domain: String,
    state: RenewalState,
    history: Vec<RenewalState>,
    order: Option<OrderHandle>,
    /// Record names provisioned in this run, in creation order, deduplicated.
    created_records: Vec<String>,
    challenges: Vec<AuthorizationChallenge>,
}

impl RunContext {
    fn new(request: &RenewalRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            domain: request.domain.clone(),
            state: RenewalState::Init,
            history: vec![RenewalState::Init],
            order: None,
            created_records: Vec::new(),
            challenges: Vec::new(),
        }
    }

    fn transition(&mut self, next: RenewalState) {
        info!(
            run_id = %self.run_id,
            domain = %self.domain,
            from = %self.state,
            to = %next,
            "Renewal state transition"
        );
        self.state = next;
        self.history.push(next);
    }

    fn track_record(&mut self, record_name: &str) {
        if !self.created_records.iter().any(|r| r == record_name) {
            self.created_records.push(record_name.to_string());
        }
    }
}

/// Polling for an earlier authorization whose record name is about to be reused.
const AUTHORIZATION_POLL_ATTEMPTS: u32 = 20;
const AUTHORIZATION_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Drives a single-domain renewal from order creation to CDN deployment.
pub struct RenewalOrchestrator {
    acme: Arc<dyn AcmeClient>,
    authorization_policy: RetryPolicy,
    provisioner: RecordProvisioner,
    propagation: PropagationVerifier,
    verifier: ChallengeVerifier,
    publisher: Arc<dyn CertificatePublisher>,
    certificate_name_prefix: String,
}

impl RenewalOrchestrator {
    pub fn builder() -> RenewalOrchestratorBuilder {
        RenewalOrchestratorBuilder::new()
    }

    /// Wire the production collaborators described by `config`.
    pub fn from_config(config: &RenewalConfig) -> Result<Self, RenewalError> {
        let acme = LetsEncryptClient::new(
            config.acme.directory_url.clone(),
            config.acme.contact_email.clone(),
        );
        let dns = CloudflareProvider::with_base_url(
            config.dns.zone_id.clone(),
            config.dns.credentials.clone(),
            config.dns.api_base_url.clone(),
        )?;
        let resolver = DohResolver::new(config.dns.resolver_url.clone())?;
        let publisher = AliyunCdnPublisher::new(
            config.cdn.credentials.clone(),
            config.cdn.endpoint.clone(),
            config.cdn.region_id.clone(),
        )?;

        RenewalOrchestratorBuilder::new()
            .acme(Arc::new(acme))
            .dns_provider(Arc::new(dns))
            .resolver(Arc::new(resolver))
            .publisher(Arc::new(publisher))
            .match_mode(config.dns.match_mode)
            .certificate_name_prefix(config.cdn.certificate_name_prefix.clone())
            .build()
    }

    /// Run the whole workflow for `request`.
    ///
    /// Never returns an error: failures are logged and reported in the outcome.
    pub async fn run(&self, request: &RenewalRequest) -> RenewalOutcome {
        let mut ctx = RunContext::new(request);
        info!(
            run_id = %ctx.run_id,
            domain = %ctx.domain,
            trigger = %request.trigger,
            "Starting certificate renewal"
        );

        let issued = self.issue(&mut ctx).await;
        self.cleanup(&mut ctx).await;

        let result = match issued {
            Ok(bundle) => self.deploy(&mut ctx, request, bundle).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                ctx.transition(RenewalState::Done);
                info!(
                    run_id = %ctx.run_id,
                    domain = %ctx.domain,
                    certificate_name = %report.certificate_name,
                    "Certificate renewal completed"
                );
                RenewalOutcome::succeeded(report)
            }
            Err(e) => {
                let failed_in = ctx.state;
                ctx.transition(RenewalState::Failed);
                error!(
                    run_id = %ctx.run_id,
                    domain = %ctx.domain,
                    state = %failed_in,
                    history = ?ctx.history,
                    "Certificate renewal failed: {}",
                    e
                );
                RenewalOutcome::failed(&e)
            }
        }
    }

    async fn issue(&self, ctx: &mut RunContext) -> Result<CertificateBundle, RenewalError> {
        let order = self.acme.create_order(&ctx.domain).await?;
        ctx.order = Some(order.clone());
        ctx.transition(RenewalState::OrderCreated);

        let authorizations = self.acme.get_authorizations(&order).await?;
        for authz in &authorizations {
            if authz.status == AuthorizationStatus::Valid {
                info!(domain = %authz.domain, "Authorization already valid, skipping challenge");
                continue;
            }

            let dns01 = authz
                .dns01()
                .ok_or_else(|| RenewalError::ChallengeNotFound {
                    domain: authz.domain.clone(),
                })?;
            let key_authorization = self
                .acme
                .challenge_key_authorization(&order, dns01)
                .await?;
            let mut challenge =
                AuthorizationChallenge::dns01(&authz.domain, dns01, key_authorization);

            let result = self.process_challenge(ctx, &order, &mut challenge).await;
            if result.is_err() {
                challenge.status = ChallengeStatus::Failed;
            }
            ctx.challenges.push(challenge);
            result?;
        }

        self.acme.wait_for_valid_status(&order).await?;

        let csr = generate_csr(&ctx.domain)?;
        self.acme.finalize_order(&order, &csr.der).await?;
        ctx.transition(RenewalState::OrderFinalized);

        let certificate_chain_pem = self.acme.get_certificate(&order).await?;
        let not_after = match extract_expiration_time(&certificate_chain_pem) {
            Ok(not_after) => Some(not_after),
            Err(e) => {
                warn!(domain = %ctx.domain, "Could not read certificate expiry: {}", e);
                None
            }
        };
        ctx.transition(RenewalState::CertificateIssued);

        Ok(CertificateBundle {
            domain: ctx.domain.clone(),
            certificate_chain_pem,
            private_key: csr.private_key,
            generated_at: Utc::now(),
            not_after,
        })
    }

    async fn process_challenge(
        &self,
        ctx: &mut RunContext,
        order: &OrderHandle,
        challenge: &mut AuthorizationChallenge,
    ) -> Result<(), RenewalError> {
        let earlier = ctx
            .challenges
            .iter()
            .rev()
            .find(|c| c.record_name == challenge.record_name && c.status == ChallengeStatus::Valid)
            .map(|c| c.url.clone());
        if let Some(earlier_url) = earlier {
            self.wait_for_authorization_valid(order, &earlier_url).await?;
        }

        self.provisioner
            .provision(&challenge.record_name, &challenge.record_value)
            .await?;
        ctx.track_record(&challenge.record_name);
        challenge.status = ChallengeStatus::Provisioned;
        ctx.transition(RenewalState::DnsProvisioned);

        self.propagation
            .wait_for_txt(&challenge.record_name, &challenge.record_value)
            .await?;
        challenge.status = ChallengeStatus::Propagated;
        ctx.transition(RenewalState::DnsPropagated);

        challenge.status = ChallengeStatus::Verifying;
        self.verifier.verify(challenge).await?;
        self.acme.complete_challenge(order, challenge).await?;
        challenge.status = ChallengeStatus::Valid;
        ctx.transition(RenewalState::ChallengeVerified);

        Ok(())
    }

    /// Wait until the authorization owning `challenge_url` is valid.
    async fn wait_for_authorization_valid(
        &self,
        order: &OrderHandle,
        challenge_url: &str,
    ) -> Result<(), RenewalError> {
        info!(
            challenge_url,
            "Record name reused, waiting for the earlier authorization to become valid"
        );

        let result = poll_until(&self.authorization_policy, |attempt| async move {
            let authorizations = match self.acme.get_authorizations(order).await {
                Ok(authorizations) => authorizations,
                Err(e) => {
                    warn!(attempt, "Failed to fetch authorizations: {}", e);
                    return Attempt::Failed(e);
                }
            };

            let status = authorizations
                .iter()
                .find(|a| a.challenges.iter().any(|c| c.url == challenge_url))
                .map(|a| a.status);
            match status {
                Some(AuthorizationStatus::Valid) => Attempt::Done(Ok(attempt)),
                Some(AuthorizationStatus::Invalid) => Attempt::Done(Err(AcmeError::Protocol(
                    format!("authorization for challenge {} is invalid", challenge_url),
                ))),
                _ => Attempt::Pending,
            }
        })
        .await;

        match result {
            Ok(Ok(attempts)) => {
                debug!(challenge_url, attempts, "Earlier authorization is valid");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(exhausted) => Err(AcmeError::Timeout(format!(
                "authorization for challenge {} not valid after {} attempt(s)",
                challenge_url, exhausted.attempts
            ))
            .into()),
        }
    }

    /// Best effort: failures are logged, never returned.
    async fn cleanup(&self, ctx: &mut RunContext) {
        for record_name in &ctx.created_records {
            match self.provisioner.teardown(record_name).await {
                Ok(removed) => debug!(
                    run_id = %ctx.run_id,
                    record_name = %record_name,
                    removed,
                    "Challenge cleanup done"
                ),
                Err(e) => warn!(
                    run_id = %ctx.run_id,
                    record_name = %record_name,
                    "Failed to clean up challenge records: {}",
                    e
                ),
            }
        }

        if let Some(order) = ctx.order.take() {
            self.acme.release_order(&order).await;
        }
    }

    async fn deploy(
        &self,
        ctx: &mut RunContext,
        request: &RenewalRequest,
        bundle: CertificateBundle,
    ) -> Result<RenewalReport, RenewalError> {
        let certificate_name = unique_certificate_name(&self.certificate_name_prefix, Utc::now());
        let upload = CertificateUpload {
            domain: bundle.domain.clone(),
            certificate_name: certificate_name.clone(),
            certificate_chain_pem: bundle.certificate_chain_pem,
            private_key_pem: bundle.private_key.expose().to_string(),
        };

        let deployment = self.publisher.publish(&upload).await?;
        ctx.transition(RenewalState::Deployed);

        Ok(RenewalReport {
            run_id: ctx.run_id,
            domain: bundle.domain,
            trigger: request.trigger,
            certificate_name,
            issued_at: bundle.generated_at,
            not_after: bundle.not_after,
            authorizations: ctx.challenges.len(),
            deployment,
        })
    }
}

/// Builder for [`RenewalOrchestrator`]
pub struct RenewalOrchestratorBuilder {
    acme: Option<Arc<dyn AcmeClient>>,
    dns_provider: Option<Arc<dyn DnsProvider>>,
    resolver: Option<Arc<dyn TxtResolver>>,
    publisher: Option<Arc<dyn CertificatePublisher>>,
    match_mode: MatchMode,
    propagation_policy: Option<RetryPolicy>,
    verification_policy: Option<RetryPolicy>,
    certificate_name_prefix: Option<String>,
}

impl RenewalOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            acme: None,
            dns_provider: None,
            resolver: None,
            publisher: None,
            match_mode: MatchMode::default(),
            propagation_policy: None,
            verification_policy: None,
            certificate_name_prefix: None,
        }
    }

    pub fn acme(mut self, acme: Arc<dyn AcmeClient>) -> Self {
        self.acme = Some(acme);
        self
    }

    pub fn dns_provider(mut self, dns_provider: Arc<dyn DnsProvider>) -> Self {
        self.dns_provider = Some(dns_provider);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn TxtResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn CertificatePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }

    pub fn propagation_policy(mut self, policy: RetryPolicy) -> Self {
        self.propagation_policy = Some(policy);
        self
    }

    pub fn verification_policy(mut self, policy: RetryPolicy) -> Self {
        self.verification_policy = Some(policy);
        self
    }

    pub fn certificate_name_prefix(mut self, prefix: String) -> Self {
        self.certificate_name_prefix = Some(prefix);
        self
    }

    pub fn build(self) -> Result<RenewalOrchestrator, RenewalError> {
        let acme = self
            .acme
            .ok_or_else(|| RenewalError::Configuration("acme client is required".to_string()))?;
        let dns_provider = self
            .dns_provider
            .ok_or_else(|| RenewalError::Configuration("dns provider is required".to_string()))?;
        let resolver = self
            .resolver
            .ok_or_else(|| RenewalError::Configuration("txt resolver is required".to_string()))?;
        let publisher = self.publisher.ok_or_else(|| {
            RenewalError::Configuration("certificate publisher is required".to_string())
        })?;

        let mut propagation = PropagationVerifier::new(resolver, self.match_mode);
        if let Some(policy) = self.propagation_policy {
            propagation = propagation.with_policy(policy);
        }

        let mut verifier = ChallengeVerifier::new(acme.clone());
        if let Some(policy) = self.verification_policy {
            verifier = verifier.with_policy(policy);
        }

        Ok(RenewalOrchestrator {
            acme,
            authorization_policy: RetryPolicy::fixed(
                AUTHORIZATION_POLL_ATTEMPTS,
                AUTHORIZATION_POLL_INTERVAL,
            )
            .with_initial_delay(),
            provisioner: RecordProvisioner::new(dns_provider),
            propagation,
            verifier,
            publisher,
            certificate_name_prefix: self
                .certificate_name_prefix
                .unwrap_or_else(|| DEFAULT_CERTIFICATE_NAME_PREFIX.to_string()),
        })
    }
}

impl Default for RenewalOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
