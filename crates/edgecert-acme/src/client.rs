use async_trait::async_trait;

use super::errors::AcmeError;
use super::models::{AcmeAuthorization, AcmeChallenge, AuthorizationChallenge, OrderHandle};

/// Operations the renewal workflow needs from an ACME server.
///
/// Implementations own every cryptographic detail (account key, JWS, key
/// authorization digests). Calls for one order are made strictly in sequence.
#[async_trait]
pub trait AcmeClient: Send + Sync {
    /// Create a new order for `domain`.
    async fn create_order(&self, domain: &str) -> Result<OrderHandle, AcmeError>;

    async fn get_authorizations(
        &self,
        order: &OrderHandle,
    ) -> Result<Vec<AcmeAuthorization>, AcmeError>;

    /// Value to publish for `challenge`. For DNS-01 this is the TXT record
    /// content (base64url SHA-256 of the key authorization).
    async fn challenge_key_authorization(
        &self,
        order: &OrderHandle,
        challenge: &AcmeChallenge,
    ) -> Result<String, AcmeError>;

    /// Check locally that the challenge response is in place before asking
    /// the server to validate it. Errors mean "not ready yet".
    async fn verify_challenge(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError>;

    /// Tell the server the challenge is ready to be validated.
    async fn complete_challenge(
        &self,
        order: &OrderHandle,
        challenge: &AuthorizationChallenge,
    ) -> Result<(), AcmeError>;

    /// Wait until every authorization of the order is valid.
    async fn wait_for_valid_status(&self, order: &OrderHandle) -> Result<(), AcmeError>;

    async fn finalize_order(&self, order: &OrderHandle, csr_der: &[u8]) -> Result<(), AcmeError>;

    /// PEM certificate chain of a finalized order.
    async fn get_certificate(&self, order: &OrderHandle) -> Result<String, AcmeError>;

    /// Forget any state held for `order`. Called once per order at the end of a run.
    async fn release_order(&self, _order: &OrderHandle) {}
}
