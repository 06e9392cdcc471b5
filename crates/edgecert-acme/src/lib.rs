//! ACME capability for DNS-01 certificate issuance
//!
//! The renewal workflow only talks to the [`AcmeClient`] trait. The
//! [`LetsEncryptClient`] implementation wraps `instant-acme`; account keys,
//! JWS signing and order bookkeeping stay inside it.

pub mod client;
pub mod csr;
pub mod errors;
pub mod letsencrypt;
pub mod models;

pub use client::AcmeClient;
pub use csr::{extract_expiration_time, generate_csr, CertificateSigningRequest};
pub use errors::AcmeError;
pub use letsencrypt::LetsEncryptClient;
pub use models::{
    challenge_record_name, AcmeAuthorization, AcmeChallenge, AuthorizationChallenge,
    AuthorizationStatus, CertificateBundle, ChallengeStatus, ChallengeType, OrderHandle,
    PrivateKeyPem, ACME_CHALLENGE_PREFIX,
};
