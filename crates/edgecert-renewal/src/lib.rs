//! Certificate renewal workflow
//!
//! [`RenewalOrchestrator`] drives one renewal run from ACME order creation to
//! CDN deployment. [`RenewalRunner`] wraps it so that overlapping triggers in
//! the same process never run two renewals at once.

pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod outcome;
pub mod runner;
pub mod verification;

pub use config::{AcmeSettings, CdnSettings, DnsSettings, RenewalConfig};
pub use errors::RenewalError;
pub use orchestrator::{RenewalOrchestrator, RenewalOrchestratorBuilder, RenewalState};
pub use outcome::{RenewalOutcome, RenewalReport, RenewalRequest, TriggerKind};
pub use runner::{RenewalRunner, Renewer};
pub use verification::ChallengeVerifier;
