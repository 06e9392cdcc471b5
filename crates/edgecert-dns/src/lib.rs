//! DNS side of the DNS-01 challenge
//!
//! - [`DnsProvider`]: TXT record CRUD against the zone's authoritative provider
//!   ([`CloudflareProvider`]).
//! - [`TxtResolver`]: public TXT lookups used to observe propagation
//!   ([`DohResolver`]).
//! - [`RecordProvisioner`]: keeps at most one TXT record per challenge name.
//! - [`PropagationVerifier`]: polls the resolver until the value is visible.

pub mod cloudflare;
pub mod errors;
pub mod propagation;
pub mod provider;
pub mod provisioner;
pub mod resolver;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cloudflare::{CloudflareCredentials, CloudflareProvider, CLOUDFLARE_API_BASE};
pub use errors::DnsError;
pub use propagation::{normalize_txt_data, MatchMode, PropagationVerifier};
pub use provider::{DnsProvider, TxtRecord, TxtRecordRequest};
pub use provisioner::{RecordProvisioner, CHALLENGE_RECORD_COMMENT, CHALLENGE_RECORD_TTL};
pub use resolver::{DohResolver, TxtResolver, DEFAULT_DOH_URL};
