use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DnsError;

/// A TXT record as stored by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxtRecord {
    pub id: String,
    /// Fully qualified name, without a trailing dot.
    pub name: String,
    pub content: String,
    pub ttl: u32,
}

/// Request to create a TXT record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxtRecordRequest {
    pub name: String,
    pub content: String,
    pub ttl: u32,
    /// Route through the provider's edge network. Always false for challenges.
    pub proxied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Minimal record operations needed to publish a DNS-01 challenge.
///
/// Providers expose no finer filter than (name, type), so callers that need a
/// single record at a name must list and delete themselves.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn provider_name(&self) -> &'static str;

    /// All TXT records whose fully qualified name is `name`.
    async fn list_txt_records(&self, name: &str) -> Result<Vec<TxtRecord>, DnsError>;

    async fn create_txt_record(&self, request: &TxtRecordRequest) -> Result<TxtRecord, DnsError>;

    async fn delete_record(&self, record_id: &str) -> Result<(), DnsError>;
}
