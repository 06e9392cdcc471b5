use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::DnsError;
use crate::provider::{DnsProvider, TxtRecord, TxtRecordRequest};

/// TTL of challenge records, in seconds.
pub const CHALLENGE_RECORD_TTL: u32 = 120;
pub const CHALLENGE_RECORD_COMMENT: &str = "Let's Encrypt DNS-01 challenge";

/// Publishes challenge records so that at most one TXT record exists per name.
///
/// The provider offers no filter finer than (name, TXT), so every record at the
/// name is removed before the new one is created. Nothing here retries; a
/// failing provider call is reported to the caller as is.
pub struct RecordProvisioner {
    provider: Arc<dyn DnsProvider>,
}

impl RecordProvisioner {
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Replace whatever is published at `record_name` with a single TXT record
    /// holding `value`.
    ///
    /// A failure to list or delete existing records aborts before anything is
    /// created.
    pub async fn provision(&self, record_name: &str, value: &str) -> Result<TxtRecord, DnsError> {
        let removed = self.purge(record_name).await?;
        if removed > 0 {
            info!(record_name, removed, "Removed stale challenge record(s)");
        }

        let record = self
            .provider
            .create_txt_record(&TxtRecordRequest {
                name: record_name.to_string(),
                content: value.to_string(),
                ttl: CHALLENGE_RECORD_TTL,
                proxied: false,
                comment: Some(CHALLENGE_RECORD_COMMENT.to_string()),
            })
            .await?;

        info!(
            record_name,
            record_id = %record.id,
            provider = self.provider.provider_name(),
            "Created challenge TXT record"
        );
        Ok(record)
    }

    /// Remove every TXT record at `record_name`.
    ///
    /// Individual delete failures are logged and skipped so the remaining
    /// records still get removed. Returns how many were deleted; only a
    /// failure to list is an error.
    pub async fn teardown(&self, record_name: &str) -> Result<usize, DnsError> {
        let records = self.provider.list_txt_records(record_name).await?;

        let mut removed = 0;
        for record in &records {
            match self.provider.delete_record(&record.id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    record_name,
                    record_id = %record.id,
                    "Failed to delete challenge record: {}",
                    e
                ),
            }
        }

        info!(
            record_name,
            removed,
            found = records.len(),
            "Challenge records torn down"
        );
        Ok(removed)
    }

    async fn purge(&self, record_name: &str) -> Result<usize, DnsError> {
        let existing = self.provider.list_txt_records(record_name).await?;
        for record in &existing {
            debug!(record_name, record_id = %record.id, "Deleting existing TXT record");
            self.provider.delete_record(&record.id).await?;
        }
        Ok(existing.len())
    }
}
