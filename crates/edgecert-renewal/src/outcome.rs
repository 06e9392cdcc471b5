use chrono::Utc;
use edgecert_cdn::CdnUploadTransaction;
use edgecert_core::UtcDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::RenewalError;

/// What started a renewal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Scheduled,
    Http,
    Manual,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Scheduled => write!(f, "scheduled"),
            TriggerKind::Http => write!(f, "http"),
            TriggerKind::Manual => write!(f, "manual"),
        }
    }
}

/// One invocation of the workflow. Discarded when the run ends.
#[derive(Debug, Clone)]
pub struct RenewalRequest {
    pub domain: String,
    pub trigger: TriggerKind,
    pub requested_at: UtcDateTime,
}

impl RenewalRequest {
    pub fn new(domain: impl Into<String>, trigger: TriggerKind) -> Self {
        Self {
            domain: domain.into(),
            trigger,
            requested_at: Utc::now(),
        }
    }
}

/// Details of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RenewalReport {
    pub run_id: Uuid,
    pub domain: String,
    pub trigger: TriggerKind,
    pub certificate_name: String,
    pub issued_at: UtcDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<UtcDateTime>,
    /// Authorizations that needed a DNS-01 challenge.
    pub authorizations: usize,
    pub deployment: CdnUploadTransaction,
}

/// Result of a run as reported to triggers: `{success, result?, error?}`.
#[derive(Debug, Clone, Serialize)]
pub struct RenewalOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RenewalReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenewalOutcome {
    pub fn succeeded(report: RenewalReport) -> Self {
        Self {
            success: true,
            result: Some(report),
            error: None,
        }
    }

    pub fn failed(error: &RenewalError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_shape() {
        let outcome = RenewalOutcome::failed(&RenewalError::AlreadyRunning);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": "renewal already in progress"
            })
        );
    }

    #[test]
    fn test_trigger_kind_serialization() {
        assert_eq!(
            serde_json::to_value(TriggerKind::Scheduled).unwrap(),
            serde_json::json!("scheduled")
        );
        assert_eq!(TriggerKind::Http.to_string(), "http");
    }

    #[test]
    fn test_request_carries_trigger() {
        let request = RenewalRequest::new("example.com", TriggerKind::Manual);
        assert_eq!(request.domain, "example.com");
        assert_eq!(request.trigger, TriggerKind::Manual);
    }
}
