//! Cloudflare DNS provider
//!
//! Talks to the Cloudflare v4 REST API directly. Only the zone's TXT records
//! are touched, so the token needs nothing beyond `Zone:DNS:Edit`.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::errors::DnsError;
use crate::provider::{DnsProvider, TxtRecord, TxtRecordRequest};

pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

const PROVIDER_NAME: &str = "Cloudflare";

/// Cloudflare authentication.
///
/// Cloudflare supports two authentication methods:
/// 1. API Token (recommended) - Scoped tokens with specific permissions
/// 2. API Key + Email (legacy) - Global API key with email address
#[derive(Clone)]
pub enum CloudflareCredentials {
    ApiToken(String),
    GlobalKey { email: String, api_key: String },
}

impl CloudflareCredentials {
    fn validate(&self) -> Result<(), DnsError> {
        match self {
            CloudflareCredentials::ApiToken(token) if token.trim().is_empty() => Err(
                DnsError::InvalidCredentials("Cloudflare API token is empty".to_string()),
            ),
            CloudflareCredentials::GlobalKey { email, api_key }
                if email.trim().is_empty() || api_key.trim().is_empty() =>
            {
                Err(DnsError::InvalidCredentials(
                    "Cloudflare email and global API key are both required".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for CloudflareCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudflareCredentials::ApiToken(_) => f.write_str("ApiToken(<redacted>)"),
            CloudflareCredentials::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("email", email)
                .field("api_key", &"<redacted>")
                .finish(),
        }
    }
}

/// Cloudflare DNS provider scoped to one zone
pub struct CloudflareProvider {
    client: Client,
    zone_id: String,
    credentials: CloudflareCredentials,
    base_url: String,
}

/// Every Cloudflare v4 response is wrapped in this envelope
#[derive(Debug, Deserialize)]
struct CfEnvelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<CfMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CfMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CfDnsRecord {
    id: String,
    name: String,
    content: String,
    #[serde(default)]
    ttl: u32,
}

#[derive(Debug, Deserialize)]
struct CfDeletedRecord {
    #[allow(dead_code)]
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

impl From<CfDnsRecord> for TxtRecord {
    fn from(record: CfDnsRecord) -> Self {
        TxtRecord {
            id: record.id,
            name: record.name,
            content: record.content,
            ttl: record.ttl,
        }
    }
}

impl CloudflareProvider {
    pub fn new(
        zone_id: impl Into<String>,
        credentials: CloudflareCredentials,
    ) -> Result<Self, DnsError> {
        Self::with_base_url(zone_id, credentials, CLOUDFLARE_API_BASE)
    }

    /// Create a provider against a custom API base URL (proxies, tests)
    pub fn with_base_url(
        zone_id: impl Into<String>,
        credentials: CloudflareCredentials,
        base_url: impl Into<String>,
    ) -> Result<Self, DnsError> {
        let zone_id = zone_id.into();
        if zone_id.trim().is_empty() {
            return Err(DnsError::InvalidCredentials(
                "Cloudflare zone id is empty".to_string(),
            ));
        }
        credentials.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DnsError::api(PROVIDER_NAME, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            zone_id,
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Make an authenticated request and unwrap the response envelope
    async fn api_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&impl Serialize>,
    ) -> Result<T, DnsError> {
        let url = format!("{}/zones/{}{}", self.base_url, self.zone_id, path);

        debug!("Cloudflare API request: {} {}", method, path);

        let mut request = self.client.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }

        request = match &self.credentials {
            CloudflareCredentials::ApiToken(token) => request.bearer_auth(token),
            CloudflareCredentials::GlobalKey { email, api_key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", api_key),
        };

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: CfEnvelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(DnsError::Serialization(e)),
            Err(_) => {
                return Err(DnsError::api(
                    PROVIDER_NAME,
                    format!("API returned status {}: {}", status, body),
                ))
            }
        };

        if !status.is_success() || !envelope.success {
            return Err(DnsError::api(
                PROVIDER_NAME,
                Self::describe_errors(status, &envelope.errors),
            ));
        }

        envelope.result.ok_or_else(|| {
            DnsError::api(PROVIDER_NAME, "Response did not contain a result".to_string())
        })
    }

    fn describe_errors(status: reqwest::StatusCode, errors: &[CfMessage]) -> String {
        if errors.is_empty() {
            return format!("API returned status {}", status);
        }
        errors
            .iter()
            .map(|e| format!("({}) {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn list_txt_records(&self, name: &str) -> Result<Vec<TxtRecord>, DnsError> {
        let records: Vec<CfDnsRecord> = self
            .api_request(
                Method::GET,
                "/dns_records",
                &[("name", name), ("type", "TXT")],
                None::<&()>,
            )
            .await?;

        Ok(records.into_iter().map(TxtRecord::from).collect())
    }

    async fn create_txt_record(&self, request: &TxtRecordRequest) -> Result<TxtRecord, DnsError> {
        let body = CreateRecordRequest {
            record_type: "TXT",
            name: &request.name,
            content: &request.content,
            ttl: request.ttl,
            proxied: request.proxied,
            comment: request.comment.as_deref(),
        };

        let record: CfDnsRecord = self
            .api_request(Method::POST, "/dns_records", &[], Some(&body))
            .await?;

        Ok(record.into())
    }

    async fn delete_record(&self, record_id: &str) -> Result<(), DnsError> {
        let _: CfDeletedRecord = self
            .api_request(
                Method::DELETE,
                &format!("/dns_records/{}", record_id),
                &[],
                None::<&()>,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_are_redacted() {
        let token = CloudflareCredentials::ApiToken("secret-token".to_string());
        assert_eq!(format!("{:?}", token), "ApiToken(<redacted>)");

        let global = CloudflareCredentials::GlobalKey {
            email: "ops@example.com".to_string(),
            api_key: "secret-key".to_string(),
        };
        let printed = format!("{:?}", global);
        assert!(printed.contains("ops@example.com"));
        assert!(!printed.contains("secret-key"));
    }

    #[test]
    fn test_rejects_empty_credentials() {
        let err = CloudflareProvider::new("zone", CloudflareCredentials::ApiToken(" ".to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, DnsError::InvalidCredentials(_)));

        let err = CloudflareProvider::new("", CloudflareCredentials::ApiToken("t".to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, DnsError::InvalidCredentials(_)));

        let err = CloudflareProvider::new(
            "zone",
            CloudflareCredentials::GlobalKey {
                email: "ops@example.com".to_string(),
                api_key: String::new(),
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, DnsError::InvalidCredentials(_)));
    }

    #[test]
    fn test_describe_errors() {
        let errors = vec![
            CfMessage {
                code: 9109,
                message: "Invalid access token".to_string(),
            },
            CfMessage {
                code: 10000,
                message: "Authentication error".to_string(),
            },
        ];
        assert_eq!(
            CloudflareProvider::describe_errors(reqwest::StatusCode::FORBIDDEN, &errors),
            "(9109) Invalid access token; (10000) Authentication error"
        );
        assert_eq!(
            CloudflareProvider::describe_errors(reqwest::StatusCode::BAD_GATEWAY, &[]),
            "API returned status 502 Bad Gateway"
        );
    }
}
