//! Renewal configuration
//!
//! Built once at startup (see the `edgecert` binary) and shared read-only
//! afterwards. Nothing below reads the environment.

use edgecert_cdn::{AliyunCredentials, ALIYUN_CDN_ENDPOINT, DEFAULT_CERTIFICATE_NAME_PREFIX};
use edgecert_dns::{CloudflareCredentials, MatchMode, CLOUDFLARE_API_BASE, DEFAULT_DOH_URL};
use std::fmt;

use crate::errors::RenewalError;

/// Let's Encrypt production directory.
pub const DEFAULT_ACME_DIRECTORY_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";

#[derive(Debug, Clone)]
pub struct AcmeSettings {
    pub directory_url: String,
    pub contact_email: String,
}

#[derive(Debug, Clone)]
pub struct DnsSettings {
    pub zone_id: String,
    pub credentials: CloudflareCredentials,
    pub api_base_url: String,
    /// JSON DNS-over-HTTPS endpoint used to watch propagation.
    pub resolver_url: String,
    pub match_mode: MatchMode,
}

#[derive(Debug, Clone)]
pub struct CdnSettings {
    pub credentials: AliyunCredentials,
    pub endpoint: String,
    pub region_id: Option<String>,
    pub certificate_name_prefix: String,
}

#[derive(Clone)]
pub struct RenewalConfig {
    pub domain: String,
    pub acme: AcmeSettings,
    pub dns: DnsSettings,
    pub cdn: CdnSettings,
    /// Shared secret expected in `Authorization: Bearer` by the HTTP trigger.
    pub trigger_token: Option<String>,
}

impl RenewalConfig {
    /// A configuration with default endpoints for everything but the
    /// identifiers and credentials passed in.
    pub fn new(
        domain: impl Into<String>,
        contact_email: impl Into<String>,
        zone_id: impl Into<String>,
        dns_credentials: CloudflareCredentials,
        cdn_credentials: AliyunCredentials,
    ) -> Self {
        Self {
            domain: domain.into(),
            acme: AcmeSettings {
                directory_url: DEFAULT_ACME_DIRECTORY_URL.to_string(),
                contact_email: contact_email.into(),
            },
            dns: DnsSettings {
                zone_id: zone_id.into(),
                credentials: dns_credentials,
                api_base_url: CLOUDFLARE_API_BASE.to_string(),
                resolver_url: DEFAULT_DOH_URL.to_string(),
                match_mode: MatchMode::default(),
            },
            cdn: CdnSettings {
                credentials: cdn_credentials,
                endpoint: ALIYUN_CDN_ENDPOINT.to_string(),
                region_id: None,
                certificate_name_prefix: DEFAULT_CERTIFICATE_NAME_PREFIX.to_string(),
            },
            trigger_token: None,
        }
    }

    pub fn with_trigger_token(mut self, token: impl Into<String>) -> Self {
        self.trigger_token = Some(token.into());
        self
    }

    /// Check that every required value is present.
    ///
    /// `require_trigger_token` is set when the HTTP trigger will be served.
    pub fn validate(&self, require_trigger_token: bool) -> Result<(), RenewalError> {
        let required = [
            ("domain", self.domain.as_str()),
            ("ACME directory URL", self.acme.directory_url.as_str()),
            ("ACME contact email", self.acme.contact_email.as_str()),
            ("DNS zone id", self.dns.zone_id.as_str()),
            ("DNS resolver URL", self.dns.resolver_url.as_str()),
            ("CDN access key id", self.cdn.credentials.access_key_id.as_str()),
            (
                "CDN access key secret",
                self.cdn.credentials.access_key_secret.as_str(),
            ),
            ("CDN endpoint", self.cdn.endpoint.as_str()),
            (
                "certificate name prefix",
                self.cdn.certificate_name_prefix.as_str(),
            ),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(RenewalError::Configuration(format!("{} is required", name)));
            }
        }

        if !self.acme.contact_email.contains('@') {
            return Err(RenewalError::Configuration(format!(
                "ACME contact email '{}' is not an email address",
                self.acme.contact_email
            )));
        }

        match &self.dns.credentials {
            CloudflareCredentials::ApiToken(token) if token.trim().is_empty() => {
                return Err(RenewalError::Configuration(
                    "Cloudflare API token is required".to_string(),
                ))
            }
            CloudflareCredentials::GlobalKey { email, api_key }
                if email.trim().is_empty() || api_key.trim().is_empty() =>
            {
                return Err(RenewalError::Configuration(
                    "Cloudflare email and API key are required".to_string(),
                ))
            }
            _ => {}
        }

        if require_trigger_token
            && self
                .trigger_token
                .as_deref()
                .map_or(true, |t| t.trim().is_empty())
        {
            return Err(RenewalError::Configuration(
                "trigger token is required to serve the HTTP trigger".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for RenewalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenewalConfig")
            .field("domain", &self.domain)
            .field("acme", &self.acme)
            .field("dns", &self.dns)
            .field("cdn", &self.cdn)
            .field(
                "trigger_token",
                &self.trigger_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
