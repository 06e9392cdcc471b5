//! Renewal settings shared by `serve` and `renew`.
//!
//! Every flag can also be given through its `EDGECERT_*` environment variable.

use anyhow::bail;
use clap::Args;
use edgecert_cdn::{AliyunCredentials, ALIYUN_CDN_ENDPOINT, DEFAULT_CERTIFICATE_NAME_PREFIX};
use edgecert_dns::{CloudflareCredentials, MatchMode, CLOUDFLARE_API_BASE, DEFAULT_DOH_URL};
use edgecert_renewal::config::DEFAULT_ACME_DIRECTORY_URL;
use edgecert_renewal::RenewalConfig;

#[derive(Args, Clone)]
pub struct RenewalArgs {
    /// Domain to renew (e.g. example.com or *.example.com)
    #[arg(long, env = "EDGECERT_DOMAIN")]
    pub domain: String,

    /// ACME directory URL
    #[arg(long, env = "EDGECERT_ACME_DIRECTORY_URL", default_value = DEFAULT_ACME_DIRECTORY_URL)]
    pub acme_directory_url: String,

    /// Contact email for the ACME account
    #[arg(long, env = "EDGECERT_ACME_EMAIL")]
    pub acme_email: String,

    /// Cloudflare zone id holding the domain
    #[arg(long, env = "EDGECERT_CF_ZONE_ID")]
    pub cf_zone_id: String,

    /// Cloudflare API token (preferred over email + global key)
    #[arg(long, env = "EDGECERT_CF_API_TOKEN", hide_env_values = true)]
    pub cf_api_token: Option<String>,

    /// Cloudflare account email, used with --cf-api-key
    #[arg(long, env = "EDGECERT_CF_EMAIL")]
    pub cf_email: Option<String>,

    /// Cloudflare global API key, used with --cf-email
    #[arg(long, env = "EDGECERT_CF_API_KEY", hide_env_values = true)]
    pub cf_api_key: Option<String>,

    /// Cloudflare API base URL
    #[arg(long, env = "EDGECERT_CF_API_URL", default_value = CLOUDFLARE_API_BASE)]
    pub cf_api_url: String,

    /// JSON DNS-over-HTTPS endpoint used to watch TXT propagation
    #[arg(long, env = "EDGECERT_DOH_URL", default_value = DEFAULT_DOH_URL)]
    pub doh_url: String,

    /// How the published TXT value is matched: exact or substring
    #[arg(long, env = "EDGECERT_TXT_MATCH", default_value = "exact")]
    pub txt_match: MatchMode,

    /// Aliyun AccessKey id
    #[arg(long, env = "EDGECERT_ALIYUN_ACCESS_KEY_ID")]
    pub aliyun_access_key_id: String,

    /// Aliyun AccessKey secret
    #[arg(long, env = "EDGECERT_ALIYUN_ACCESS_KEY_SECRET", hide_env_values = true)]
    pub aliyun_access_key_secret: String,

    /// Aliyun CDN API endpoint
    #[arg(long, env = "EDGECERT_CDN_ENDPOINT", default_value = ALIYUN_CDN_ENDPOINT)]
    pub cdn_endpoint: String,

    /// Aliyun region id sent with CDN calls, if any
    #[arg(long, env = "EDGECERT_CDN_REGION")]
    pub cdn_region: Option<String>,

    /// Prefix of the certificate name uploaded to the CDN
    #[arg(long, env = "EDGECERT_CERT_NAME_PREFIX", default_value = DEFAULT_CERTIFICATE_NAME_PREFIX)]
    pub cert_name_prefix: String,
}

impl RenewalArgs {
    pub fn into_config(self) -> anyhow::Result<RenewalConfig> {
        let dns_credentials = self.dns_credentials()?;

        let mut config = RenewalConfig::new(
            self.domain,
            self.acme_email,
            self.cf_zone_id,
            dns_credentials,
            AliyunCredentials {
                access_key_id: self.aliyun_access_key_id,
                access_key_secret: self.aliyun_access_key_secret,
            },
        );
        config.acme.directory_url = self.acme_directory_url;
        config.dns.api_base_url = self.cf_api_url;
        config.dns.resolver_url = self.doh_url;
        config.dns.match_mode = self.txt_match;
        config.cdn.endpoint = self.cdn_endpoint;
        config.cdn.region_id = self.cdn_region.filter(|r| !r.trim().is_empty());
        config.cdn.certificate_name_prefix = self.cert_name_prefix;

        Ok(config)
    }

    fn dns_credentials(&self) -> anyhow::Result<CloudflareCredentials> {
        if let Some(token) = self.cf_api_token.as_ref().filter(|t| !t.trim().is_empty()) {
            return Ok(CloudflareCredentials::ApiToken(token.clone()));
        }

        match (&self.cf_email, &self.cf_api_key) {
            (Some(email), Some(api_key)) => Ok(CloudflareCredentials::GlobalKey {
                email: email.clone(),
                api_key: api_key.clone(),
            }),
            _ => bail!(
                "Cloudflare credentials are missing: set EDGECERT_CF_API_TOKEN, \
                 or both EDGECERT_CF_EMAIL and EDGECERT_CF_API_KEY"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        renewal: RenewalArgs,
    }

    fn parse(extra: &[&str]) -> Result<RenewalArgs, clap::Error> {
        let mut args = vec![
            "edgecert",
            "--domain",
            "example.com",
            "--acme-email",
            "ops@example.com",
            "--cf-zone-id",
            "zone-1",
            "--aliyun-access-key-id",
            "ak",
            "--aliyun-access-key-secret",
            "sk",
        ];
        args.extend_from_slice(extra);
        TestCli::try_parse_from(args).map(|cli| cli.renewal)
    }

    #[test]
    fn test_api_token_config_uses_defaults() {
        let config = parse(&["--cf-api-token", "cf-token"])
            .unwrap()
            .into_config()
            .unwrap();

        assert_eq!(config.domain, "example.com");
        assert_eq!(config.acme.directory_url, DEFAULT_ACME_DIRECTORY_URL);
        assert!(matches!(
            config.dns.credentials,
            CloudflareCredentials::ApiToken(ref t) if t == "cf-token"
        ));
        assert_eq!(config.dns.match_mode, MatchMode::Exact);
        assert_eq!(config.cdn.certificate_name_prefix, "auto-renewed-cert");
        assert!(config.cdn.region_id.is_none());
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_global_key_and_overrides() {
        let config = parse(&[
            "--cf-email",
            "ops@example.com",
            "--cf-api-key",
            "global-key",
            "--txt-match",
            "substring",
            "--cdn-region",
            "cn-hangzhou",
            "--cert-name-prefix",
            "edge",
        ])
        .unwrap()
        .into_config()
        .unwrap();

        assert!(matches!(
            config.dns.credentials,
            CloudflareCredentials::GlobalKey { ref api_key, .. } if api_key == "global-key"
        ));
        assert_eq!(config.dns.match_mode, MatchMode::Substring);
        assert_eq!(config.cdn.region_id.as_deref(), Some("cn-hangzhou"));
        assert_eq!(config.cdn.certificate_name_prefix, "edge");
    }

    #[test]
    fn test_missing_cloudflare_credentials() {
        let err = parse(&["--cf-email", "ops@example.com"])
            .unwrap()
            .into_config()
            .unwrap_err();
        assert!(err.to_string().contains("EDGECERT_CF_API_TOKEN"));
    }

    #[test]
    fn test_invalid_match_mode_is_rejected() {
        assert!(parse(&["--cf-api-token", "t", "--txt-match", "fuzzy"]).is_err());
    }
}
