use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::errors::DnsError;

pub const DEFAULT_DOH_URL: &str = "https://dns.google/resolve";

/// DNS RR type code for TXT.
const TXT_RR_TYPE: u16 = 16;
const NXDOMAIN: u32 = 3;

/// Public TXT lookup, as seen from outside the provider.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// Raw `data` strings of every TXT answer for `name`. An empty list means
    /// the name has no TXT records yet.
    async fn resolve_txt(&self, name: &str) -> Result<Vec<String>, DnsError>;
}

/// JSON DNS-over-HTTPS resolver (`dns.google/resolve`, `cloudflare-dns.com/dns-query`).
pub struct DohResolver {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status", default)]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: Option<u16>,
    data: String,
}

impl DohResolver {
    pub fn new(url: impl Into<String>) -> Result<Self, DnsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DnsError::Resolver(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TxtResolver for DohResolver {
    async fn resolve_txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("name", name), ("type", "TXT")])
            .header("Accept", "application/dns-json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DnsError::Resolver(format!(
                "{} returned status {}",
                self.url, status
            )));
        }

        let body: DohResponse = response.json().await?;
        match body.status {
            0 => {}
            NXDOMAIN => return Ok(Vec::new()),
            rcode => {
                return Err(DnsError::Resolver(format!(
                    "lookup of {} failed with rcode {}",
                    name, rcode
                )))
            }
        }

        // CNAME answers in the chain carry no TXT data
        let values: Vec<String> = body
            .answer
            .into_iter()
            .filter(|a| a.record_type.map_or(true, |t| t == TXT_RR_TYPE))
            .map(|a| a.data)
            .collect();

        debug!("DoH lookup of {} returned {} TXT answer(s)", name, values.len());
        Ok(values)
    }
}
