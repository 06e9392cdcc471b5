use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use instant_acme::{
    Account, AuthorizationStatus as AcmeAuthorizationStatus, ChallengeType as AcmeChallengeType,
    Identifier, NewAccount, NewOrder, Order, OrderStatus,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info};

use super::client::AcmeClient;
use super::errors::AcmeError;
use super::models::{
    AcmeAuthorization, AcmeChallenge, AuthorizationChallenge, AuthorizationStatus,
    ChallengeType, OrderHandle,
};

/// Public nameservers used for the local pre-validation lookup.
const VERIFY_NAMESERVERS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), // Google DNS
    IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), // Cloudflare DNS
];

const CERTIFICATE_POLL_ATTEMPTS: u32 = 30;

/// [`AcmeClient`] backed by `instant-acme`.
///
/// The account is registered on first use and kept for the lifetime of the
/// process. Live orders are held in memory, keyed by order URL.
pub struct LetsEncryptClient {
    directory_url: String,
    contact_email: String,
    account: OnceCell<Account>,
    orders: Mutex<HashMap<String, Order>>,
    resolver: TokioResolver,
}

impl LetsEncryptClient {
    pub fn new(directory_url: impl Into<String>, contact_email: impl Into<String>) -> Self {
        Self {
            directory_url: directory_url.into(),
            contact_email: contact_email.into(),
            account: OnceCell::new(),
            orders: Mutex::new(HashMap::new()),
            resolver: Self::create_resolver(),
        }
    }

    pub fn production_directory() -> &'static str {
        instant_acme::LetsEncrypt::Production.url()
    }

    pub fn staging_directory() -> &'static str {
        instant_acme::LetsEncrypt::Staging.url()
    }

    fn create_resolver() -> TokioResolver {
        let mut resolver_config = ResolverConfig::new();
        for ip in VERIFY_NAMESERVERS {
            resolver_config.add_name_server(NameServerConfig::new(
                SocketAddr::new(ip, 53),
                Protocol::Udp,
            ));
        }

        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(5);
        opts.attempts = 2;
        opts.cache_size = 0; // Every verification must see fresh answers

        Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
            .with_options(opts)
            .build()
    }

    async fn account(&self) -> Result<&Account, AcmeError> {
        self.account
            .get_or_try_init(|| async {
                info!(
                    "Creating ACME account for {} at {}",
                    self.contact_email, self.directory_url
                );
                let contact = format!("mailto:{}", self.contact_email);
                let (account, _credentials) = Account::create(
                    &NewAccount {
                        contact: &[contact.as_str()],
                        terms_of_service_agreed: true,
                        only_return_existing: false,
                    },
                    &self.directory_url,
                    None,
                )
                .await
                .map_err(|e| AcmeError::Account(e.to_string()))?;
                Ok(account)
            })
            .await
    }

    fn map_challenge_type(challenge_type: &AcmeChallengeType) -> ChallengeType {
        #[allow(unreachable_patterns)]
        match challenge_type {
            AcmeChallengeType::Http01 => ChallengeType::Http01,
            AcmeChallengeType::Dns01 => ChallengeType::Dns01,
            AcmeChallengeType::TlsAlpn01 => ChallengeType::TlsAlpn01,
            _ => ChallengeType::Unknown,
        }
    }

    fn map_authorization(authz: &instant_acme::Authorization) -> AcmeAuthorization {
        #[allow(unreachable_patterns)]
        let domain = match &authz.identifier {
            Identifier::Dns(domain) => domain.clone(),
            other => format!("{:?}", other),
        };

        let status = match authz.status {
            AcmeAuthorizationStatus::Pending => AuthorizationStatus::Pending,
            AcmeAuthorizationStatus::Valid => AuthorizationStatus::Valid,
            AcmeAuthorizationStatus::Invalid => AuthorizationStatus::Invalid,
            _ => AuthorizationStatus::Other,
        };

        AcmeAuthorization {
            domain,
            status,
            challenges: authz
                .challenges
                .iter()
                .map(|c| AcmeChallenge {
                    challenge_type: Self::map_challenge_type(&c.r#type),
                    url: c.url.clone(),
                    token: c.token.clone(),
                })
                .collect(),
        }
    }

    async fn txt_values(&self, record_name: &str) -> Result<Vec<String>, AcmeError> {
        let lookup = self
            .resolver
            .txt_lookup(record_name)
            .await
            .map_err(|e| AcmeError::Lookup(format!("{}: {}", record_name, e)))?;

        Ok(lookup
            .iter()
            .map(|record| {
                // TXT records can carry several character strings
                record
                    .txt_data()
                    .iter()
                    .map(|data| String::from_utf8_lossy(data))
                    .collect::<String>()
            })
            .collect())
    }
}

#[async_trait]
impl AcmeClient for LetsEncryptClient {
    async fn create_order(&self, domain: &str) -> Result<OrderHandle, AcmeError> {
        // A wildcard order gets no base-name identifier: both would share
        // one challenge record name
        let identifiers = [Identifier::Dns(domain.to_string())];

        let account = self.account().await?;
        let order = account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await?;

        let handle = OrderHandle {
            url: order.url().to_string(),
            domain: domain.to_string(),
        };
        info!("Created ACME order {} for {}", handle.url, domain);

        self.orders.lock().await.insert(handle.url.clone(), order);
        Ok(handle)
    }

    async fn get_authorizations(
        &self,
        order: &OrderHandle,
    ) -> Result<Vec<AcmeAuthorization>, AcmeError> {
        let mut orders = self.orders.lock().await;
        let live = orders
            .get_mut(&order.url)
            .ok_or_else(|| AcmeError::UnknownOrder(order.url.clone()))?;

        let authorizations = live.authorizations().await?;
        debug!(
            "Order {} has {} authorization(s)",
            order.url,
            authorizations.len()
        );
        Ok(authorizations.iter().map(Self::map_authorization).collect())
    }

    async fn challenge_key_authorization(
        &self,
        order: &OrderHandle,
        challenge: &AcmeChallenge,
    ) -> Result<String, AcmeError> {
        let mut orders = self.orders.lock().await;
        let live = orders
            .get_mut(&order.url)
            .ok_or_else(|| AcmeError::UnknownOrder(order.url.clone()))?;

        let authorizations = live.authorizations().await?;
        let acme_challenge = authorizations
            .iter()
            .flat_map(|authz| authz.challenges.iter())
            .find(|c| c.url == challenge.url)
            .ok_or_else(|| AcmeError::ChallengeNotFound(challenge.url.clone()))?;

        let key_authorization = live.key_authorization(acme_challenge);
        Ok(match challenge.challenge_type {
            ChallengeType::Dns01 => key_authorization.dns_value(),
            _ => key_authorization.as_str().to_string(),
        })
    }

    async fn verify_challenge(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError> {
        let values = self.txt_values(&challenge.record_name).await?;
        debug!(
            "Local lookup of {} returned {} TXT value(s)",
            challenge.record_name,
            values.len()
        );

        if values.iter().any(|v| v == &challenge.record_value) {
            Ok(())
        } else {
            Err(AcmeError::ChallengeNotVisible {
                record_name: challenge.record_name.clone(),
            })
        }
    }

    async fn complete_challenge(
        &self,
        order: &OrderHandle,
        challenge: &AuthorizationChallenge,
    ) -> Result<(), AcmeError> {
        let mut orders = self.orders.lock().await;
        let live = orders
            .get_mut(&order.url)
            .ok_or_else(|| AcmeError::UnknownOrder(order.url.clone()))?;

        debug!(
            "Setting challenge ready for {} (URL: {})",
            challenge.domain, challenge.url
        );
        live.set_challenge_ready(&challenge.url).await?;
        Ok(())
    }

    async fn wait_for_valid_status(&self, order: &OrderHandle) -> Result<(), AcmeError> {
        const MAX_ATTEMPTS: u8 = 6;
        const BASE_DELAY_SECS: u64 = 1;
        const MAX_DELAY_SECS: u64 = 30;

        let mut orders = self.orders.lock().await;
        let live = orders
            .get_mut(&order.url)
            .ok_or_else(|| AcmeError::UnknownOrder(order.url.clone()))?;

        for attempt in 1..=MAX_ATTEMPTS {
            // Exponential backoff: 1s, 2s, 4s, 8s, 16s, 30s (capped)
            let delay_secs = std::cmp::min(
                BASE_DELAY_SECS * 2u64.pow((attempt - 1) as u32),
                MAX_DELAY_SECS,
            );
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            let state = live.refresh().await?;

            match state.status {
                OrderStatus::Ready | OrderStatus::Valid => {
                    info!("Order is ready after {} attempt(s)", attempt);
                    return Ok(());
                }
                OrderStatus::Invalid => {
                    error!("Order {} is invalid after {} attempt(s)", order.url, attempt);
                    return Err(AcmeError::OrderInvalid {
                        order_url: order.url.clone(),
                    });
                }
                _ => {
                    debug!(
                        "Order not ready yet (attempt {}/{})",
                        attempt, MAX_ATTEMPTS
                    );
                }
            }
        }

        Err(AcmeError::Timeout(format!(
            "Order {} did not become ready after {} attempts",
            order.url, MAX_ATTEMPTS
        )))
    }

    async fn finalize_order(&self, order: &OrderHandle, csr_der: &[u8]) -> Result<(), AcmeError> {
        let mut orders = self.orders.lock().await;
        let live = orders
            .get_mut(&order.url)
            .ok_or_else(|| AcmeError::UnknownOrder(order.url.clone()))?;

        live.finalize(csr_der).await?;
        info!("Finalized order {}", order.url);
        Ok(())
    }

    async fn get_certificate(&self, order: &OrderHandle) -> Result<String, AcmeError> {
        let mut orders = self.orders.lock().await;
        let live = orders
            .get_mut(&order.url)
            .ok_or_else(|| AcmeError::UnknownOrder(order.url.clone()))?;

        for _ in 0..CERTIFICATE_POLL_ATTEMPTS {
            match live.certificate().await? {
                Some(chain) => return Ok(chain),
                None => tokio::time::sleep(Duration::from_secs(1)).await,
            }
        }

        Err(AcmeError::Timeout(format!(
            "Certificate for order {} was not issued in time",
            order.url
        )))
    }

    async fn release_order(&self, order: &OrderHandle) {
        self.orders.lock().await.remove(&order.url);
    }
}
