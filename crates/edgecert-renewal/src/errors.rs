use edgecert_acme::AcmeError;
use edgecert_cdn::CdnError;
use edgecert_dns::DnsError;
use thiserror::Error;

/// Everything that can end a renewal run.
#[derive(Error, Debug)]
pub enum RenewalError {
    #[error("No DNS-01 challenge offered for {domain}")]
    ChallengeNotFound { domain: String },

    #[error("DNS propagation timed out: {record_name} not visible after {attempts} attempt(s)")]
    DnsPropagationTimeout { record_name: String, attempts: u32 },

    #[error("Challenge verification for {domain} failed after {attempts} attempt(s): {last_error}")]
    ChallengeVerificationExhausted {
        domain: String,
        attempts: u32,
        last_error: String,
    },

    /// A DNS or CDN provider answered with an error.
    #[error("{provider} API error: {message}")]
    ProviderApi { provider: String, message: String },

    #[error("ACME error: {0}")]
    Acme(#[from] AcmeError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("renewal already in progress")]
    AlreadyRunning,

    #[error("Renewal task failed: {0}")]
    TaskFailed(String),
}

impl From<DnsError> for RenewalError {
    fn from(err: DnsError) -> Self {
        match err {
            DnsError::Api { provider, message } => RenewalError::ProviderApi { provider, message },
            DnsError::PropagationTimeout {
                record_name,
                attempts,
            } => RenewalError::DnsPropagationTimeout {
                record_name,
                attempts,
            },
            DnsError::InvalidCredentials(message) => RenewalError::Configuration(message),
            DnsError::Serialization(e) => RenewalError::ProviderApi {
                provider: "DNS".to_string(),
                message: format!("unexpected response: {}", e),
            },
            DnsError::Request(e) => RenewalError::Transport(e.to_string()),
            DnsError::Resolver(message) => RenewalError::Transport(message),
        }
    }
}

impl From<CdnError> for RenewalError {
    fn from(err: CdnError) -> Self {
        match err {
            CdnError::Api {
                provider,
                code,
                message,
                ..
            } => RenewalError::ProviderApi {
                provider,
                message: format!("{}: {}", code, message),
            },
            CdnError::InvalidResponse(message) => RenewalError::ProviderApi {
                provider: "CDN".to_string(),
                message,
            },
            CdnError::InvalidCredentials(message) => RenewalError::Configuration(message),
            CdnError::Request(e) => RenewalError::Transport(e.to_string()),
        }
    }
}
