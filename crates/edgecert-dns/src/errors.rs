//! DNS error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DnsError {
    /// The provider answered and reported a failure.
    #[error("{provider} API error: {message}")]
    Api { provider: String, message: String },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Resolver error: {0}")]
    Resolver(String),

    #[error("TXT record {record_name} not visible after {attempts} attempt(s)")]
    PropagationTimeout { record_name: String, attempts: u32 },
}

impl DnsError {
    pub fn api(provider: &str, message: impl Into<String>) -> Self {
        DnsError::Api {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}
