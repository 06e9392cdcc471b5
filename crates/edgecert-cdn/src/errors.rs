use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdnError {
    /// The CDN answered with an error code.
    #[error("{provider} API error {code}: {message}")]
    Api {
        provider: String,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}
