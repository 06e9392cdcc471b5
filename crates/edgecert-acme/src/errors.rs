use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcmeError {
    #[error("ACME error: {0}")]
    Protocol(String),

    #[error("Account error: {0}")]
    Account(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Challenge not found: {0}")]
    ChallengeNotFound(String),

    #[error("Challenge record {record_name} is not visible yet")]
    ChallengeNotVisible { record_name: String },

    #[error("Order {order_url} became invalid")]
    OrderInvalid { order_url: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("DNS lookup error: {0}")]
    Lookup(String),

    #[error("Certificate generation error: {0}")]
    CertificateGeneration(String),
}

impl From<instant_acme::Error> for AcmeError {
    fn from(err: instant_acme::Error) -> Self {
        AcmeError::Protocol(err.to_string())
    }
}

impl From<rcgen::Error> for AcmeError {
    fn from(err: rcgen::Error) -> Self {
        AcmeError::CertificateGeneration(err.to_string())
    }
}
