use chrono::TimeZone;
use edgecert_core::UtcDateTime;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

use super::errors::AcmeError;
use super::models::PrivateKeyPem;

/// A DER-encoded CSR together with the freshly generated key it was signed with.
#[derive(Debug)]
pub struct CertificateSigningRequest {
    pub der: Vec<u8>,
    pub private_key: PrivateKeyPem,
}

/// Generate a key pair and a CSR for `domain`, the order's only identifier.
pub fn generate_csr(domain: &str) -> Result<CertificateSigningRequest, AcmeError> {
    let mut params = CertificateParams::new(vec![domain.to_string()])?;
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, domain.to_string());

    let private_key = KeyPair::generate()?;
    let csr = params.serialize_request(&private_key)?;

    Ok(CertificateSigningRequest {
        der: csr.der().to_vec(),
        private_key: PrivateKeyPem::new(private_key.serialize_pem()),
    })
}

/// `notAfter` of the leaf (first) certificate in a PEM chain.
pub fn extract_expiration_time(cert_pem: &str) -> Result<UtcDateTime, AcmeError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem.as_bytes()).map_err(|e| {
        AcmeError::CertificateGeneration(format!("Failed to parse PEM: {}", e))
    })?;

    let x509 = pem.parse_x509().map_err(|e| {
        AcmeError::CertificateGeneration(format!("Failed to parse X509: {}", e))
    })?;

    let not_after = x509.validity().not_after;

    chrono::Utc
        .timestamp_opt(not_after.timestamp(), 0)
        .single()
        .ok_or_else(|| {
            AcmeError::CertificateGeneration("Invalid expiration timestamp".to_string())
        })
}
