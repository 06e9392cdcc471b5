//! CDN certificate publishing
//!
//! The issued certificate is pushed to the CDN's edge TLS configuration in a
//! single signed API call. [`AliyunCdnPublisher`] implements the Aliyun CDN
//! `SetCdnDomainSSLCertificate` action using the RPC signature scheme in
//! [`signing`].

pub mod aliyun;
pub mod errors;
pub mod publisher;
pub mod signing;

pub use aliyun::{AliyunCdnPublisher, AliyunCredentials, ALIYUN_CDN_ENDPOINT};
pub use errors::CdnError;
pub use publisher::{
    unique_certificate_name, CdnUploadTransaction, CertificatePublisher, CertificateUpload,
    DEFAULT_CERTIFICATE_NAME_PREFIX,
};
