//! Self-issued PKI for the webhook's TLS identity.
//!
//! The process is its own certificate authority:
//!
//! - [`issue_root`] generates a self-signed root (ECDSA P-384, 1 year)
//! - [`issue_leaf`] generates the serving certificate (ECDSA P-256) signed by
//!   the root and bound to an [`IdentityProfile`]
//!
//! The root certificate is published to the cluster as the webhook's CA
//! bundle and the leaf terminates TLS. Nothing is written to disk; every start
//! issues fresh material.

mod authority;
mod issuer;

use std::fmt;
use std::net::IpAddr;

use rcgen::{DistinguishedName, DnType, DnValue, SanType, string::Ia5String};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName};

use crate::error::{Error, Result};

pub use authority::{ROOT_SERIAL, ROOT_VALIDITY_DAYS, issue_root};
pub use issuer::{LEAF_SERIAL, issue_leaf};

/// Organization asserted by every certificate we issue
pub const ORGANIZATION: &str = "muting.io";

/// Which half of a key pair to retrieve
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PemRole {
    /// PKCS#8 private key
    Key,
    /// X.509 certificate
    Certificate,
}

/// A private key and its certificate, both PEM encoded
#[derive(Clone)]
pub struct KeyMaterial {
    key_pem: String,
    certificate_pem: String,
}

impl KeyMaterial {
    pub(crate) fn new(key_pem: String, certificate_pem: String) -> Self {
        Self {
            key_pem,
            certificate_pem,
        }
    }

    /// Raw PEM bytes for the requested role
    pub fn pem(&self, role: PemRole) -> &[u8] {
        match role {
            PemRole::Key => self.key_pem.as_bytes(),
            PemRole::Certificate => self.certificate_pem.as_bytes(),
        }
    }

    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// DER encoding of the certificate
    pub fn certificate_der(&self) -> Result<CertificateDer<'static>> {
        rustls_pemfile::certs(&mut self.certificate_pem.as_bytes())
            .next()
            .ok_or_else(|| Error::Crypto("no certificate in PEM data".to_string()))?
            .map_err(|e| Error::Crypto(format!("unable to decode certificate PEM: {}", e)))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_pem", &"<redacted>")
            .field("certificate_pem", &self.certificate_pem)
            .finish()
    }
}

/// Names the serving certificate must assert
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityProfile {
    common_name: String,
    alt_names: Vec<String>,
}

impl IdentityProfile {
    /// Build a profile, rejecting names unusable for TLS server-name matching
    pub fn new(common_name: impl Into<String>, alt_names: Vec<String>) -> Result<Self> {
        let common_name = common_name.into();
        if alt_names.is_empty() {
            return Err(Error::Config(
                "identity profile needs at least one alternate name".to_string(),
            ));
        }
        for name in std::iter::once(&common_name).chain(alt_names.iter()) {
            ServerName::try_from(name.as_str()).map_err(|e| {
                Error::Config(format!("invalid server name '{}': {}", name, e))
            })?;
        }
        Ok(Self {
            common_name,
            alt_names,
        })
    }

    /// Profile for an in-cluster service: `<svc>`, `<svc>.<ns>`, `<svc>.<ns>.svc`
    pub fn for_service(service: &str, namespace: &str) -> Result<Self> {
        let fqdn = format!("{}.{}.svc", service, namespace);
        Self::new(
            fqdn.clone(),
            vec![
                service.to_string(),
                format!("{}.{}", service, namespace),
                fqdn,
            ],
        )
    }

    /// Profile for an externally reachable host
    pub fn for_host(host: &str) -> Result<Self> {
        Self::new(host, vec![host.to_string()])
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn alt_names(&self) -> &[String] {
        &self.alt_names
    }
}

impl fmt::Display for IdentityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Common Name: {}", self.common_name)?;
        for name in &self.alt_names {
            write!(f, "\nDNS Name: {}", name)?;
        }
        Ok(())
    }
}

/// Subject with the fixed organization and an optional common name
fn distinguished_name(common_name: Option<&str>) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    if let Some(cn) = common_name {
        dn.push(DnType::CommonName, DnValue::Utf8String(cn.to_string()));
    }
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String(ORGANIZATION.to_string()),
    );
    dn
}

/// Convert a profile name into a SAN entry
fn san_entry(name: &str) -> Result<SanType> {
    if let Ok(ip) = name.parse::<IpAddr>() {
        return Ok(SanType::IpAddress(ip));
    }
    Ia5String::try_from(name.to_string())
        .map(SanType::DnsName)
        .map_err(|e| Error::Crypto(format!("invalid DNS name '{}': {}", name, e)))
}

/// Install aws-lc-rs as the process-wide rustls provider.
///
/// The kube client builds its TLS config from the process default, and with
/// both `ring` and `aws-lc-rs` compiled in rustls cannot pick one on its own.
/// Calling this again after a provider is in place is a no-op.
pub fn install_crypto_provider() -> Result<()> {
    if CryptoProvider::get_default().is_some() {
        return Ok(());
    }
    match rustls::crypto::aws_lc_rs::default_provider().install_default() {
        Ok(()) => Ok(()),
        Err(_) if CryptoProvider::get_default().is_some() => Ok(()),
        Err(_) => Err(Error::Crypto(
            "unable to install the aws-lc-rs TLS provider".to_string(),
        )),
    }
}
