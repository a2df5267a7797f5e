//! Root certificate authority.

use rcgen::{
    BasicConstraints, CertificateParams, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
    PKCS_ECDSA_P384_SHA384, SerialNumber,
};
use tracing::debug;

use super::{KeyMaterial, distinguished_name};
use crate::error::{Error, Result};

/// Serial number of the root certificate
pub const ROOT_SERIAL: u64 = 1;

/// Root validity from issuance (one year)
pub const ROOT_VALIDITY_DAYS: i64 = 365;

/// Generate a self-signed root key pair and certificate.
///
/// P-384 gives 192-bit security, above the strength of a 4096-bit RSA key.
pub fn issue_root() -> Result<KeyMaterial> {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(None);
    params.serial_number = Some(SerialNumber::from(ROOT_SERIAL));
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];

    let now = ::time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + ::time::Duration::days(ROOT_VALIDITY_DAYS);

    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384)
        .map_err(|e| Error::Crypto(format!("unable to generate root key: {}", e)))?;

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| Error::Crypto(format!("unable to create root certificate: {}", e)))?;

    debug!(not_after = %params.not_after, "Issued root certificate");

    Ok(KeyMaterial::new(key_pair.serialize_pem(), cert.pem()))
}
