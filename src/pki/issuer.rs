//! Leaf (serving) certificate issuance.

use rcgen::{
    CertificateParams, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyIdMethod, KeyPair,
    KeyUsagePurpose, PKCS_ECDSA_P256_SHA256, SerialNumber,
};
use tracing::debug;
use x509_parser::prelude::*;

use super::{IdentityProfile, KeyMaterial, distinguished_name, san_entry};
use crate::error::{Error, Result};

/// Serial number of the leaf certificate
pub const LEAF_SERIAL: u64 = 2;

/// Issue a serving certificate for `profile`, signed by `root`.
///
/// The leaf is valid from now until the root expires, so its window always
/// sits inside the root's.
pub fn issue_leaf(root: &KeyMaterial, profile: &IdentityProfile) -> Result<KeyMaterial> {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(Some(profile.common_name()));
    params.subject_alt_names = profile
        .alt_names()
        .iter()
        .map(|name| san_entry(name))
        .collect::<Result<Vec<_>>>()?;
    params.serial_number = Some(SerialNumber::from(LEAF_SERIAL));
    // rcgen only writes a subject key identifier alongside an explicit CA flag
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];
    params.key_identifier_method = KeyIdMethod::Sha256;
    params.use_authority_key_identifier_extension = true;

    params.not_before = ::time::OffsetDateTime::now_utc();
    params.not_after = root_not_after(root)?;

    let leaf_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
        .map_err(|e| Error::Crypto(format!("unable to generate leaf key: {}", e)))?;

    let root_key = KeyPair::from_pem(root.key_pem())
        .map_err(|e| Error::Crypto(format!("unable to load root key: {}", e)))?;
    let issuer = Issuer::from_ca_cert_pem(root.certificate_pem(), &root_key)
        .map_err(|e| Error::Crypto(format!("unable to load root certificate: {}", e)))?;

    let cert = params
        .signed_by(&leaf_key, &issuer)
        .map_err(|e| Error::Crypto(format!("unable to sign leaf certificate: {}", e)))?;

    debug!(
        common_name = %profile.common_name(),
        alt_names = ?profile.alt_names(),
        "Issued leaf certificate"
    );

    Ok(KeyMaterial::new(leaf_key.serialize_pem(), cert.pem()))
}

/// Expiry of the root certificate
fn root_not_after(root: &KeyMaterial) -> Result<::time::OffsetDateTime> {
    let der = root.certificate_der()?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| Error::Crypto(format!("unable to parse root certificate: {}", e)))?;
    Ok(cert.validity().not_after.to_datetime())
}
