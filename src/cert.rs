use std::io;

use der::Decode as _;
use rcgen::{
    CertificateParams, CertificateSigningRequest, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use time::{Duration, OffsetDateTime};
use zeroize::Zeroizing;

/// Lifetime of certificates made by [`self_signed`], in years.
pub const SELF_SIGNED_YEARS: i32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("no certificate found in PEM input")]
    NoCertificate,

    #[error("failed to read PEM input")]
    Pem(#[from] io::Error),

    #[error("failed to decode certificate")]
    Der(#[from] der::Error),

    #[error("failed to generate certificate or key")]
    Generate(#[from] rcgen::Error),

    #[error("certificate validity is out of range")]
    Date(#[from] time::error::ComponentRange),
}

/// Validity window of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    pub fn total(&self) -> Duration {
        self.not_after - self.not_before
    }

    /// Instant from which the certificate should be replaced: two thirds into its lifetime.
    pub fn renew_at(&self) -> OffsetDateTime {
        self.not_before + self.total() * 2 / 3
    }
}

/// Encapsulated certificate chain and private key.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    private_key_pem: Zeroizing<String>,
    certificate: String,
}

impl Certificate {
    pub fn new(private_key_pem: Zeroizing<String>, certificate: String) -> Self {
        Certificate {
            private_key_pem,
            certificate,
        }
    }

    /// The private key in PEM format.
    pub fn private_key(&self) -> &str {
        &self.private_key_pem
    }

    /// The full chain in PEM format, leaf first.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    /// The certificate chain in DER format.
    pub fn certificate_chain(&self) -> Result<Vec<Vec<u8>>, CertError> {
        chain_der(self.certificate.as_bytes())
    }

    /// Validity of the leaf certificate.
    pub fn validity(&self) -> Result<Validity, CertError> {
        leaf_validity(self.certificate.as_bytes())
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("certificate", &self.certificate)
            .finish_non_exhaustive()
    }
}

fn chain_der(pem: &[u8]) -> Result<Vec<Vec<u8>>, CertError> {
    let mut rdr = pem;

    rustls_pemfile::certs(&mut rdr)
        .map(|res| res.map(|cert| cert.to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// Reads the validity window of the first (leaf) certificate in a PEM chain.
pub fn leaf_validity(pem: &[u8]) -> Result<Validity, CertError> {
    let chain = chain_der(pem)?;
    let leaf = chain.first().ok_or(CertError::NoCertificate)?;

    let cert = x509_cert::Certificate::from_der(leaf)?;
    let validity = cert.tbs_certificate.validity;

    Ok(Validity {
        not_before: OffsetDateTime::UNIX_EPOCH + validity.not_before.to_unix_duration(),
        not_after: OffsetDateTime::UNIX_EPOCH + validity.not_after.to_unix_duration(),
    })
}

/// Creates a self-signed server certificate for `domains` with a fresh P-256 key.
///
/// The first domain becomes the Common Name; every domain, the first included, is listed as a DNS
/// Subject Alternative Name. The certificate is valid from `now` for [`SELF_SIGNED_YEARS`] years.
pub fn self_signed(domains: &[String], now: OffsetDateTime) -> Result<Certificate, CertError> {
    let not_before = now.replace_nanosecond(0)?;
    let not_after = add_years(not_before, SELF_SIGNED_YEARS)?;

    let mut params = server_params(domains)?;
    params.not_before = not_before;
    params.not_after = not_after;
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyCertSign,
    ];

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    Ok(Certificate::new(
        Zeroizing::new(key_pair.serialize_pem()),
        cert.pem(),
    ))
}

/// Creates a CSR for `domains` signed by `key_pair`.
///
/// Same naming rules as [`self_signed`].
pub fn certificate_request(
    domains: &[String],
    key_pair: &KeyPair,
) -> Result<CertificateSigningRequest, CertError> {
    Ok(server_params(domains)?.serialize_request(key_pair)?)
}

fn server_params(domains: &[String]) -> Result<CertificateParams, CertError> {
    let mut params = CertificateParams::new(domains.to_vec())?;

    let mut name = DistinguishedName::new();
    if let Some(primary_domain) = domains.first() {
        name.push(DnType::CommonName, primary_domain.as_str());
    }
    params.distinguished_name = name;
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    Ok(params)
}

/// Same calendar date `years` later; 29 February rolls over to 1 March.
fn add_years(
    at: OffsetDateTime,
    years: i32,
) -> Result<OffsetDateTime, time::error::ComponentRange> {
    let year = at.year() + years;

    match at.replace_year(year) {
        Ok(later) => Ok(later),
        Err(_) => (at + Duration::DAY).replace_year(year),
    }
}
