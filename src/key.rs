use std::fmt;

use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use zeroize::Zeroizing;

/// Make a P-256 private key (from which we can derive a public key).
pub fn create_p256_key() -> p256::ecdsa::SigningKey {
    let csprng = &mut rand::thread_rng();
    p256::ecdsa::SigningKey::from(p256::SecretKey::random(csprng))
}

/// Elliptic curve P-256 key that signs requests for an ACME account.
///
/// The key is generated once when the account is created and then travels with the account
/// document for as long as the registration exists.
#[derive(Clone)]
pub struct AccountKey {
    signing_key: p256::ecdsa::SigningKey,
}

impl AccountKey {
    /// Generates a fresh random key.
    pub fn generate() -> AccountKey {
        Self::from_signing_key(create_p256_key())
    }

    /// Reads a PEM encoded key.
    ///
    /// Both PKCS#8 (`PRIVATE KEY`) and SEC1 (`EC PRIVATE KEY`) documents are accepted; the
    /// latter is what older tools stored for the same account.
    pub fn from_pem(pem: &str) -> pkcs8::Result<AccountKey> {
        match p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            Ok(signing_key) => Ok(Self::from_signing_key(signing_key)),
            Err(err) => match p256::SecretKey::from_sec1_pem(pem) {
                Ok(secret_key) => Ok(Self::from_signing_key(secret_key.into())),
                // report the PKCS#8 failure, it is the canonical encoding
                Err(_) => Err(err),
            },
        }
    }

    /// Reads a DER encoded PKCS#8 key.
    pub fn from_pkcs8_der(der: &[u8]) -> pkcs8::Result<AccountKey> {
        let signing_key = p256::ecdsa::SigningKey::from_pkcs8_der(der)?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: p256::ecdsa::SigningKey) -> AccountKey {
        AccountKey { signing_key }
    }

    /// The key as a PKCS#8 PEM document.
    pub fn to_pem(&self) -> pkcs8::Result<Zeroizing<String>> {
        self.signing_key.to_pkcs8_pem(pem::LineEnding::LF)
    }

    /// The key as a DER encoded PKCS#8 document.
    pub fn to_pkcs8_der(&self) -> pkcs8::Result<Zeroizing<Vec<u8>>> {
        let doc = self.signing_key.to_pkcs8_der()?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    pub fn signing_key(&self) -> &p256::ecdsa::SigningKey {
        &self.signing_key
    }
}

impl PartialEq for AccountKey {
    fn eq(&self, other: &Self) -> bool {
        self.signing_key.to_bytes() == other.signing_key.to_bytes()
    }
}

impl Eq for AccountKey {}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print secret material
        f.debug_struct("AccountKey").finish_non_exhaustive()
    }
}
