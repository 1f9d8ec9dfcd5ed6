//! Loading and checking the CA key pair a leaf certificate is signed with.

use std::fs;
use std::path::Path;

use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::params::DistinguishedName;
use crate::error::{CertSmithError, Result};
use crate::issuer::Issuer;
use crate::key::{CertificateSigner, KeyPair};

/// A CA certificate together with its private key.
#[derive(Debug, Clone)]
pub struct CaPair {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CaPair {
    /// Pairs a certificate with its key, rejecting a key that does not belong
    /// to the certificate.
    pub fn new(cert: Certificate, key: KeyPair) -> Result<Self> {
        if !cert.matches_key(&key)? {
            return Err(CertSmithError::InvalidInput(
                "CA key does not match the CA certificate".to_string(),
            ));
        }
        if !cert.is_ca() {
            log::warn!(
                "{}: certificate is not marked as a CA, signing with it anyway",
                cert.subject().common_name
            );
        }
        Ok(Self { cert, key })
    }

    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        Self::new(Certificate::from_pem(cert_pem)?, KeyPair::from_pem(key_pem)?)
    }

    pub fn subject(&self) -> DistinguishedName {
        self.cert.subject()
    }
}

impl Issuer for CaPair {
    fn issuer_name(&self) -> Result<Name> {
        Ok(self.cert.inner.tbs_certificate.subject.clone())
    }

    fn signer(&self) -> &dyn CertificateSigner {
        &self.key
    }

    fn authority_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(Some(self.cert.key_identifier()?))
    }
}

/// Loads the CA pair from disk.
///
/// Both files missing is `CaPairNotFound`. Anything else that keeps the pair
/// from being used (one file missing, unreadable, unparseable, or a key of
/// another certificate) is `CaPairUnreadable`.
pub fn resolve(cert_path: &Path, key_path: &Path) -> Result<CaPair> {
    if !cert_path.exists() && !key_path.exists() {
        return Err(CertSmithError::CaPairNotFound {
            cert: cert_path.to_path_buf(),
            key: key_path.to_path_buf(),
        });
    }

    let unreadable = |reason: String| CertSmithError::CaPairUnreadable {
        cert: cert_path.to_path_buf(),
        key: key_path.to_path_buf(),
        reason,
    };

    let cert_pem = fs::read_to_string(cert_path)
        .map_err(|e| unreadable(format!("{}: {e}", cert_path.display())))?;
    let key_pem = fs::read_to_string(key_path)
        .map_err(|e| unreadable(format!("{}: {e}", key_path.display())))?;
    let pair = CaPair::from_pem(&cert_pem, &key_pem).map_err(|e| unreadable(e.to_string()))?;

    log::debug!(
        "loaded CA {} from {}",
        pair.subject().common_name,
        cert_path.display()
    );
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_files_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(&dir.path().join("ca.crt"), &dir.path().join("ca.key")).unwrap_err();
        assert!(matches!(err, CertSmithError::CaPairNotFound { .. }));
    }

    #[test]
    fn garbage_certificate_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("ca.crt");
        let key = dir.path().join("ca.key");
        fs::write(&cert, "garbage").unwrap();
        fs::write(&key, KeyPair::generate_ecdsa_p384().to_pem().unwrap()).unwrap();
        let err = resolve(&cert, &key).unwrap_err();
        assert!(matches!(err, CertSmithError::CaPairUnreadable { .. }));
    }

    #[test]
    fn one_missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("ca.crt");
        fs::write(&cert, "whatever").unwrap();
        let err = resolve(&cert, &dir.path().join("ca.key")).unwrap_err();
        assert!(matches!(err, CertSmithError::CaPairUnreadable { .. }));
    }
}
