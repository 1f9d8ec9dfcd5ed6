pub mod extensions;
pub mod params;
pub mod usage;

use der::asn1::Any;
use der::{Decode, Encode, Tag};
use sha1::{Digest, Sha1};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{CertSmithError, Result};
use crate::key::{CertificateSigner, PublicKey};
use crate::pem_utils;
use extensions::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use params::{DistinguishedName, ExtensionParam, Validity};

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
    /// SHA-256 with ECDSA, used with P-256 keys.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA, used with P-384 keys.
    Sha384WithECDSA,
}

impl SignatureAlgorithm {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA carries explicit NULL parameters (RFC 4055); ECDSA carries none (RFC 5758).
    pub fn to_algorithm_identifier(self) -> Result<AlgorithmIdentifierOwned> {
        let (oid, parameters) = match self {
            SignatureAlgorithm::Sha256WithRSA => (
                const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                Some(Any::new(Tag::Null, Vec::<u8>::new())?),
            ),
            SignatureAlgorithm::Sha256WithECDSA => {
                (const_oid::db::rfc5912::ECDSA_WITH_SHA_256, None)
            }
            SignatureAlgorithm::Sha384WithECDSA => {
                (const_oid::db::rfc5912::ECDSA_WITH_SHA_384, None)
            }
        };
        Ok(AlgorithmIdentifierOwned { oid, parameters })
    }

    pub fn from_algorithm_identifier(id: &AlgorithmIdentifierOwned) -> Result<Self> {
        match id.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => Ok(Self::Sha256WithRSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(Self::Sha256WithECDSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Ok(Self::Sha384WithECDSA),
            other => Err(CertSmithError::DecodingError(format!(
                "Unsupported signature algorithm {other}"
            ))),
        }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM
/// formats and to read back the fields this crate writes.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CertSmithError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(
            &self.to_der()?,
            pem_utils::CERTIFICATE_LABEL,
        ))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)
            .map_err(|e| CertSmithError::DecodingError(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parses the first PEM block, which must be labelled `CERTIFICATE`.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let (label, der) = pem_utils::pem_to_der(pem_str)
            .map_err(|e| CertSmithError::DecodingError(e.to_string()))?;
        if label != pem_utils::CERTIFICATE_LABEL {
            return Err(CertSmithError::DecodingError(format!(
                "expected a CERTIFICATE PEM block, found `{label}`"
            )));
        }
        Self::from_der(&der)
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    /// Big-endian serial number bytes, without sign padding.
    pub fn serial_number(&self) -> Vec<u8> {
        let bytes = self.inner.tbs_certificate.serial_number.as_bytes();
        match bytes {
            [0, rest @ ..] if !rest.is_empty() => rest.to_vec(),
            _ => bytes.to_vec(),
        }
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: OffsetDateTime::UNIX_EPOCH + validity.not_before.to_unix_duration(),
            not_after: OffsetDateTime::UNIX_EPOCH + validity.not_after.to_unix_duration(),
        }
    }

    /// All extensions, in certificate order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect()
    }

    /// Decodes the extension `E` if present.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension())
            .transpose()
    }

    pub fn is_ca(&self) -> bool {
        matches!(
            self.extension::<BasicConstraints>(),
            Ok(Some(BasicConstraints { is_ca: true, .. }))
        )
    }

    pub fn subject_alt_name(&self) -> Result<SubjectAltName> {
        Ok(self.extension::<SubjectAltName>()?.unwrap_or_default())
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.extension::<KeyUsage>()
    }

    pub fn extended_key_usage(&self) -> Result<ExtendedKeyUsage> {
        Ok(self.extension::<ExtendedKeyUsage>()?.unwrap_or_default())
    }

    /// The subject key identifier extension, or the RFC 5280 method (1) value
    /// computed from the public key when the extension is missing.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        match self.extension::<SubjectKeyIdentifier>()? {
            Some(ski) => Ok(ski.0),
            None => Ok(key_identifier(
                &self.inner.tbs_certificate.subject_public_key_info,
            )),
        }
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// True when `key` is the private half of this certificate's public key.
    pub fn matches_key(&self, key: &dyn CertificateSigner) -> Result<bool> {
        let ours = self.inner.tbs_certificate.subject_public_key_info.to_der()?;
        let theirs = key.public_key_info()?.to_der()?;
        Ok(ours == theirs)
    }

    /// Checks that this certificate names `issuer` as its issuer and carries a
    /// valid signature from the issuer's key.
    ///
    /// This is a signature check only; no path validation is done.
    pub fn verify_issued_by(&self, issuer: &Certificate) -> Result<()> {
        let tbs = &self.inner.tbs_certificate;
        if tbs.issuer != issuer.inner.tbs_certificate.subject {
            return Err(CertSmithError::InvalidInput(
                "issuer name does not match the issuing certificate's subject".to_string(),
            ));
        }
        if self.inner.signature_algorithm != tbs.signature {
            return Err(CertSmithError::InvalidInput(
                "outer and inner signature algorithms differ".to_string(),
            ));
        }
        let algorithm = SignatureAlgorithm::from_algorithm_identifier(&tbs.signature)?;
        let public_key = issuer.public_key()?;
        match (algorithm, &public_key) {
            (SignatureAlgorithm::Sha256WithRSA, PublicKey::Rsa(_))
            | (SignatureAlgorithm::Sha256WithECDSA, PublicKey::EcdsaP256(_))
            | (SignatureAlgorithm::Sha384WithECDSA, PublicKey::EcdsaP384(_)) => {}
            _ => {
                return Err(CertSmithError::InvalidInput(format!(
                    "{algorithm:?} does not match the issuer key type"
                )));
            }
        }
        public_key.verify(&tbs.to_der()?, self.inner.signature.raw_bytes())
    }

    /// True when issuer and subject are the same name and the certificate
    /// verifies under its own key.
    pub fn is_self_signed(&self) -> bool {
        self.verify_issued_by(self).is_ok()
    }
}

/// SHA-1 over the subjectPublicKey bit string (RFC 5280 section 4.2.1.2, method 1).
pub fn key_identifier(spki: &x509_cert::spki::SubjectPublicKeyInfoOwned) -> Vec<u8> {
    Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec()
}
