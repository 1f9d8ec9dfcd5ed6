use std::fmt;
use std::str::FromStr;

use der::Encode;
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::cert::SignatureAlgorithm;
use crate::error::{CertSmithError, Result};
use crate::pem_utils;

const RSA_MIN_BITS: usize = 2048;
const RSA_MAX_BITS: usize = 8192;

pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
pub const EC_PRIVATE_KEY_LABEL: &str = "EC PRIVATE KEY";
pub const PKCS8_PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Key algorithms that can be generated for a new certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA with the given modulus size in bits.
    Rsa { bits: usize },
    /// ECDSA over NIST P-384. The curve is fixed.
    EcdsaP384,
}

impl KeyAlgorithm {
    /// Resolves an algorithm identifier and strength into a `KeyAlgorithm`.
    ///
    /// `strength` is the RSA modulus size and is ignored for elliptic curve keys.
    pub fn resolve(name: &str, strength: usize) -> Result<Self> {
        match name.parse::<KeyAlgorithmName>()? {
            KeyAlgorithmName::Rsa => {
                if !(RSA_MIN_BITS..=RSA_MAX_BITS).contains(&strength) {
                    return Err(CertSmithError::UnsupportedAlgorithm(format!(
                        "rsa with {strength} bits (supported: {RSA_MIN_BITS}..={RSA_MAX_BITS})"
                    )));
                }
                Ok(KeyAlgorithm::Rsa { bits: strength })
            }
            KeyAlgorithmName::Ecdsa => Ok(KeyAlgorithm::EcdsaP384),
        }
    }
}

enum KeyAlgorithmName {
    Rsa,
    Ecdsa,
}

impl FromStr for KeyAlgorithmName {
    type Err = CertSmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(KeyAlgorithmName::Rsa),
            "ecdsa" | "ec" | "ecdsa-p384" | "p384" => Ok(KeyAlgorithmName::Ecdsa),
            _ => Err(CertSmithError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Something that can sign a certificate.
///
/// Implemented by every supported private key type, so issuing does not
/// depend on one concrete algorithm.
pub trait CertificateSigner {
    /// The signature algorithm written into the certificate.
    fn signature_algorithm(&self) -> Result<AlgorithmIdentifierOwned>;

    /// The public half of the key as a SubjectPublicKeyInfo.
    fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned>;

    /// Signs `message` and returns the encoded signature value.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// An RSA private key.
#[derive(Clone)]
pub struct RsaKey {
    private: Box<RsaPrivateKey>,
}

impl RsaKey {
    pub fn generate(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CertSmithError::UnsupportedAlgorithm(format!("rsa {bits}: {e}")))?;
        Ok(Self {
            private: Box::new(private),
        })
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private.to_public_key()
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        rsa::traits::PublicKeyParts::size(self.private.as_ref()) * 8
    }
}

impl CertificateSigner for RsaKey {
    fn signature_algorithm(&self) -> Result<AlgorithmIdentifierOwned> {
        SignatureAlgorithm::Sha256WithRSA.to_algorithm_identifier()
    }

    fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        Ok(SubjectPublicKeyInfoOwned::from_key(self.public_key())?)
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        use rsa::signature::{SignatureEncoding, Signer};

        let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new((*self.private).clone());
        let signature = signing_key
            .try_sign(message)
            .map_err(|e| CertSmithError::CertificateCreation(e.to_string()))?;
        Ok(signature.to_vec())
    }
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey").field("bits", &self.bits()).finish()
    }
}

macro_rules! ecdsa_key {
    ($name:ident, $curve:ident, $label:literal, $algorithm:expr) => {
        #[doc = concat!("An ECDSA private key on ", $label, ".")]
        #[derive(Clone)]
        pub struct $name {
            secret: $curve::SecretKey,
        }

        impl $name {
            pub fn generate() -> Self {
                let mut rng = rand_core::OsRng;
                Self {
                    secret: $curve::SecretKey::random(&mut rng),
                }
            }

            pub fn public_key(&self) -> $curve::PublicKey {
                self.secret.public_key()
            }

            fn to_sec1_der(&self) -> Result<Vec<u8>> {
                self.secret
                    .to_sec1_der()
                    .map(|der| der.to_vec())
                    .map_err(|e| CertSmithError::EncodingError(e.to_string()))
            }
        }

        impl CertificateSigner for $name {
            fn signature_algorithm(&self) -> Result<AlgorithmIdentifierOwned> {
                $algorithm.to_algorithm_identifier()
            }

            fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
                Ok(SubjectPublicKeyInfoOwned::from_key(self.public_key())?)
            }

            fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
                use ecdsa::signature::{SignatureEncoding, Signer};

                let signing_key = $curve::ecdsa::SigningKey::from(&self.secret);
                let signature: $curve::ecdsa::DerSignature = signing_key
                    .try_sign(message)
                    .map_err(|e| CertSmithError::CertificateCreation(e.to_string()))?;
                Ok(signature.to_vec())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

ecdsa_key!(
    EcdsaP256Key,
    p256,
    "P-256",
    SignatureAlgorithm::Sha256WithECDSA
);
ecdsa_key!(
    EcdsaP384Key,
    p384,
    "P-384",
    SignatureAlgorithm::Sha384WithECDSA
);

/// Supported key types for certificate operations.
///
/// Only RSA and P-384 are generated; P-256 is accepted when loading an
/// existing CA key.
#[derive(Clone, Debug)]
pub enum KeyPair {
    Rsa(RsaKey),
    EcdsaP256(EcdsaP256Key),
    EcdsaP384(EcdsaP384Key),
}

impl KeyPair {
    /// Generates a fresh key pair for an algorithm identifier (`rsa`, `ecdsa`)
    /// and strength.
    pub fn generate(algorithm: &str, strength: usize) -> Result<Self> {
        Self::generate_for(KeyAlgorithm::resolve(algorithm, strength)?)
    }

    pub fn generate_for(algorithm: KeyAlgorithm) -> Result<Self> {
        log::debug!("generating {algorithm:?} key pair");
        match algorithm {
            KeyAlgorithm::Rsa { bits } => Self::generate_rsa(bits),
            KeyAlgorithm::EcdsaP384 => Ok(Self::generate_ecdsa_p384()),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        Ok(KeyPair::Rsa(RsaKey::generate(bits)?))
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        KeyPair::EcdsaP384(EcdsaP384Key::generate())
    }

    pub fn signer(&self) -> &dyn CertificateSigner {
        match self {
            KeyPair::Rsa(key) => key,
            KeyPair::EcdsaP256(key) => key,
            KeyPair::EcdsaP384(key) => key,
        }
    }

    /// The PEM label matching [`KeyPair::to_der`].
    pub fn pem_label(&self) -> &'static str {
        match self {
            KeyPair::Rsa(_) => RSA_PRIVATE_KEY_LABEL,
            KeyPair::EcdsaP256(_) | KeyPair::EcdsaP384(_) => EC_PRIVATE_KEY_LABEL,
        }
    }

    /// Encodes the private key: PKCS#1 for RSA, SEC1 for elliptic curve keys.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa(key) => key
                .private
                .to_pkcs1_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| CertSmithError::EncodingError(e.to_string())),
            KeyPair::EcdsaP256(key) => key.to_sec1_der(),
            KeyPair::EcdsaP384(key) => key.to_sec1_der(),
        }
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(&self.to_der()?, self.pem_label()))
    }

    /// Loads a private key from PEM. PKCS#1, SEC1 and PKCS#8 encodings are accepted.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let (label, der) = pem_utils::pem_to_der(pem_str)
            .map_err(|e| CertSmithError::DecodingError(e.to_string()))?;
        match label.as_str() {
            RSA_PRIVATE_KEY_LABEL => {
                let private = RsaPrivateKey::from_pkcs1_der(&der)
                    .map_err(|e| CertSmithError::DecodingError(e.to_string()))?;
                Ok(KeyPair::Rsa(RsaKey {
                    private: Box::new(private),
                }))
            }
            EC_PRIVATE_KEY_LABEL => Self::from_sec1_der(&der),
            PKCS8_PRIVATE_KEY_LABEL => Self::from_pkcs8_der(&der),
            other => Err(CertSmithError::DecodingError(format!(
                "unsupported private key PEM label `{other}`"
            ))),
        }
    }

    fn from_sec1_der(der: &[u8]) -> Result<Self> {
        if let Ok(secret) = p384::SecretKey::from_sec1_der(der) {
            return Ok(KeyPair::EcdsaP384(EcdsaP384Key { secret }));
        }
        p256::SecretKey::from_sec1_der(der)
            .map(|secret| KeyPair::EcdsaP256(EcdsaP256Key { secret }))
            .map_err(|_| {
                CertSmithError::DecodingError(
                    "EC private key is not a valid P-256 or P-384 key".to_string(),
                )
            })
    }

    fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        if let Ok(private) = RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(KeyPair::Rsa(RsaKey {
                private: Box::new(private),
            }));
        }
        if let Ok(secret) = p384::SecretKey::from_pkcs8_der(der) {
            return Ok(KeyPair::EcdsaP384(EcdsaP384Key { secret }));
        }
        p256::SecretKey::from_pkcs8_der(der)
            .map(|secret| KeyPair::EcdsaP256(EcdsaP256Key { secret }))
            .map_err(|_| {
                CertSmithError::DecodingError(
                    "PKCS#8 key is not an RSA, P-256 or P-384 key".to_string(),
                )
            })
    }
}

impl CertificateSigner for KeyPair {
    fn signature_algorithm(&self) -> Result<AlgorithmIdentifierOwned> {
        self.signer().signature_algorithm()
    }

    fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.signer().public_key_info()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.signer().sign(message)
    }
}

/// A public key recovered from a certificate, used to check signatures.
#[derive(Clone, Debug)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(p256::PublicKey),
    EcdsaP384(p384::PublicKey),
}

impl PublicKey {
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        if spki.algorithm.oid == const_oid::db::rfc5912::RSA_ENCRYPTION {
            return RsaPublicKey::from_public_key_der(&der)
                .map(PublicKey::Rsa)
                .map_err(|e| CertSmithError::DecodingError(e.to_string()));
        }
        if let Ok(key) = p384::PublicKey::from_public_key_der(&der) {
            return Ok(PublicKey::EcdsaP384(key));
        }
        p256::PublicKey::from_public_key_der(&der)
            .map(PublicKey::EcdsaP256)
            .map_err(|_| {
                CertSmithError::DecodingError(format!(
                    "unsupported public key algorithm {}",
                    spki.algorithm.oid
                ))
            })
    }

    /// Checks `signature` over `message` with this key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let invalid = |e: ecdsa::signature::Error| {
            CertSmithError::InvalidInput(format!("signature verification failed: {e}"))
        };
        match self {
            PublicKey::Rsa(key) => {
                use rsa::signature::Verifier;
                let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone());
                let signature =
                    rsa::pkcs1v15::Signature::try_from(signature).map_err(invalid)?;
                verifying_key.verify(message, &signature).map_err(invalid)
            }
            PublicKey::EcdsaP256(key) => {
                use ecdsa::signature::Verifier;
                let verifying_key = p256::ecdsa::VerifyingKey::from(key);
                let signature = p256::ecdsa::DerSignature::try_from(signature).map_err(invalid)?;
                verifying_key.verify(message, &signature).map_err(invalid)
            }
            PublicKey::EcdsaP384(key) => {
                use ecdsa::signature::Verifier;
                let verifying_key = p384::ecdsa::VerifyingKey::from(key);
                let signature = p384::ecdsa::DerSignature::try_from(signature).map_err(invalid)?;
                verifying_key.verify(message, &signature).map_err(invalid)
            }
        }
    }
}
