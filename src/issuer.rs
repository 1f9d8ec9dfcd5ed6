use std::fmt;

use der::asn1::BitString;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectKeyIdentifier,
};
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::cert::{Certificate, key_identifier};
use crate::chain::CaPair;
use crate::error::{CertSmithError, Result};
use crate::key::{CertificateSigner, KeyPair};
use crate::tbs_certificate::TbsCertificate;
use crate::template::CertificateTemplate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name written as the certificate issuer.
    fn issuer_name(&self) -> Result<Name>;

    /// Returns the key the certificate is signed with.
    fn signer(&self) -> &dyn CertificateSigner;

    /// Key identifier for the AuthorityKeyIdentifier extension, if one is emitted.
    fn authority_key_identifier(&self) -> Result<Option<Vec<u8>>>;

    /// Issues a certificate for `template`, binding `subject_key`'s public half.
    ///
    /// # Arguments
    /// * `template` - The populated certificate fields.
    /// * `subject_key` - The key pair the certificate is issued for.
    ///
    /// # Returns
    /// The signed `Certificate`, or `CertificateCreation` when the template is
    /// unusable (no or non-chronological validity window).
    fn issue(
        &self,
        template: &CertificateTemplate,
        subject_key: &dyn CertificateSigner,
    ) -> Result<Certificate> {
        if template.validity.is_zero() {
            return Err(CertSmithError::CertificateCreation(
                "validity window is not set (need notAfter or expiration)".to_string(),
            ));
        }
        if !template.validity.is_chronological() {
            return Err(CertSmithError::CertificateCreation(format!(
                "notBefore {} is not earlier than notAfter {}",
                template.validity.not_before, template.validity.not_after
            )));
        }

        let subject_public_key_info = subject_key.public_key_info()?;
        let extensions = template_extensions(
            template,
            &subject_public_key_info,
            self.authority_key_identifier()?,
        )?;
        let signature_algorithm = self.signer().signature_algorithm()?;

        let tbs_cert = TbsCertificate {
            serial_number: template.serial_bytes(),
            signature_algorithm: signature_algorithm.clone(),
            issuer: self.issuer_name()?,
            validity: template.validity,
            subject: template.subject.as_x509_name()?,
            subject_public_key_info,
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signer().sign(&der::Encode::to_der(&tbs_cert_inner)?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm,
            signature: BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// Extensions in emission order: BasicConstraints, KeyUsage, ExtendedKeyUsage,
/// SubjectAltName, SubjectKeyIdentifier, AuthorityKeyIdentifier.
fn template_extensions(
    template: &CertificateTemplate,
    subject_public_key_info: &SubjectPublicKeyInfoOwned,
    authority_key_id: Option<Vec<u8>>,
) -> Result<Vec<ExtensionParam>> {
    let mut extensions = Vec::new();

    if template.basic_constraints_valid {
        let basic_constraints = BasicConstraints {
            is_ca: template.is_ca,
            max_path_length: None,
        };
        extensions.push(ExtensionParam::from_extension(basic_constraints, true)?);
    }

    if !template.key_usage.is_empty() {
        extensions.push(ExtensionParam::from_extension(
            KeyUsage(template.key_usage),
            true,
        )?);
    }

    if !template.extended_key_usage.is_empty() {
        let extended_key_usage = ExtendedKeyUsage {
            usage: template.extended_key_usage.clone(),
        };
        extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
    }

    let san = template.subject_alt_name();
    if !san.is_empty() {
        extensions.push(ExtensionParam::from_extension(san, false)?);
    }

    extensions.push(ExtensionParam::from_extension(
        SubjectKeyIdentifier(key_identifier(subject_public_key_info)),
        false,
    )?);

    if let Some(key_identifier) = authority_key_id {
        extensions.push(ExtensionParam::from_extension(
            AuthorityKeyIdentifier { key_identifier },
            false,
        )?);
    }

    Ok(extensions)
}

/// Helper struct for self-issuing certificates.
///
/// Issuer name and signer are the subject and key of the certificate being
/// issued; no AuthorityKeyIdentifier is emitted.
pub struct SelfIssuer<'a> {
    pub subject: &'a DistinguishedName,
    pub key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<Name> {
        self.subject.as_x509_name()
    }

    fn signer(&self) -> &dyn CertificateSigner {
        self.key
    }

    fn authority_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// A freshly generated key pair together with the template it is certified by.
#[derive(Debug, Clone)]
pub struct SigningMaterial {
    pub key: KeyPair,
    pub template: CertificateTemplate,
}

/// Lifecycle of one signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Unsigned,
    Signing,
    Signed,
    Failed,
}

impl fmt::Display for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            SigningState::Unsigned => "unsigned",
            SigningState::Signing => "signing",
            SigningState::Signed => "signed",
            SigningState::Failed => "failed",
        };
        f.write_str(state)
    }
}

/// Signs `material`: self-signed for a CA template, by `ca` for a leaf.
///
/// Every failure is reported as `CertificateCreation`.
pub fn sign(material: &SigningMaterial, ca: Option<&CaPair>) -> Result<Certificate> {
    let cn = &material.template.subject.common_name;
    log::debug!("{cn}: {}", SigningState::Unsigned);

    let issued = if material.template.is_ca {
        log::debug!("{cn}: {} (self-signed)", SigningState::Signing);
        let issuer = SelfIssuer {
            subject: &material.template.subject,
            key: &material.key,
        };
        issuer.issue(&material.template, &material.key)
    } else {
        match ca {
            Some(ca) => {
                log::debug!("{cn}: {} (by {})", SigningState::Signing, ca.subject().common_name);
                ca.issue(&material.template, &material.key)
            }
            None => Err(CertSmithError::CertificateCreation(
                "leaf certificate has no CA key pair".to_string(),
            )),
        }
    };

    match issued {
        Ok(certificate) => {
            log::debug!("{cn}: {}", SigningState::Signed);
            Ok(certificate)
        }
        Err(err) => {
            log::debug!("{cn}: {}: {err}", SigningState::Failed);
            Err(match err {
                CertSmithError::CertificateCreation(_) => err,
                other => CertSmithError::CertificateCreation(other.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{FlagSet, KeyUsages, SubjectAltName};
    use crate::cert::params::Validity;
    use time::macros::datetime;

    fn template(is_ca: bool) -> CertificateTemplate {
        CertificateTemplate {
            subject: DistinguishedName::builder().common_name("unit").build(),
            serial_number: if is_ca { 0 } else { 4242 },
            validity: Validity {
                not_before: datetime!(2025-01-01 00:00:00 UTC),
                not_after: datetime!(2035-01-01 00:00:00 UTC),
            },
            key_usage: KeyUsages::KeyCertSign | KeyUsages::CRLSign,
            extended_key_usage: Vec::new(),
            dns_names: if is_ca { Vec::new() } else { vec!["unit.example".to_string()] },
            ip_addresses: Vec::new(),
            is_ca,
            basic_constraints_valid: is_ca,
        }
    }

    #[test]
    fn self_signed_ca_verifies_under_its_own_key() {
        let material = SigningMaterial {
            key: KeyPair::generate_ecdsa_p384(),
            template: template(true),
        };
        let cert = sign(&material, None).unwrap();
        cert.verify_issued_by(&cert).unwrap();
        assert!(cert.is_ca());
        assert_eq!(cert.serial_number(), vec![0]);
        assert!(cert.matches_key(&material.key).unwrap());
        assert!(
            cert.extension::<AuthorityKeyIdentifier>()
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn zero_window_is_a_creation_failure() {
        let mut template = template(true);
        template.validity = Validity::ZERO;
        let material = SigningMaterial {
            key: KeyPair::generate_ecdsa_p384(),
            template,
        };
        assert!(matches!(
            sign(&material, None),
            Err(CertSmithError::CertificateCreation(_))
        ));
    }

    #[test]
    fn reversed_window_is_a_creation_failure() {
        let mut template = template(true);
        std::mem::swap(
            &mut template.validity.not_before,
            &mut template.validity.not_after,
        );
        let material = SigningMaterial {
            key: KeyPair::generate_ecdsa_p384(),
            template,
        };
        let err = sign(&material, None).unwrap_err();
        assert!(err.to_string().contains("not earlier than"));
    }

    #[test]
    fn leaf_without_ca_cannot_be_signed() {
        let material = SigningMaterial {
            key: KeyPair::generate_ecdsa_p384(),
            template: template(false),
        };
        assert!(matches!(
            sign(&material, None),
            Err(CertSmithError::CertificateCreation(_))
        ));
    }

    #[test]
    fn leaf_extensions_follow_the_template() {
        let ca_key = KeyPair::generate_ecdsa_p384();
        let ca_material = SigningMaterial {
            key: ca_key.clone(),
            template: template(true),
        };
        let ca = CaPair::new(sign(&ca_material, None).unwrap(), ca_key).unwrap();

        let mut leaf_template = template(false);
        leaf_template.key_usage = FlagSet::from(KeyUsages::DigitalSignature);
        let leaf = SigningMaterial {
            key: KeyPair::generate_ecdsa_p384(),
            template: leaf_template,
        };
        let cert = sign(&leaf, Some(&ca)).unwrap();

        cert.verify_issued_by(&ca.cert).unwrap();
        assert!(!cert.is_ca());
        assert!(cert.extension::<BasicConstraints>().unwrap().is_none());
        assert_eq!(
            cert.subject_alt_name().unwrap(),
            SubjectAltName {
                dns_names: vec!["unit.example".to_string()],
                ip_addresses: Vec::new(),
            }
        );
        let aki = cert
            .extension::<AuthorityKeyIdentifier>()
            .unwrap()
            .unwrap();
        assert_eq!(aki.key_identifier, ca.cert.key_identifier().unwrap());
        assert_eq!(cert.serial_number(), 4242u64.to_be_bytes()[6..].to_vec());
    }
}
