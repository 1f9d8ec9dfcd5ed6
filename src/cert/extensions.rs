use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::name::GeneralName;

use crate::error::CertSmithError;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use certsmith::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName {
///     dns_names: vec!["example.com".to_string()],
///     ip_addresses: vec!["127.0.0.1".parse().unwrap()],
/// };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san, decoded);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertSmithError>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertSmithError>
    where
        Self: Sized;
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// # Fields
/// * `dns_names` - DNS names, in order.
/// * `ip_addresses` - IPv4 and IPv6 addresses, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName {
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

impl SubjectAltName {
    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty() && self.ip_addresses.is_empty()
    }
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertSmithError> {
        let mut names = self
            .dns_names
            .iter()
            .map(|name| {
                Ia5String::new(name)
                    .map(GeneralName::DnsName)
                    .map_err(|e| CertSmithError::InvalidInput(format!("DNS name `{name}`: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for ip in &self.ip_addresses {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            names.push(GeneralName::IpAddress(OctetString::new(octets)?));
        }

        Ok(x509_cert::ext::pkix::SubjectAltName(names).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertSmithError> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let mut out = Self::default();
        for name in san.0.iter() {
            match name {
                GeneralName::DnsName(dns) => out.dns_names.push(dns.to_string()),
                GeneralName::IpAddress(octets) => {
                    let bytes = octets.as_bytes();
                    let ip = match bytes.len() {
                        4 => IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])),
                        16 => {
                            let mut v6 = [0u8; 16];
                            v6.copy_from_slice(bytes);
                            IpAddr::V6(Ipv6Addr::from(v6))
                        }
                        n => {
                            return Err(CertSmithError::DecodingError(format!(
                                "IP address SAN with {n} octets"
                            )));
                        }
                    };
                    out.ip_addresses.push(ip);
                }
                _ => {
                    return Err(CertSmithError::InvalidInput(
                        "Unsupported general name type".to_string(),
                    ));
                }
            }
        }
        Ok(out)
    }
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertSmithError> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self, CertSmithError> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertSmithError> {
        let ku = X509KeyUsage(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertSmithError> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
///
/// Order and duplicates are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertSmithError> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertSmithError> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku
            .0
            .iter()
            .map(|oid| {
                ExtendedKeyUsageOption::from_oid(*oid).ok_or_else(|| {
                    CertSmithError::InvalidInput(format!(
                        "Unsupported extended key usage option {oid}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { usage })
    }
}

const ANY_EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");
const IPSEC_END_SYSTEM: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.5");
const IPSEC_TUNNEL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.6");
const IPSEC_USER: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.7");
const MICROSOFT_SERVER_GATED_CRYPTO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.10.3.3");
const NETSCAPE_SERVER_GATED_CRYPTO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113730.4.1");
const MICROSOFT_COMMERCIAL_CODE_SIGNING: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.22");
const MICROSOFT_KERNEL_CODE_SIGNING: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.61.1.1");

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtendedKeyUsageOption {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    IpsecEndSystem,
    IpsecTunnel,
    IpsecUser,
    TimeStamping,
    OcspSigning,
    MicrosoftServerGatedCrypto,
    NetscapeServerGatedCrypto,
    MicrosoftCommercialCodeSigning,
    MicrosoftKernelCodeSigning,
}

impl ExtendedKeyUsageOption {
    pub const ALL: [ExtendedKeyUsageOption; 14] = [
        ExtendedKeyUsageOption::Any,
        ExtendedKeyUsageOption::ServerAuth,
        ExtendedKeyUsageOption::ClientAuth,
        ExtendedKeyUsageOption::CodeSigning,
        ExtendedKeyUsageOption::EmailProtection,
        ExtendedKeyUsageOption::IpsecEndSystem,
        ExtendedKeyUsageOption::IpsecTunnel,
        ExtendedKeyUsageOption::IpsecUser,
        ExtendedKeyUsageOption::TimeStamping,
        ExtendedKeyUsageOption::OcspSigning,
        ExtendedKeyUsageOption::MicrosoftServerGatedCrypto,
        ExtendedKeyUsageOption::NetscapeServerGatedCrypto,
        ExtendedKeyUsageOption::MicrosoftCommercialCodeSigning,
        ExtendedKeyUsageOption::MicrosoftKernelCodeSigning,
    ];

    pub fn from_oid(oid: ObjectIdentifier) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|option| ObjectIdentifier::from(*option) == oid)
    }
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        use const_oid::db::rfc5912::{
            ID_KP_CLIENT_AUTH, ID_KP_CODE_SIGNING, ID_KP_EMAIL_PROTECTION, ID_KP_OCSP_SIGNING,
            ID_KP_SERVER_AUTH, ID_KP_TIME_STAMPING,
        };

        match value {
            ExtendedKeyUsageOption::Any => ANY_EXTENDED_KEY_USAGE,
            ExtendedKeyUsageOption::ServerAuth => ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::CodeSigning => ID_KP_CODE_SIGNING,
            ExtendedKeyUsageOption::EmailProtection => ID_KP_EMAIL_PROTECTION,
            ExtendedKeyUsageOption::IpsecEndSystem => IPSEC_END_SYSTEM,
            ExtendedKeyUsageOption::IpsecTunnel => IPSEC_TUNNEL,
            ExtendedKeyUsageOption::IpsecUser => IPSEC_USER,
            ExtendedKeyUsageOption::TimeStamping => ID_KP_TIME_STAMPING,
            ExtendedKeyUsageOption::OcspSigning => ID_KP_OCSP_SIGNING,
            ExtendedKeyUsageOption::MicrosoftServerGatedCrypto => MICROSOFT_SERVER_GATED_CRYPTO,
            ExtendedKeyUsageOption::NetscapeServerGatedCrypto => NETSCAPE_SERVER_GATED_CRYPTO,
            ExtendedKeyUsageOption::MicrosoftCommercialCodeSigning => {
                MICROSOFT_COMMERCIAL_CODE_SIGNING
            }
            ExtendedKeyUsageOption::MicrosoftKernelCodeSigning => MICROSOFT_KERNEL_CODE_SIGNING,
        }
    }
}

/// Represents the Subject Key Identifier (SKI) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertSmithError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_slice())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertSmithError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// Only the key identifier form is produced.
///
/// # Fields
/// * `key_identifier` - The issuer's subject key identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, CertSmithError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, CertSmithError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;
        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_constraints_encoding_decoding() {
        let original = BasicConstraints {
            is_ca: true,
            max_path_length: Some(3),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = BasicConstraints::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_subject_alt_name_mixes_dns_and_ip() {
        let original = SubjectAltName {
            dns_names: vec!["example.com".to_string(), "localhost".to_string()],
            ip_addresses: vec!["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()],
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_non_ascii_dns_name_is_rejected() {
        let san = SubjectAltName {
            dns_names: vec!["bücher.example".to_string()],
            ip_addresses: vec![],
        };
        assert!(matches!(
            san.to_x509_extension_value(),
            Err(CertSmithError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_extended_key_usage_keeps_order_and_duplicates() {
        let original = ExtendedKeyUsage {
            usage: vec![
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::MicrosoftKernelCodeSigning,
            ],
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = ExtendedKeyUsage::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original.usage, decoded.usage);
    }

    #[test]
    fn test_every_option_maps_back_from_its_oid() {
        for option in ExtendedKeyUsageOption::ALL {
            assert_eq!(
                ExtendedKeyUsageOption::from_oid(option.into()),
                Some(option)
            );
        }
    }

    #[test]
    fn test_key_identifiers() {
        let aki = AuthorityKeyIdentifier {
            key_identifier: vec![1, 2, 3, 4, 5],
        };
        let decoded =
            AuthorityKeyIdentifier::from_x509_extension_value(&aki.to_x509_extension_value().unwrap())
                .unwrap();
        assert_eq!(aki, decoded);

        let ski = SubjectKeyIdentifier(vec![9; 20]);
        let decoded =
            SubjectKeyIdentifier::from_x509_extension_value(&ski.to_x509_extension_value().unwrap())
                .unwrap();
        assert_eq!(ski, decoded);
    }
}
