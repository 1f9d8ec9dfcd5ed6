use std::time::Duration;

use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use der::DateTime;
use time::{OffsetDateTime, UtcOffset};
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{CertSmithError, Result};

/// First year that must be encoded as GeneralizedTime (RFC 5280 section 4.1.2.5).
const GENERALIZED_TIME_FROM_YEAR: i32 = 2050;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian serial number bytes.
/// * `signature_algorithm` - The algorithm the issuer signs with.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The validity window.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions, in emission order.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| -> Result<x509_cert::ext::Extension> {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: encode_time(self.validity.not_before)?,
            not_after: encode_time(self.validity.not_after)?,
        };

        let serial_number = SerialNumber::new(strip_leading_zeros(&self.serial_number))?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.clone(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }
}

/// Encodes an instant with whole-second precision, as UTCTime before 2050
/// and GeneralizedTime from 2050 on.
pub fn encode_time(instant: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let seconds = u64::try_from(instant.unix_timestamp()).map_err(|_| {
        CertSmithError::EncodingError(format!("{instant} is before the unix epoch"))
    })?;
    let date_time = DateTime::from_unix_duration(Duration::from_secs(seconds))?;
    if instant.to_offset(UtcOffset::UTC).year() < GENERALIZED_TIME_FROM_YEAR {
        Ok(x509_cert::time::Time::UtcTime(UtcTime::from_date_time(
            date_time,
        )?))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_date_time(date_time),
        ))
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    &bytes[first..]
}
