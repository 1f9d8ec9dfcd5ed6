use bon::Builder;
use const_oid::ObjectIdentifier;
use der::Tag;
use der::asn1::{Any, PrintableStringRef, SetOfVec};
use time::{Duration, OffsetDateTime};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{CertSmithError, Result};

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const PROVINCE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const STREET_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.9");
const POSTAL_CODE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.17");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const SERIAL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.5");

/// Distinguished name parameters for building an X.509 certificate.
///
/// Multi-valued attributes keep their order: each value becomes its own
/// RDN, emitted in the order C, ST, L, STREET, POSTALCODE, O, OU, CN,
/// SERIALNUMBER.
///
/// # Fields
/// * `common_name` - The common name (CN). Empty means absent.
/// * `serial_number` - The subject serial number attribute. Empty means absent.
/// * `country` - The countries (C).
/// * `province` - The states or provinces (ST).
/// * `locality` - The localities or cities (L).
/// * `street_address` - The street addresses (STREET).
/// * `postal_code` - The postal codes.
/// * `organization` - The organizations (O).
/// * `organizational_unit` - The organizational units (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    #[builder(default, into)]
    pub common_name: String,
    #[builder(default, into)]
    pub serial_number: String,
    #[builder(default)]
    pub country: Vec<String>,
    #[builder(default)]
    pub province: Vec<String>,
    #[builder(default)]
    pub locality: Vec<String>,
    #[builder(default)]
    pub street_address: Vec<String>,
    #[builder(default)]
    pub postal_code: Vec<String>,
    #[builder(default)]
    pub organization: Vec<String>,
    #[builder(default)]
    pub organizational_unit: Vec<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509-compatible format.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::Name> {
        let single = |value: &String| -> Vec<String> {
            if value.is_empty() {
                Vec::new()
            } else {
                vec![value.clone()]
            }
        };
        let attributes = [
            (COUNTRY, self.country.clone()),
            (PROVINCE, self.province.clone()),
            (LOCALITY, self.locality.clone()),
            (STREET_ADDRESS, self.street_address.clone()),
            (POSTAL_CODE, self.postal_code.clone()),
            (ORGANIZATION, self.organization.clone()),
            (ORGANIZATIONAL_UNIT, self.organizational_unit.clone()),
            (COMMON_NAME, single(&self.common_name)),
            (SERIAL_NUMBER, single(&self.serial_number)),
        ];

        let mut rdns = Vec::new();
        for (oid, values) in attributes {
            for value in values {
                let attribute = AttributeTypeAndValue {
                    oid,
                    value: directory_string(&value)?,
                };
                rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![
                    attribute,
                ])?));
            }
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes this crate does not model are skipped.
    pub fn from_x509_name(x509dn: &x509_cert::name::Name) -> Self {
        let mut dn = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = String::from_utf8_lossy(attr.value.value()).into_owned();
                match attr.oid {
                    COUNTRY => dn.country.push(value),
                    PROVINCE => dn.province.push(value),
                    LOCALITY => dn.locality.push(value),
                    STREET_ADDRESS => dn.street_address.push(value),
                    POSTAL_CODE => dn.postal_code.push(value),
                    ORGANIZATION => dn.organization.push(value),
                    ORGANIZATIONAL_UNIT => dn.organizational_unit.push(value),
                    COMMON_NAME => dn.common_name = value,
                    SERIAL_NUMBER => dn.serial_number = value,
                    _ => {}
                }
            }
        }
        dn
    }
}

/// PrintableString when the value allows it, UTF8String otherwise.
fn directory_string(value: &str) -> Result<Any> {
    let tag = if PrintableStringRef::new(value).is_ok() {
        Tag::PrintableString
    } else {
        Tag::Utf8String
    };
    Ok(Any::new(tag, value.as_bytes())?)
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// The window left behind when nothing was specified. Signing rejects it.
    pub const ZERO: Validity = Validity {
        not_before: OffsetDateTime::UNIX_EPOCH,
        not_after: OffsetDateTime::UNIX_EPOCH,
    };

    /// Creates a validity period starting now for the given number of days.
    ///
    /// # Arguments
    /// * `days` - The number of days for the validity period.
    ///
    /// # Returns
    /// A `Validity` object.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }

    /// Resolves a window from partially specified inputs, highest precedence first:
    ///
    /// 1. `not_before` and `not_after` both given: used verbatim.
    /// 2. only `not_after` given: the window starts at `now`.
    /// 3. `expiration_years` given: `now` to `now + 365 * years` days.
    /// 4. nothing usable: [`Validity::ZERO`].
    ///
    /// Ordering is not checked here. Fails with `CertificateCreation` when
    /// `expiration_years` reaches past the representable date range.
    pub fn resolve(
        not_before: Option<OffsetDateTime>,
        not_after: Option<OffsetDateTime>,
        expiration_years: Option<u32>,
        now: OffsetDateTime,
    ) -> Result<Self> {
        let validity = match (not_before, not_after, expiration_years) {
            (Some(not_before), Some(not_after), _) => Self {
                not_before,
                not_after,
            },
            (_, Some(not_after), _) => Self {
                not_before: now,
                not_after,
            },
            (_, None, Some(years)) if years > 0 => {
                let not_after = now
                    .checked_add(Duration::days(365 * i64::from(years)))
                    .ok_or_else(|| {
                        CertSmithError::CertificateCreation(format!(
                            "expiration of {years} years is out of range"
                        ))
                    })?;
                Self {
                    not_before: now,
                    not_after,
                }
            }
            _ => Self::ZERO,
        };
        Ok(validity)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// True when `not_before` is strictly earlier than `not_after`.
    pub fn is_chronological(&self) -> bool {
        self.not_before < self.not_after
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        if self.oid != E::OID {
            return Err(CertSmithError::InvalidInput(format!(
                "extension {} is not {}",
                self.oid,
                E::OID
            )));
        }
        E::from_x509_extension_value(&self.value)
    }
}
