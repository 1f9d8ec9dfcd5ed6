use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::cert::params::DistinguishedName;

pub const DEFAULT_KEY_ALGORITHM: &str = "rsa";
pub const DEFAULT_KEY_BITS: usize = 2048;

/// One entry of a descriptor file: everything needed to produce one
/// certificate and its private key.
///
/// Every field is optional in the file. Dates are RFC 3339, written either as
/// strings or, in TOML, as offset date-times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CertificateDescriptor {
    /// Output directory.
    pub path: String,
    /// Base file name of the `.crt`, `.key` and `.p12` outputs.
    pub name: String,
    pub subject: SubjectDescriptor,
    pub is_ca: bool,
    pub ca_cert: String,
    pub ca_key: String,
    pub basic_constraints_valid: bool,
    pub key_usage: Vec<String>,
    pub ext_key_usage: Vec<String>,
    pub dns: Vec<String>,
    #[serde(rename = "IPs")]
    pub ips: Vec<String>,
    #[serde(
        with = "date_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<OffsetDateTime>,
    #[serde(
        with = "date_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_after: Option<OffsetDateTime>,
    /// Lifetime in 365-day years; 0 means unset.
    pub expiration: u32,
    /// PKCS#12 export password.
    pub password: String,
    pub passin: String,
    pub passout: String,
    pub key_algorithm: String,
    pub key_bits: usize,
}

impl Default for CertificateDescriptor {
    fn default() -> Self {
        Self {
            path: String::new(),
            name: String::new(),
            subject: SubjectDescriptor::default(),
            is_ca: false,
            ca_cert: String::new(),
            ca_key: String::new(),
            basic_constraints_valid: false,
            key_usage: Vec::new(),
            ext_key_usage: Vec::new(),
            dns: Vec::new(),
            ips: Vec::new(),
            not_before: None,
            not_after: None,
            expiration: 0,
            password: String::new(),
            passin: String::new(),
            passout: String::new(),
            key_algorithm: DEFAULT_KEY_ALGORITHM.to_string(),
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

impl CertificateDescriptor {
    pub fn expiration_years(&self) -> Option<u32> {
        (self.expiration > 0).then_some(self.expiration)
    }

    /// True when both CA references are filled in.
    pub fn has_ca_references(&self) -> bool {
        !self.ca_cert.trim().is_empty() && !self.ca_key.trim().is_empty()
    }
}

/// Optional dates as RFC 3339 strings, also accepting native TOML date-times
/// on input.
mod date_time {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DateInput {
        Native(toml::value::Datetime),
        Text(String),
    }

    pub fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        time::serde::rfc3339::option::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let text = match Option::<DateInput>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(DateInput::Native(mut native)) => {
                // local date-times are read as UTC
                if native.date.is_some() && native.time.is_some() && native.offset.is_none() {
                    native.offset = Some(toml::value::Offset::Z);
                }
                native.to_string()
            }
            Some(DateInput::Text(text)) => text,
        };
        OffsetDateTime::parse(text.trim(), &Rfc3339)
            .map(Some)
            .map_err(|e| D::Error::custom(format!("`{text}` is not an RFC 3339 date-time: {e}")))
    }
}

/// Subject attributes as written in descriptor files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectDescriptor {
    pub country: Vec<String>,
    pub organization: Vec<String>,
    pub organizational_unit: Vec<String>,
    pub locality: Vec<String>,
    pub province: Vec<String>,
    pub street_address: Vec<String>,
    pub postal_code: Vec<String>,
    pub serial_number: String,
    pub common_name: String,
}

impl From<&SubjectDescriptor> for DistinguishedName {
    fn from(subject: &SubjectDescriptor) -> Self {
        DistinguishedName::builder()
            .common_name(subject.common_name.clone())
            .serial_number(subject.serial_number.clone())
            .country(subject.country.clone())
            .province(subject.province.clone())
            .locality(subject.locality.clone())
            .street_address(subject.street_address.clone())
            .postal_code(subject.postal_code.clone())
            .organization(subject.organization.clone())
            .organizational_unit(subject.organizational_unit.clone())
            .build()
    }
}
