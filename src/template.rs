//! Builds a certificate template out of a descriptor.
//!
//! The template is pure data: everything the signing step needs besides the
//! keys. CA and leaf rules are applied here, so a template that leaves this
//! module is structurally consistent.

use std::collections::HashSet;
use std::net::IpAddr;

use rand::Rng;
use time::OffsetDateTime;

use crate::cert::extensions::{ExtendedKeyUsageOption, FlagSet, KeyUsages, SubjectAltName};
use crate::cert::params::{DistinguishedName, Validity};
use crate::cert::usage::{self, Mapped};
use crate::descriptor::CertificateDescriptor;
use crate::error::{CertSmithError, Result};
use crate::key::KeyAlgorithm;

/// How unknown usage names and unparseable IP strings are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Warn and drop.
    #[default]
    Permissive,
    /// Fail the descriptor with `ConfigurationInvalid`.
    Strict,
}

/// Fully populated certificate fields, prior to signing.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateTemplate {
    pub subject: DistinguishedName,
    /// 0 for a CA, a random positive 63-bit value for a leaf.
    pub serial_number: u64,
    pub validity: Validity,
    pub key_usage: FlagSet<KeyUsages>,
    pub extended_key_usage: Vec<ExtendedKeyUsageOption>,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub is_ca: bool,
    /// Whether a BasicConstraints extension is emitted.
    pub basic_constraints_valid: bool,
}

impl CertificateTemplate {
    /// Minimal big-endian encoding of the serial number.
    pub fn serial_bytes(&self) -> Vec<u8> {
        let bytes = self.serial_number.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        bytes[first..].to_vec()
    }

    pub fn subject_alt_name(&self) -> SubjectAltName {
        SubjectAltName {
            dns_names: self.dns_names.clone(),
            ip_addresses: self.ip_addresses.clone(),
        }
    }
}

/// Leaf serial numbers handed out during one run.
#[derive(Debug, Default)]
pub struct SerialNumbers {
    issued: HashSet<u64>,
}

impl SerialNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws a positive, non-zero 63-bit serial not yet used in this run.
    pub fn next_leaf(&mut self) -> u64 {
        let mut rng = rand::rng();
        loop {
            let candidate = rng.random::<u64>() >> 1;
            if candidate != 0 && self.issued.insert(candidate) {
                return candidate;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

/// Checks everything about a descriptor that can be known before keys are
/// generated: CA references for leaves, the key algorithm, and in strict
/// mode the usage names and IP strings.
pub fn validate_descriptor(
    index: usize,
    descriptor: &CertificateDescriptor,
    strictness: Strictness,
) -> Result<()> {
    if !descriptor.is_ca && !descriptor.has_ca_references() {
        return Err(invalid(index, descriptor, "CA information not configured"));
    }
    KeyAlgorithm::resolve(&descriptor.key_algorithm, descriptor.key_bits)
        .map_err(|e| e.in_descriptor(index, &descriptor.name))?;
    // permissive warnings are left to the build step
    if strictness == Strictness::Strict {
        let checker = UsageCheck {
            index,
            descriptor,
            strictness,
        };
        checker.key_usage()?;
        checker.extended_key_usage()?;
        if !descriptor.is_ca {
            checker.ip_addresses()?;
        }
    }
    Ok(())
}

fn invalid(index: usize, descriptor: &CertificateDescriptor, reason: &str) -> CertSmithError {
    CertSmithError::ConfigurationInvalid {
        index,
        name: descriptor.name.clone(),
        reason: reason.to_string(),
    }
}

struct UsageCheck<'a> {
    index: usize,
    descriptor: &'a CertificateDescriptor,
    strictness: Strictness,
}

impl UsageCheck<'_> {
    fn key_usage(&self) -> Result<FlagSet<KeyUsages>> {
        let mapped = usage::map_key_usage(&self.descriptor.key_usage);
        self.unknown("key usage", mapped)
    }

    fn extended_key_usage(&self) -> Result<Vec<ExtendedKeyUsageOption>> {
        let mapped = usage::map_extended_key_usage(&self.descriptor.ext_key_usage);
        self.unknown("extended key usage", mapped)
    }

    fn unknown<T>(&self, kind: &str, mapped: Mapped<T>) -> Result<T> {
        if mapped.unknown.is_empty() {
            return Ok(mapped.value);
        }
        let names = mapped.unknown.join(", ");
        match self.strictness {
            Strictness::Strict => Err(invalid(
                self.index,
                self.descriptor,
                &format!("unknown {kind} names: {names}"),
            )),
            Strictness::Permissive => {
                log::warn!(
                    "certificate {} ({}): ignoring unknown {kind} names: {names}",
                    self.index,
                    self.descriptor.name
                );
                Ok(mapped.value)
            }
        }
    }

    fn ip_addresses(&self) -> Result<Vec<IpAddr>> {
        let mut addresses = Vec::with_capacity(self.descriptor.ips.len());
        for raw in &self.descriptor.ips {
            match raw.trim().parse::<IpAddr>() {
                Ok(address) => addresses.push(address),
                Err(_) if self.strictness == Strictness::Strict => {
                    return Err(invalid(
                        self.index,
                        self.descriptor,
                        &format!("invalid IP address `{raw}`"),
                    ));
                }
                Err(_) => log::warn!(
                    "certificate {} ({}): dropping invalid IP address `{raw}`",
                    self.index,
                    self.descriptor.name
                ),
            }
        }
        Ok(addresses)
    }
}

/// Turns descriptors into templates, handing out leaf serials as it goes.
#[derive(Debug)]
pub struct TemplateBuilder {
    strictness: Strictness,
    now: Option<OffsetDateTime>,
    serials: SerialNumbers,
}

impl TemplateBuilder {
    pub fn new(strictness: Strictness) -> Self {
        Self {
            strictness,
            now: None,
            serials: SerialNumbers::new(),
        }
    }

    /// Pins "now" for validity resolution. Without it the wall clock is read
    /// once per template.
    pub fn at(mut self, now: OffsetDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn build(
        &mut self,
        index: usize,
        descriptor: &CertificateDescriptor,
    ) -> Result<CertificateTemplate> {
        let checker = UsageCheck {
            index,
            descriptor,
            strictness: self.strictness,
        };
        let key_usage = checker.key_usage()?;
        let extended_key_usage = checker.extended_key_usage()?;
        let now = self.now.unwrap_or_else(OffsetDateTime::now_utc);
        let validity = Validity::resolve(
            descriptor.not_before,
            descriptor.not_after,
            descriptor.expiration_years(),
            now,
        )?;

        let template = if descriptor.is_ca {
            log::debug!("certificate {index} ({}): CA template", descriptor.name);
            CertificateTemplate {
                subject: DistinguishedName::from(&descriptor.subject),
                serial_number: 0,
                validity,
                key_usage,
                extended_key_usage,
                dns_names: Vec::new(),
                ip_addresses: Vec::new(),
                is_ca: true,
                basic_constraints_valid: true,
            }
        } else {
            CertificateTemplate {
                subject: DistinguishedName::from(&descriptor.subject),
                serial_number: self.serials.next_leaf(),
                validity,
                key_usage,
                extended_key_usage,
                dns_names: descriptor.dns.clone(),
                ip_addresses: checker.ip_addresses()?,
                is_ca: false,
                basic_constraints_valid: false,
            }
        };
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-10-14 12:00:00 UTC);

    fn leaf() -> CertificateDescriptor {
        CertificateDescriptor {
            name: "leaf".to_string(),
            ca_cert: "ca.crt".to_string(),
            ca_key: "ca.key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn ca_template_clears_names_and_uses_serial_zero() {
        let descriptor = CertificateDescriptor {
            name: "root".to_string(),
            is_ca: true,
            dns: vec!["a.example".to_string()],
            ips: vec!["10.0.0.1".to_string()],
            expiration: 10,
            ..Default::default()
        };
        let template = TemplateBuilder::new(Strictness::Permissive)
            .at(NOW)
            .build(0, &descriptor)
            .unwrap();
        assert!(template.is_ca);
        assert!(template.basic_constraints_valid);
        assert!(template.dns_names.is_empty());
        assert!(template.ip_addresses.is_empty());
        assert_eq!(template.serial_number, 0);
        assert_eq!(template.serial_bytes(), vec![0]);
        assert_eq!(template.validity.not_before, NOW);
    }

    #[test]
    fn leaf_template_forces_basic_constraints_off() {
        let descriptor = CertificateDescriptor {
            basic_constraints_valid: true,
            dns: vec!["svc.example".to_string()],
            ips: vec!["::1".to_string(), "not-an-ip".to_string()],
            ..leaf()
        };
        let mut builder = TemplateBuilder::new(Strictness::Permissive).at(NOW);
        let template = builder.build(1, &descriptor).unwrap();
        assert!(!template.basic_constraints_valid);
        assert!(!template.is_ca);
        assert_ne!(template.serial_number, 0);
        assert!(template.serial_number < 1 << 63);
        assert_eq!(template.dns_names, vec!["svc.example"]);
        assert_eq!(template.ip_addresses, vec!["::1".parse::<IpAddr>().unwrap()]);
        assert!(template.validity.is_zero());
    }

    #[test]
    fn strict_mode_rejects_unknown_names_and_bad_ips() {
        let mut builder = TemplateBuilder::new(Strictness::Strict);
        let unknown_usage = CertificateDescriptor {
            key_usage: vec!["KeyUsageEverything".to_string()],
            ..leaf()
        };
        let err = builder.build(3, &unknown_usage).unwrap_err();
        assert!(matches!(
            err,
            CertSmithError::ConfigurationInvalid { index: 3, ref reason, .. }
                if reason.contains("KeyUsageEverything")
        ));

        let bad_ip = CertificateDescriptor {
            ips: vec!["300.1.1.1".to_string()],
            ..leaf()
        };
        assert!(validate_descriptor(0, &bad_ip, Strictness::Strict).is_err());
        assert!(validate_descriptor(0, &bad_ip, Strictness::Permissive).is_ok());
    }

    #[test]
    fn leaf_without_ca_key_is_invalid() {
        let descriptor = CertificateDescriptor {
            ca_key: String::new(),
            ..leaf()
        };
        let err = validate_descriptor(1, &descriptor, Strictness::Permissive).unwrap_err();
        assert!(matches!(err, CertSmithError::ConfigurationInvalid { index: 1, .. }));
    }

    #[test]
    fn unsupported_key_algorithm_fails_validation() {
        let descriptor = CertificateDescriptor {
            key_algorithm: "ed448".to_string(),
            ..leaf()
        };
        let err = validate_descriptor(2, &descriptor, Strictness::Permissive).unwrap_err();
        assert!(matches!(err, CertSmithError::Descriptor { index: 2, .. }));
        assert!(matches!(
            err.root_cause(),
            CertSmithError::UnsupportedAlgorithm(_)
        ));
    }

    #[test]
    fn out_of_range_expiration_fails_the_build() {
        let descriptor = CertificateDescriptor {
            is_ca: true,
            expiration: 10_000,
            ..leaf()
        };
        let err = TemplateBuilder::new(Strictness::Permissive)
            .at(NOW)
            .build(0, &descriptor)
            .unwrap_err();
        assert!(matches!(err, CertSmithError::CertificateCreation(_)));
    }

    #[test]
    fn leaf_serials_are_unique_within_a_run() {
        let mut serials = SerialNumbers::new();
        let drawn: HashSet<u64> = (0..256).map(|_| serials.next_leaf()).collect();
        assert_eq!(drawn.len(), 256);
        assert_eq!(serials.len(), 256);
        assert!(!drawn.contains(&0));
    }
}
