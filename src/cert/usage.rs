//! Symbolic key usage names, as written in descriptor files, mapped onto
//! their certificate representation.
//!
//! Unknown names never fail here; they are handed back so the caller can
//! decide whether to warn or reject.

use super::extensions::{ExtendedKeyUsageOption, FlagSet, KeyUsages};

/// The result of mapping a list of names: the recognised value plus every
/// name that was not recognised, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapped<T> {
    pub value: T,
    pub unknown: Vec<String>,
}

pub fn key_usage_flag(name: &str) -> Option<KeyUsages> {
    let flag = match name {
        "KeyUsageDigitalSignature" => KeyUsages::DigitalSignature,
        "KeyUsageContentCommitment" => KeyUsages::NonRepudiation,
        "KeyUsageKeyEncipherment" => KeyUsages::KeyEncipherment,
        "KeyUsageDataEncipherment" => KeyUsages::DataEncipherment,
        "KeyUsageKeyAgreement" => KeyUsages::KeyAgreement,
        "KeyUsageCertSign" => KeyUsages::KeyCertSign,
        "KeyUsageCRLSign" => KeyUsages::CRLSign,
        "KeyUsageEncipherOnly" => KeyUsages::EncipherOnly,
        "KeyUsageDecipherOnly" => KeyUsages::DecipherOnly,
        _ => return None,
    };
    Some(flag)
}

pub fn extended_key_usage_option(name: &str) -> Option<ExtendedKeyUsageOption> {
    let option = match name {
        "ExtKeyUsageAny" => ExtendedKeyUsageOption::Any,
        "ExtKeyUsageServerAuth" => ExtendedKeyUsageOption::ServerAuth,
        "ExtKeyUsageClientAuth" => ExtendedKeyUsageOption::ClientAuth,
        "ExtKeyUsageCodeSigning" => ExtendedKeyUsageOption::CodeSigning,
        "ExtKeyUsageEmailProtection" => ExtendedKeyUsageOption::EmailProtection,
        "ExtKeyUsageIPSECEndSystem" => ExtendedKeyUsageOption::IpsecEndSystem,
        "ExtKeyUsageIPSECTunnel" => ExtendedKeyUsageOption::IpsecTunnel,
        "ExtKeyUsageIPSECUser" => ExtendedKeyUsageOption::IpsecUser,
        "ExtKeyUsageTimeStamping" => ExtendedKeyUsageOption::TimeStamping,
        "ExtKeyUsageOCSPSigning" => ExtendedKeyUsageOption::OcspSigning,
        "ExtKeyUsageMicrosoftServerGatedCrypto" => {
            ExtendedKeyUsageOption::MicrosoftServerGatedCrypto
        }
        "ExtKeyUsageNetscapeServerGatedCrypto" => ExtendedKeyUsageOption::NetscapeServerGatedCrypto,
        "ExtKeyUsageMicrosoftCommercialCodeSigning" => {
            ExtendedKeyUsageOption::MicrosoftCommercialCodeSigning
        }
        "ExtKeyUsageMicrosoftKernelCodeSigning" => {
            ExtendedKeyUsageOption::MicrosoftKernelCodeSigning
        }
        _ => return None,
    };
    Some(option)
}

/// ORs together the flags of every recognised key usage name.
pub fn map_key_usage<S: AsRef<str>>(names: &[S]) -> Mapped<FlagSet<KeyUsages>> {
    let mut value = FlagSet::<KeyUsages>::default();
    let mut unknown = Vec::new();
    for name in names {
        match key_usage_flag(name.as_ref()) {
            Some(flag) => value |= flag,
            None => unknown.push(name.as_ref().to_string()),
        }
    }
    Mapped { value, unknown }
}

/// Maps extended key usage names in order, keeping duplicates.
pub fn map_extended_key_usage<S: AsRef<str>>(names: &[S]) -> Mapped<Vec<ExtendedKeyUsageOption>> {
    let mut value = Vec::with_capacity(names.len());
    let mut unknown = Vec::new();
    for name in names {
        match extended_key_usage_option(name.as_ref()) {
            Some(option) => value.push(option),
            None => unknown.push(name.as_ref().to_string()),
        }
    }
    Mapped { value, unknown }
}
