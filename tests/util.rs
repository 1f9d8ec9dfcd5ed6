#![allow(dead_code)]

use std::fs;
use std::path::Path;

use certsmith::descriptor::{CertificateDescriptor, SubjectDescriptor};

pub fn root_descriptor(dir: &Path, name: &str) -> CertificateDescriptor {
    CertificateDescriptor {
        path: dir.display().to_string(),
        name: name.to_string(),
        subject: SubjectDescriptor {
            country: vec!["CH".to_string()],
            organization: vec!["certsmith tests".to_string()],
            common_name: format!("{name} CA"),
            ..Default::default()
        },
        is_ca: true,
        basic_constraints_valid: true,
        key_usage: vec!["KeyUsageCertSign".to_string(), "KeyUsageCRLSign".to_string()],
        expiration: 10,
        ..Default::default()
    }
}

pub fn leaf_descriptor(dir: &Path, name: &str, ca: &str) -> CertificateDescriptor {
    CertificateDescriptor {
        path: dir.display().to_string(),
        name: name.to_string(),
        subject: SubjectDescriptor {
            organization: vec!["certsmith tests".to_string()],
            common_name: name.to_string(),
            ..Default::default()
        },
        ca_cert: dir.join(format!("{ca}.crt")).display().to_string(),
        ca_key: dir.join(format!("{ca}.key")).display().to_string(),
        key_usage: vec![
            "KeyUsageDigitalSignature".to_string(),
            "KeyUsageKeyEncipherment".to_string(),
        ],
        ext_key_usage: vec!["ExtKeyUsageServerAuth".to_string()],
        dns: vec!["example.com".to_string()],
        ips: vec!["127.0.0.1".to_string()],
        expiration: 1,
        key_algorithm: "ecdsa".to_string(),
        ..Default::default()
    }
}

/// DER bytes of the PEM certificate at `path`.
pub fn read_cert_der(path: &Path) -> Vec<u8> {
    let pem = fs::read_to_string(path).unwrap();
    let (label, der) = certsmith::pem_utils::pem_to_der(&pem).unwrap();
    assert_eq!(label, "CERTIFICATE");
    der
}

/// Sorted file names in `dir`.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
