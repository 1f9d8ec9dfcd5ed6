//! Certificates produced by certsmith, read back with an independent parser.

mod util;

use certsmith::batch;
use certsmith::template::Strictness;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;

const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
const ECDSA_WITH_SHA384: &str = "1.2.840.10045.4.3.3";

fn subject_key_id<'a>(cert: &'a X509Certificate<'a>) -> Option<&'a [u8]> {
    cert.extensions()
        .iter()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(id) => Some(id.0),
            _ => None,
        })
}

fn authority_key_id<'a>(cert: &'a X509Certificate<'a>) -> Option<&'a [u8]> {
    cert.extensions()
        .iter()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::AuthorityKeyIdentifier(aki) => {
                aki.key_identifier.as_ref().map(|id| id.0)
            }
            _ => None,
        })
}

#[test]
fn rsa_root_and_ecdsa_leaf_parse_independently() {
    let dir = tempfile::tempdir().unwrap();
    let descriptors = vec![
        util::root_descriptor(dir.path(), "root"),
        util::leaf_descriptor(dir.path(), "leaf1", "root"),
    ];
    let artifacts = batch::generate(&descriptors, Strictness::Strict).unwrap();
    batch::commit(&artifacts).unwrap();

    let root_der = util::read_cert_der(&dir.path().join("root.crt"));
    let leaf_der = util::read_cert_der(&dir.path().join("leaf1.crt"));
    let (_, root) = X509Certificate::from_der(&root_der).unwrap();
    let (_, leaf) = X509Certificate::from_der(&leaf_der).unwrap();

    // root: self-signed CA, serial 0, ten 365-day years
    assert_eq!(root.version().0, 2);
    assert!(root.is_ca());
    assert_eq!(root.tbs_certificate.raw_serial(), &[0u8][..]);
    assert_eq!(root.subject().as_raw(), root.issuer().as_raw());
    let lifetime = root.validity().not_after.timestamp() - root.validity().not_before.timestamp();
    assert_eq!(lifetime, 10 * 365 * 24 * 60 * 60);
    let basic_constraints = root.basic_constraints().unwrap().unwrap();
    assert!(basic_constraints.critical);
    assert!(basic_constraints.value.ca);
    let key_usage = root.key_usage().unwrap().unwrap();
    assert!(key_usage.critical);
    assert!(key_usage.value.key_cert_sign());
    assert!(key_usage.value.crl_sign());
    assert!(!key_usage.value.digital_signature());
    assert!(root.subject_alternative_name().unwrap().is_none());
    assert_eq!(
        root.signature_algorithm.algorithm.to_id_string(),
        SHA256_WITH_RSA
    );
    assert!(root.signature_algorithm.parameters.is_some());
    assert!(authority_key_id(&root).is_none());

    // leaf: issued by root, no basic constraints, random serial
    assert_eq!(leaf.issuer().as_raw(), root.subject().as_raw());
    assert!(leaf.basic_constraints().unwrap().is_none());
    assert!(
        leaf.tbs_certificate
            .raw_serial()
            .iter()
            .any(|byte| *byte != 0)
    );
    let san = leaf.subject_alternative_name().unwrap().unwrap();
    assert!(!san.critical);
    assert!(matches!(
        san.value.general_names.as_slice(),
        &[GeneralName::DNSName("example.com"), GeneralName::IPAddress(&[127, 0, 0, 1])]
    ));
    let eku = leaf.extended_key_usage().unwrap().unwrap();
    assert!(eku.value.server_auth);
    assert!(!eku.value.client_auth);
    let leaf_usage = leaf.key_usage().unwrap().unwrap();
    assert!(leaf_usage.value.digital_signature());
    assert!(leaf_usage.value.key_encipherment());
    assert_eq!(authority_key_id(&leaf), subject_key_id(&root));
    assert!(subject_key_id(&leaf).is_some());
    assert_ne!(subject_key_id(&leaf), subject_key_id(&root));
    assert_eq!(
        leaf.signature_algorithm.algorithm.to_id_string(),
        SHA256_WITH_RSA
    );
    assert_eq!(
        leaf.subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok()),
        Some("leaf1")
    );
}

#[test]
fn ecdsa_root_signs_with_sha384() {
    let dir = tempfile::tempdir().unwrap();
    let mut root = util::root_descriptor(dir.path(), "root");
    root.key_algorithm = "ecdsa".to_string();
    root.expiration = 30;
    let artifacts = batch::generate(&[root], Strictness::Permissive).unwrap();
    let der = artifacts[0].certificate_der().unwrap();

    let (_, cert) = X509Certificate::from_der(&der).unwrap();
    assert_eq!(
        cert.signature_algorithm.algorithm.to_id_string(),
        ECDSA_WITH_SHA384
    );
    assert!(cert.signature_algorithm.parameters.is_none());
    // notAfter lies past 2049 and is encoded as GeneralizedTime
    assert!(cert.validity().not_after.timestamp() > cert.validity().not_before.timestamp());
    assert_eq!(
        cert.subject()
            .iter_organization()
            .next()
            .and_then(|o| o.as_str().ok()),
        Some("certsmith tests")
    );
}
