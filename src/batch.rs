//! The batch pipeline: validate every descriptor, generate every certificate
//! in memory, and only then write anything to disk.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use bon::Builder;

use crate::cert::Certificate;
use crate::chain::{self, CaPair};
use crate::descriptor::CertificateDescriptor;
use crate::error::{CertSmithError, Result};
use crate::issuer::{self, SigningMaterial};
use crate::key::{KeyAlgorithm, KeyPair};
use crate::output;
use crate::package::Pkcs12Packager;
use crate::template::{self, Strictness, TemplateBuilder};

/// Run-wide settings.
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct BatchOptions {
    #[builder(default)]
    pub strictness: Strictness,
    /// Also produce `<name>.p12` for every artifact.
    #[builder(default)]
    pub pkcs12: bool,
}

/// The output of one descriptor, held in memory until the batch is committed.
#[derive(Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub name: String,
    pub certificate: Certificate,
    pub key: KeyPair,
    /// PKCS#12 export password.
    pub password: String,
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("certificate", &self.certificate)
            .field("key", &self.key)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Artifact {
    pub fn crt_path(&self) -> PathBuf {
        self.path.join(format!("{}.crt", self.name))
    }

    pub fn key_path(&self) -> PathBuf {
        self.path.join(format!("{}.key", self.name))
    }

    pub fn p12_path(&self) -> PathBuf {
        self.path.join(format!("{}.p12", self.name))
    }

    pub fn certificate_der(&self) -> Result<Vec<u8>> {
        self.certificate.to_der()
    }

    pub fn key_der(&self) -> Result<Vec<u8>> {
        self.key.to_der()
    }
}

/// Checks the whole batch before any key is generated. The first offending
/// descriptor is reported by its position.
pub fn validate(descriptors: &[CertificateDescriptor], strictness: Strictness) -> Result<()> {
    for (index, descriptor) in descriptors.iter().enumerate() {
        template::validate_descriptor(index, descriptor, strictness)?;
    }
    log::debug!("validated {} descriptors", descriptors.len());
    Ok(())
}

/// Generates every artifact in memory, in batch order.
///
/// A leaf may name a CA produced earlier in the same batch; such references
/// are satisfied from memory before the disk is consulted.
pub fn generate(
    descriptors: &[CertificateDescriptor],
    strictness: Strictness,
) -> Result<Vec<Artifact>> {
    let mut templates = TemplateBuilder::new(strictness);
    let mut artifacts: Vec<Artifact> = Vec::with_capacity(descriptors.len());

    for (index, descriptor) in descriptors.iter().enumerate() {
        let artifact = generate_one(&mut templates, index, descriptor, &artifacts)
            .map_err(|e| e.in_descriptor(index, &descriptor.name))?;
        artifacts.push(artifact);
    }
    Ok(artifacts)
}

fn generate_one(
    templates: &mut TemplateBuilder,
    index: usize,
    descriptor: &CertificateDescriptor,
    earlier: &[Artifact],
) -> Result<Artifact> {
    let algorithm = KeyAlgorithm::resolve(&descriptor.key_algorithm, descriptor.key_bits)?;
    let key = KeyPair::generate_for(algorithm)?;
    let template = templates.build(index, descriptor)?;
    let material = SigningMaterial { key, template };

    let ca = if descriptor.is_ca {
        None
    } else {
        Some(find_ca(
            Path::new(&descriptor.ca_cert),
            Path::new(&descriptor.ca_key),
            earlier,
        )?)
    };

    let certificate = issuer::sign(&material, ca.as_ref())?;
    log::debug!(
        "certificate {index} ({}): generated {algorithm:?}",
        descriptor.name
    );
    Ok(Artifact {
        path: PathBuf::from(&descriptor.path),
        name: descriptor.name.clone(),
        certificate,
        key: material.key,
        password: descriptor.password.clone(),
    })
}

fn find_ca(cert_path: &Path, key_path: &Path, earlier: &[Artifact]) -> Result<CaPair> {
    let cert_wanted = normalize(cert_path);
    let key_wanted = normalize(key_path);
    let in_memory = earlier.iter().rev().find(|artifact| {
        normalize(&artifact.crt_path()) == cert_wanted
            && normalize(&artifact.key_path()) == key_wanted
    });
    match in_memory {
        Some(artifact) => {
            log::debug!("using CA {} from this batch", artifact.name);
            CaPair::new(artifact.certificate.clone(), artifact.key.clone()).map_err(|e| {
                CertSmithError::CaPairUnreadable {
                    cert: cert_path.to_path_buf(),
                    key: key_path.to_path_buf(),
                    reason: e.to_string(),
                }
            })
        }
        None => chain::resolve(cert_path, key_path),
    }
}

/// Absolute, lexically normalised form of `path`. Symlinks are not resolved.
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Writes every artifact, in batch order.
pub fn commit(artifacts: &[Artifact]) -> Result<()> {
    for artifact in artifacts {
        output::write_artifact(artifact)?;
    }
    Ok(())
}

/// Validate, generate and commit one batch, then package if requested.
pub fn run(descriptors: &[CertificateDescriptor], options: BatchOptions) -> Result<Vec<Artifact>> {
    validate(descriptors, options.strictness)?;
    // locate the packager up front so a missing tool fails before any write
    let packager = if options.pkcs12 {
        Some(Pkcs12Packager::locate()?)
    } else {
        None
    };
    let artifacts = generate(descriptors, options.strictness)?;
    commit(&artifacts)?;
    if let Some(packager) = packager {
        package_all(&packager, &artifacts)?;
    }
    log::info!("generated {} certificates", artifacts.len());
    Ok(artifacts)
}

pub fn package_all(packager: &Pkcs12Packager, artifacts: &[Artifact]) -> Result<()> {
    for (index, artifact) in artifacts.iter().enumerate() {
        packager
            .package(artifact)
            .map_err(|e| e.in_descriptor(index, &artifact.name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_lexical() {
        let base = std::env::current_dir().unwrap();
        assert_eq!(normalize(Path::new("a/./b/../c.crt")), base.join("a/c.crt"));
        assert_eq!(normalize(Path::new("/x/y/../z")), PathBuf::from("/x/z"));
    }

    #[test]
    fn artifact_paths_join_path_and_name() {
        let descriptor = CertificateDescriptor {
            path: "out".to_string(),
            name: "root".to_string(),
            is_ca: true,
            expiration: 1,
            key_algorithm: "ecdsa".to_string(),
            ..Default::default()
        };
        let artifacts = generate(std::slice::from_ref(&descriptor), Strictness::Permissive)
            .unwrap();
        let artifact = &artifacts[0];
        assert_eq!(artifact.crt_path(), PathBuf::from("out/root.crt"));
        assert_eq!(artifact.key_path(), PathBuf::from("out/root.key"));
        assert_eq!(artifact.p12_path(), PathBuf::from("out/root.p12"));
        assert!(!artifact.certificate_der().unwrap().is_empty());
        assert!(matches!(
            KeyPair::from_pem(&artifact.key.to_pem().unwrap()).unwrap(),
            KeyPair::EcdsaP384(_)
        ));
        assert!(!artifact.key_der().unwrap().is_empty());
    }

    #[test]
    fn artifact_debug_hides_the_password() {
        let descriptor = CertificateDescriptor {
            name: "root".to_string(),
            is_ca: true,
            expiration: 1,
            key_algorithm: "ecdsa".to_string(),
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let artifacts = generate(&[descriptor], Strictness::Permissive).unwrap();
        assert_eq!(artifacts[0].password, "hunter2");
        let printed = format!("{:?}", artifacts[0]);
        assert!(printed.contains("root"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn leaf_signed_by_ca_from_the_same_batch() {
        let root = CertificateDescriptor {
            path: "mem".to_string(),
            name: "root".to_string(),
            is_ca: true,
            expiration: 1,
            key_algorithm: "ecdsa".to_string(),
            ..Default::default()
        };
        let leaf = CertificateDescriptor {
            path: "mem".to_string(),
            name: "leaf".to_string(),
            ca_cert: "./mem/root.crt".to_string(),
            ca_key: "mem/../mem/root.key".to_string(),
            expiration: 1,
            key_algorithm: "ecdsa".to_string(),
            ..Default::default()
        };
        let artifacts = generate(&[root, leaf], Strictness::Permissive).unwrap();
        artifacts[1]
            .certificate
            .verify_issued_by(&artifacts[0].certificate)
            .unwrap();
    }

    #[test]
    fn generation_errors_name_their_descriptor() {
        let leaf = CertificateDescriptor {
            name: "orphan".to_string(),
            ca_cert: "/nonexistent/ca.crt".to_string(),
            ca_key: "/nonexistent/ca.key".to_string(),
            expiration: 1,
            key_algorithm: "ecdsa".to_string(),
            ..Default::default()
        };
        let err = generate(&[leaf], Strictness::Permissive).unwrap_err();
        assert!(matches!(
            err,
            CertSmithError::Descriptor { index: 0, ref name, .. } if name == "orphan"
        ));
        assert!(matches!(
            err.root_cause(),
            CertSmithError::CaPairNotFound { .. }
        ));
    }
}
