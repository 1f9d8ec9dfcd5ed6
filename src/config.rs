//! Descriptor files: loading (TOML or YAML, chosen by extension) and the
//! sample configuration printed by `--output-template`.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::descriptor::{CertificateDescriptor, SubjectDescriptor};
use crate::error::{CertSmithError, Result};

/// Top level of a descriptor file: `certs = [ ... ]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateBatch {
    pub certs: Vec<CertificateDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from the file extension: `.toml`, `.yml` or `.yaml`.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yml") | Some("yaml") => Ok(ConfigFormat::Yaml),
            other => Err(CertSmithError::ConfigParse {
                path: path.to_path_buf(),
                reason: format!(
                    "unknown extension `{}` (expected .toml, .yml or .yaml)",
                    other.unwrap_or_default()
                ),
            }),
        }
    }
}

impl FromStr for ConfigFormat {
    type Err = CertSmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(CertSmithError::InvalidInput(format!(
                "unknown format `{s}` (expected toml or yaml)"
            ))),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFormat::Toml => f.write_str("toml"),
            ConfigFormat::Yaml => f.write_str("yaml"),
        }
    }
}

/// Reads and parses a descriptor file.
pub fn load_file(path: &Path) -> Result<Vec<CertificateDescriptor>> {
    let format = ConfigFormat::from_path(path)?;
    let contents = fs::read_to_string(path).map_err(|e| CertSmithError::io(path, e))?;
    let descriptors = parse_str(&contents, format).map_err(|reason| {
        CertSmithError::ConfigParse {
            path: path.to_path_buf(),
            reason,
        }
    })?;
    log::debug!(
        "loaded {} descriptors from {}",
        descriptors.len(),
        path.display()
    );
    Ok(descriptors)
}

/// Parses descriptor file contents. The error is the parser's message.
pub fn parse_str(
    contents: &str,
    format: ConfigFormat,
) -> std::result::Result<Vec<CertificateDescriptor>, String> {
    let batch: CertificateBatch = match format {
        ConfigFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string())?,
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string())?,
    };
    Ok(batch.certs)
}

/// A sample file with one root CA and one leaf signed by it.
pub fn sample() -> CertificateBatch {
    let root = CertificateDescriptor {
        path: "certs".to_string(),
        name: "root".to_string(),
        subject: SubjectDescriptor {
            country: vec!["US".to_string()],
            organization: vec!["your organization".to_string()],
            common_name: "your root CA".to_string(),
            ..Default::default()
        },
        is_ca: true,
        basic_constraints_valid: true,
        key_usage: vec![
            "KeyUsageCertSign".to_string(),
            "KeyUsageCRLSign".to_string(),
        ],
        expiration: 10,
        ..Default::default()
    };
    let leaf = CertificateDescriptor {
        path: "certs".to_string(),
        name: "your certificate name".to_string(),
        subject: SubjectDescriptor {
            organization: vec!["your organization".to_string()],
            common_name: "localhost".to_string(),
            ..Default::default()
        },
        ca_cert: "certs/root.crt".to_string(),
        ca_key: "certs/root.key".to_string(),
        key_usage: vec![
            "KeyUsageDigitalSignature".to_string(),
            "KeyUsageKeyEncipherment".to_string(),
        ],
        ext_key_usage: vec![
            "ExtKeyUsageServerAuth".to_string(),
            "ExtKeyUsageClientAuth".to_string(),
        ],
        dns: vec![
            "your domain 1".to_string(),
            "your domain 2".to_string(),
            "localhost".to_string(),
        ],
        ips: vec!["127.0.0.1".to_string(), "::1".to_string()],
        expiration: 1,
        password: "changeit".to_string(),
        ..Default::default()
    };
    CertificateBatch {
        certs: vec![root, leaf],
    }
}

/// Renders [`sample`] in `format`.
pub fn template(format: ConfigFormat) -> Result<String> {
    let sample = sample();
    match format {
        ConfigFormat::Toml => toml::to_string_pretty(&sample)
            .map_err(|e| CertSmithError::EncodingError(e.to_string())),
        ConfigFormat::Yaml => {
            serde_yaml::to_string(&sample).map_err(|e| CertSmithError::EncodingError(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/b.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("b.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("b.json")),
            Err(CertSmithError::ConfigParse { .. })
        ));
        assert!(ConfigFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn templates_parse_back() {
        for format in [ConfigFormat::Toml, ConfigFormat::Yaml] {
            let text = template(format).unwrap();
            let parsed = parse_str(&text, format).unwrap();
            assert_eq!(parsed, sample().certs, "{format}");
        }
    }

    #[test]
    fn toml_dates_may_be_quoted_rfc3339() {
        let text = r#"
[[certs]]
name = "leaf"
caCert = "ca.crt"
caKey = "ca.key"
notBefore = "2025-01-01T00:00:00Z"
notAfter = "2026-01-01T00:00:00+02:00"
"#;
        let parsed = parse_str(text, ConfigFormat::Toml).unwrap();
        assert_eq!(
            parsed[0].not_after,
            Some(time::macros::datetime!(2025-12-31 22:00:00 UTC))
        );
    }

    #[test]
    fn toml_dates_may_be_native_date_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("native.toml");
        fs::write(
            &path,
            r#"
[[certs]]
name = "leaf"
caCert = "ca.crt"
caKey = "ca.key"
notBefore = 2024-01-01T00:00:00Z
notAfter = 2025-01-01T06:30:00
"#,
        )
        .unwrap();
        let parsed = load_file(&path).unwrap();
        assert_eq!(
            parsed[0].not_before,
            Some(time::macros::datetime!(2024-01-01 00:00:00 UTC))
        );
        assert_eq!(
            parsed[0].not_after,
            Some(time::macros::datetime!(2025-01-01 06:30:00 UTC))
        );
    }

    #[test]
    fn dates_that_are_not_date_times_are_rejected() {
        let text = "[[certs]]\nname = \"leaf\"\nnotAfter = 2025-01-01\n";
        assert!(parse_str(text, ConfigFormat::Toml).is_err());
        let text = "certs:\n  - name: leaf\n    notAfter: next year\n";
        assert!(parse_str(text, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn syntax_errors_carry_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "certs: [ {name: ").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, CertSmithError::ConfigParse { path: ref p, .. } if *p == path));
    }
}
