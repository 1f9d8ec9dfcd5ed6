//! PKCS#12 bundles, produced by the external `openssl` tool from the
//! already written `.crt` and `.key` files.

use std::path::PathBuf;
use std::process::Command;

use crate::batch::Artifact;
use crate::error::{CertSmithError, Result};

pub const DEFAULT_PROGRAM: &str = "openssl";

#[derive(Debug, Clone)]
pub struct Pkcs12Packager {
    program: PathBuf,
}

impl Pkcs12Packager {
    /// Finds `openssl` on `PATH`.
    pub fn locate() -> Result<Self> {
        let program = which::which(DEFAULT_PROGRAM).map_err(|e| {
            CertSmithError::Packaging(format!("{DEFAULT_PROGRAM} not found on PATH: {e}"))
        })?;
        log::debug!("using {}", program.display());
        Ok(Self { program })
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `pkcs12 -export` for one artifact and returns the bundle path.
    pub fn package(&self, artifact: &Artifact) -> Result<PathBuf> {
        let p12_path = artifact.p12_path();
        let output = Command::new(&self.program)
            .arg("pkcs12")
            .arg("-export")
            .arg("-in")
            .arg(artifact.crt_path())
            .arg("-inkey")
            .arg(artifact.key_path())
            .arg("-out")
            .arg(&p12_path)
            .arg("-password")
            .arg(format!("pass:{}", artifact.password))
            .output()
            .map_err(|e| {
                CertSmithError::Packaging(format!("{}: {e}", self.program.display()))
            })?;

        if !output.status.success() {
            return Err(CertSmithError::Packaging(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        log::info!("wrote {}", p12_path.display());
        Ok(p12_path)
    }
}
