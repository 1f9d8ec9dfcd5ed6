use std::fs;
use std::path::Path;

use crate::batch::Artifact;
use crate::error::{CertSmithError, Result};

/// Writes `<path>/<name>.key` and then `<path>/<name>.crt` as PEM, creating
/// the directory when missing.
pub fn write_artifact(artifact: &Artifact) -> Result<()> {
    if !artifact.path.as_os_str().is_empty() {
        fs::create_dir_all(&artifact.path).map_err(|e| CertSmithError::io(&artifact.path, e))?;
    }

    let key_path = artifact.key_path();
    write_private(&key_path, artifact.key.to_pem()?.as_bytes())?;
    log::info!("wrote {}", key_path.display());

    let crt_path = artifact.crt_path();
    fs::write(&crt_path, artifact.certificate.to_pem()?)
        .map_err(|e| CertSmithError::io(&crt_path, e))?;
    log::info!("wrote {}", crt_path.display());
    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| CertSmithError::io(path, e))?;
    file.write_all(contents)
        .map_err(|e| CertSmithError::io(path, e))
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).map_err(|e| CertSmithError::io(path, e))
}
