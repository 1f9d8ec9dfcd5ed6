//! use certsmith::error::CertSmithError;

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CertSmithError>;

/// Represents errors that can occur while turning descriptors into certificates.
///
/// Every variant carries enough context to be logged verbatim.
#[derive(Debug, Error, Clone)]
pub enum CertSmithError {
    /// A descriptor is structurally invalid (e.g. a leaf without CA references).
    #[error("certificate {index} ({name}): configuration invalid: {reason}")]
    ConfigurationInvalid {
        index: usize,
        name: String,
        reason: String,
    },

    /// The requested key algorithm or strength is not implemented.
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Neither the CA certificate nor the CA key exists.
    #[error("CA key pair not found: {cert} / {key}")]
    CaPairNotFound { cert: PathBuf, key: PathBuf },

    /// CA material exists but cannot be used.
    #[error("CA key pair unreadable ({cert} / {key}): {reason}")]
    CaPairUnreadable {
        cert: PathBuf,
        key: PathBuf,
        reason: String,
    },

    /// The signing step rejected the template.
    #[error("Create certificate error: {0}")]
    CertificateCreation(String),

    /// Reading or writing a file failed.
    #[error("IO error on {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    /// The external PKCS#12 packaging tool failed.
    #[error("PKCS#12 packaging failed: {0}")]
    Packaging(String),

    /// The descriptor file could not be parsed.
    #[error("Failed to parse config {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A failure while processing one descriptor of a batch.
    #[error("certificate {index} ({name}): {source}")]
    Descriptor {
        index: usize,
        name: String,
        #[source]
        source: Box<CertSmithError>,
    },
}

impl CertSmithError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        CertSmithError::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Wraps `self` with the position and name of the descriptor it came from.
    ///
    /// Errors that already name their descriptor are returned unchanged.
    pub fn in_descriptor(self, index: usize, name: &str) -> Self {
        match self {
            CertSmithError::ConfigurationInvalid { .. } | CertSmithError::Descriptor { .. } => self,
            other => CertSmithError::Descriptor {
                index,
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through descriptor context.
    pub fn root_cause(&self) -> &CertSmithError {
        match self {
            CertSmithError::Descriptor { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<der::Error> for CertSmithError {
    /// Converts a `der::Error` into a `CertSmithError`.
    fn from(err: der::Error) -> Self {
        CertSmithError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for CertSmithError {
    fn from(err: rsa::Error) -> Self {
        CertSmithError::CertificateCreation(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CertSmithError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CertSmithError::EncodingError(err.to_string())
    }
}
