//! # certsmith - Batch X.509 Certificate Generation
//!
//! certsmith turns declarative certificate descriptors (TOML or YAML) into
//! signed X.509 certificates and their private keys, using only rustcrypto
//! libraries. A descriptor is either a self-signed certificate authority or
//! a leaf signed by a CA key pair, which may come from disk or from an
//! earlier descriptor of the same batch.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048 to 8192-bit keys (generated and loaded)
//! - **ECDSA**: P-384 (generated and loaded), P-256 (loaded CA keys only)
//!
//! ## Pipeline
//!
//! 1. the whole batch is validated; a leaf without CA references fails here
//! 2. every certificate is generated in memory
//! 3. only then are `<path>/<name>.crt` and `<path>/<name>.key` written
//! 4. optionally, `<path>/<name>.p12` is produced with `openssl pkcs12`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certsmith::batch::{self, BatchOptions};
//! use certsmith::config;
//!
//! # fn main() -> Result<(), certsmith::error::CertSmithError> {
//! let descriptors = config::load_file("certs.toml".as_ref())?;
//! let artifacts = batch::run(&descriptors, BatchOptions::default())?;
//! for artifact in &artifacts {
//!     println!("{}", artifact.crt_path().display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing Without Files
//!
//! ```rust
//! use certsmith::{
//!     cert::params::{DistinguishedName, Validity},
//!     issuer::{self, SigningMaterial},
//!     key::KeyPair,
//!     template::CertificateTemplate,
//! };
//!
//! # fn main() -> Result<(), certsmith::error::CertSmithError> {
//! let template = CertificateTemplate {
//!     subject: DistinguishedName::builder().common_name("Example CA").build(),
//!     serial_number: 0,
//!     validity: Validity::for_days(365),
//!     key_usage: Default::default(),
//!     extended_key_usage: Vec::new(),
//!     dns_names: Vec::new(),
//!     ip_addresses: Vec::new(),
//!     is_ca: true,
//!     basic_constraints_valid: true,
//! };
//! let material = SigningMaterial { key: KeyPair::generate_ecdsa_p384(), template };
//! let cert = issuer::sign(&material, None)?;
//! cert.verify_issued_by(&cert)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: Key generation, PEM import/export and signing
//! - [`cert`]: Certificate encoding/decoding, extensions and usage names
//! - [`descriptor`] and [`config`]: Descriptor files
//! - [`template`]: Descriptor to certificate template
//! - [`chain`]: CA key pair loading
//! - [`issuer`]: Signing
//! - [`batch`]: The validate, generate, commit pipeline
//! - [`output`] and [`package`]: PEM files and PKCS#12 bundles
//! - [`error`]: Error types

pub mod batch;
pub mod cert;
pub mod chain;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod issuer;
pub mod key;
pub mod output;
pub mod package;
pub mod pem_utils;
pub mod tbs_certificate;
pub mod template;
