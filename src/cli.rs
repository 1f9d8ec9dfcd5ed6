use std::path::PathBuf;

use clap::Parser;

use crate::batch::BatchOptions;
use crate::config::ConfigFormat;
use crate::template::Strictness;

#[derive(Parser, Debug)]
#[command(name = "certsmith")]
#[command(about = "Generate CA and leaf certificates from a TOML or YAML descriptor file")]
#[command(version)]
pub struct Args {
    /// Descriptor file (.toml, .yml or .yaml)
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Print a sample descriptor file (toml | yaml) and exit
    #[arg(short = 'o', long = "output-template", value_parser = parse_format)]
    pub output_template: Option<ConfigFormat>,

    /// Also write a PKCS#12 bundle per certificate (needs openssl on PATH)
    #[arg(long)]
    pub p12: bool,

    /// Fail on unknown usage names and invalid IP addresses instead of ignoring them
    #[arg(long)]
    pub strict: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_format(s: &str) -> Result<ConfigFormat, String> {
    s.parse().map_err(|e: crate::error::CertSmithError| e.to_string())
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::builder()
            .strictness(if self.strict {
                Strictness::Strict
            } else {
                Strictness::Permissive
            })
            .pkcs12(self.p12)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_batch_options() {
        let args = Args::parse_from(["certsmith", "-f", "certs.yaml", "--p12", "--strict", "-v"]);
        assert_eq!(args.file, Some(PathBuf::from("certs.yaml")));
        let options = args.batch_options();
        assert!(options.pkcs12);
        assert_eq!(options.strictness, Strictness::Strict);
        assert_eq!(args.log_level(), "debug");
    }

    #[test]
    fn template_format_is_validated() {
        let args = Args::parse_from(["certsmith", "-o", "yaml"]);
        assert_eq!(args.output_template, Some(ConfigFormat::Yaml));
        assert!(Args::try_parse_from(["certsmith", "-o", "json"]).is_err());
    }
}
