use std::process::ExitCode;

use anyhow::Context;
use certsmith::{batch, cli::Args, config};
use clap::{CommandFactory, Parser};

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    if let Some(format) = args.output_template {
        let sample = config::template(format).context("rendering the sample configuration")?;
        print!("{sample}");
        return Ok(());
    }

    let Some(file) = &args.file else {
        Args::command().print_help()?;
        return Ok(());
    };

    let descriptors = config::load_file(file)
        .with_context(|| format!("loading {}", file.display()))?;
    batch::run(&descriptors, args.batch_options())
        .with_context(|| format!("generating certificates from {}", file.display()))?;
    Ok(())
}
