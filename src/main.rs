use clap::Parser;
use yangkit::CliError;
use yangkit::cli::{self, Cli};

/// Evaluates, atomizes or checks YANG XPath expressions from the command line.
fn main() -> Result<(), CliError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("yangkit=info")).init();

    let cli = Cli::parse();
    let report = cli::run(&cli)?;
    println!("{report}");
    Ok(())
}
