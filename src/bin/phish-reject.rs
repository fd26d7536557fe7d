//! phish-reject - REJECT map of recently reported phishing reply addresses.

use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use phishtrap::cli::{init_logging, RejectCli};
use phishtrap::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = RejectCli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match phishtrap::commands::reject::run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{:#}", e);
            // Failures historically still exit 0; cron wrappers rely on it
            if config.reject.strict_exit {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
