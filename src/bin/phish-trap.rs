//! phish-trap - add phishing reply addresses to the virtual trap map.

use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use phishtrap::cli::{init_logging, TrapCli};
use phishtrap::commands::trap::{self, ExitStatus};
use phishtrap::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match TrapCli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let status = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitStatus::Success,
                _ => ExitStatus::Usage,
            };
            let _ = e.print();
            return status.into();
        }
    };

    if let Err(e) = init_logging(cli.verbose, false) {
        eprintln!("{}", e);
        return ExitStatus::Usage.into();
    }

    let config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitStatus::Usage.into();
        }
    };

    let Some(input) = cli.input(&config.feed_url) else {
        return ExitStatus::Usage.into();
    };

    trap::run(&config, &input, cli.output_file.as_deref())
        .await
        .into()
}
