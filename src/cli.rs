//! CLI argument parsing with clap.

use clap::builder::{NonEmptyStringValueParser, OsStringValueParser, TypedValueParser};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::DEFAULT_CONFIG_PATH;

/// Feed name accepted by `phish-trap -f` in place of a path
pub const REMOTE_SOURCE: &str = "remote";

/// Rebuild the REJECT map of recently reported phishing reply addresses
#[derive(Parser, Debug)]
#[command(name = "phish-reject")]
#[command(author, version)]
pub struct RejectCli {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Quiet mode (for cron)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Add phishing reply addresses to the virtual trap map and header checks.
///
/// Use a file name of 'remote' to fetch the current community list.
#[derive(Parser, Debug)]
#[command(name = "phish-trap")]
#[command(author, version)]
#[command(group(ArgGroup::new("input").required(true).args(["file_name", "address"])))]
pub struct TrapCli {
    /// File of addresses, a URL, or 'remote'
    #[arg(short, long, value_name = "ADDRESS_FILE", value_parser = NonEmptyStringValueParser::new())]
    pub file_name: Option<String>,

    /// A single address to add
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    pub address: Option<String>,

    /// Virtual map to update (default from config, also when empty)
    #[arg(
        short,
        long,
        value_name = "OUTPUT_FILE",
        value_parser = OsStringValueParser::new().map(PathBuf::from)
    )]
    pub output_file: Option<PathBuf>,

    /// Verbose mode (debug output)
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

/// Where `phish-trap` takes new addresses from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapInput {
    /// A feed location, `remote` already resolved to the configured URL
    Feed(String),
    /// One literal address
    Address(String),
}

impl TrapCli {
    /// Resolve the input argument against the configured feed URL
    pub fn input(&self, feed_url: &str) -> Option<TrapInput> {
        match (&self.file_name, &self.address) {
            (Some(name), None) if name == REMOTE_SOURCE => {
                Some(TrapInput::Feed(feed_url.to_string()))
            }
            (Some(name), None) => Some(TrapInput::Feed(name.clone())),
            (None, Some(address)) => Some(TrapInput::Address(address.clone())),
            _ => None,
        }
    }
}

/// Install the global tracing subscriber.
pub fn init_logging(verbose: bool, quiet: bool) -> anyhow::Result<()> {
    let log_level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
