//! `phish-reject`: REJECT map of recently reported phishing reply addresses.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cleared::ClearedList;
use crate::cmd_abstraction::{CommandExecutor, RealCommandExecutor};
use crate::config::Config;
use crate::fetcher::{Fetcher, Source};
use crate::filter::RecencyPolicy;
use crate::fs_abstraction::{real_fs, FileSystem};
use crate::lock::LockGuard;
use crate::publisher::Publisher;
use crate::writer::{reject_line, render, BackupPolicy, LookupWriter};

/// Run the REJECT map update
pub async fn run(config: &Config) -> Result<()> {
    let policy = RecencyPolicy::from_today(config.reject.window_days);
    run_with(config, &policy, real_fs(), &RealCommandExecutor::new()).await
}

/// Run the update with an injected date policy, filesystem and executor
pub async fn run_with<F, E>(
    config: &Config,
    policy: &RecencyPolicy,
    fs: &F,
    executor: &E,
) -> Result<()>
where
    F: FileSystem + ?Sized,
    E: CommandExecutor + ?Sized,
{
    let lock = LockGuard::acquire(&config.lock_file)?;
    debug!("Holding {}", lock.path().display());

    let fetcher = Fetcher::new()?;
    let source = Source::parse(&config.feed_url);
    let lines = fetcher
        .fetch(&source)
        .await
        .with_context(|| format!("failed to open url {}", source))?;

    let cleared = ClearedList::load(&fetcher, config.cleared_source.as_deref())
        .await
        .context("failed to load cleared addresses")?;

    let addresses = cleared.active(policy.select(&lines)?);
    info!(
        "{} addresses reported in the last {} days",
        addresses.len(),
        config.reject.window_days
    );

    let map_file = &config.reject.map_file;
    LookupWriter::new(fs).replace(
        map_file,
        BackupPolicy::BAK,
        &render(&addresses, reject_line),
    )?;

    let report = Publisher::new(&config.postmap).publish_with_executor(executor, map_file);
    if !report.success {
        println!("{}", report.output);
    }

    Ok(())
}
