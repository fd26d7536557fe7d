//! # phishtrap - Postfix lookup tables for phishing reply addresses
//!
//! Keeps a mail relay's phishing-reply trap lists in sync with the
//! community-maintained list of addresses used by phishers to collect
//! replies.
//!
//! ## Programs
//!
//! - `phish-reject` fetches the list, keeps addresses reported in the last
//!   30 days and rewrites a recipient access map of `<address>\tREJECT`
//!   lines, then runs postmap on it.
//! - `phish-trap` merges addresses from a file, the remote list or the
//!   command line into a virtual map that redirects outbound replies to a
//!   trap mailbox, regenerates a header_checks regex file quarantining mail
//!   from those addresses, and runs postmap when the list changed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (clap)              phish-reject / phish-trap          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml)     paths, feed URL, trap mailboxes    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Fetcher (reqwest)       URL or local file -> lines         │
//! │  Filter (chrono, regex)  recency window / address shape     │
//! │  Cleared list            addresses withdrawn from the feed  │
//! │  Merger                  existing + new, sorted             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Writer (FileSystem)     backup, then rewrite lookup files  │
//! │  Publisher (Command)     postmap [type:]file                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use phishtrap::fetcher::{Fetcher, Source};
//! use phishtrap::filter::RecencyPolicy;
//! use phishtrap::writer::{reject_line, render};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let lines = Fetcher::new()?
//!         .fetch(&Source::parse("/tmp/phishing_reply_addresses"))
//!         .await?;
//!     let addresses = RecencyPolicy::from_today(30).apply(&lines)?;
//!     print!("{}", render(&addresses, reject_line));
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cleared`] - Addresses cleared from the reply list
//! - [`cli`] - Command-line interface definitions and logging setup
//! - [`cmd_abstraction`] - Mockable command execution
//! - [`commands`] - The two update pipelines
//! - [`config`] - Configuration parsing and validation
//! - [`error`] - Error taxonomy
//! - [`fetcher`] - Feed retrieval over HTTP or from disk
//! - [`filter`] - Feed parsing and address selection policies
//! - [`fs_abstraction`] - Mockable filesystem access
//! - [`lock`] - File locking against concurrent runs
//! - [`merger`] - Merging new addresses into the persisted list
//! - [`publisher`] - postmap invocation
//! - [`writer`] - Lookup file formats and backup-then-overwrite

pub mod cleared;
pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod fs_abstraction;
pub mod lock;
pub mod merger;
pub mod publisher;
pub mod writer;

pub use config::Config;
pub use error::PhishTrapError;
