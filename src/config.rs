//! Configuration management for phishtrap.
//!
//! Every field has a default matching the values the relays have always run
//! with, so a missing config file is not an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PhishTrapError;

/// Default location of the config file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/phishtrap/config.yaml";

/// Community-maintained list of phishing reply addresses
pub const DEFAULT_FEED_URL: &str =
    "http://anti-phishing-email-reply.googlecode.com/svn/trunk/phishing_reply_addresses";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Feed of `address,code,YYYYMMDD` lines (URL or local path)
    pub feed_url: String,

    /// List of cleared `address,YYYYMMDD` lines (URL or local path).
    /// Cleared addresses are kept out of both maps.
    pub cleared_source: Option<String>,

    /// Lookup table compiler
    pub postmap: PathBuf,

    /// Advisory lock held for the duration of a run
    pub lock_file: PathBuf,

    /// Settings for the REJECT map (`phish-reject`)
    pub reject: RejectConfig,

    /// Settings for the reply trap maps (`phish-trap`)
    pub trap: TrapConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            cleared_source: None,
            postmap: PathBuf::from("/usr/sbin/postmap"),
            lock_file: PathBuf::from("/run/phishtrap.lock"),
            reject: RejectConfig::default(),
            trap: TrapConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RejectConfig {
    /// Recipient access map written as `<address>\tREJECT`
    pub map_file: PathBuf,

    /// How far back a reported address is still considered active
    pub window_days: u32,

    /// Exit non-zero on failure instead of always exiting 0
    pub strict_exit: bool,
}

impl Default for RejectConfig {
    fn default() -> Self {
        Self {
            map_file: PathBuf::from("/etc/postfix/phishing-disallowed-recipients"),
            window_days: 30,
            strict_exit: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrapConfig {
    /// Virtual map redirecting trap addresses to `reply_trap_address`
    pub virtual_map: PathBuf,

    /// header_checks regex file
    pub header_regex: PathBuf,

    /// Table type prefix handed to postmap (`hash:` etc.), empty for none
    pub map_type: String,

    /// Mailbox capturing outbound replies to phishers
    pub reply_trap_address: String,

    /// Mailbox receiving messages whose headers name a phisher
    pub quarantine_address: String,

    /// Escape regex metacharacters of addresses in header rules
    pub escape_header_patterns: bool,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            virtual_map: PathBuf::from("/etc/postfix/virtual_trap"),
            header_regex: PathBuf::from("/etc/postfix/phish_headers.regex"),
            map_type: "hash".to_string(),
            reply_trap_address: "phish-reply-trap@ourdomain.edu".to_string(),
            quarantine_address: "phish-quarantine@ourdomain.edu".to_string(),
            escape_header_patterns: false,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            debug!(
                "No config file at {:?}, using built-in defaults",
                path.as_ref()
            );
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), PhishTrapError> {
        if self.feed_url.trim().is_empty() {
            return Err(PhishTrapError::Config("feed_url must not be empty".into()));
        }

        if self
            .cleared_source
            .as_deref()
            .is_some_and(|source| source.trim().is_empty())
        {
            return Err(PhishTrapError::Config(
                "cleared_source must not be empty when set".into(),
            ));
        }

        if self.postmap.as_os_str().is_empty() {
            return Err(PhishTrapError::Config("postmap must not be empty".into()));
        }

        if self.reject.window_days == 0 {
            return Err(PhishTrapError::Config(
                "reject.window_days must be at least 1".into(),
            ));
        }

        for (name, value) in [
            ("trap.reply_trap_address", &self.trap.reply_trap_address),
            ("trap.quarantine_address", &self.trap.quarantine_address),
        ] {
            if !value.contains('@') {
                return Err(PhishTrapError::Config(format!(
                    "{} must be a mail address, got '{}'",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Table type prefix for the virtual map, `None` when left blank
    pub fn trap_map_type(&self) -> Option<&str> {
        let map_type = self.trap.map_type.trim();
        (!map_type.is_empty()).then_some(map_type)
    }
}
