//! Lookup file rendering and backup-then-overwrite replacement.
//!
//! A lookup file is never edited in place. The current version is renamed to
//! a sibling backup, then the complete new content is written to the original
//! path. How a failed backup is treated depends on the [`BackupPolicy`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::PhishTrapError;
use crate::fs_abstraction::FileSystem;

/// Action written next to every address in the REJECT map
pub const REJECT_ACTION: &str = "REJECT";

/// What to do with the previous version of a lookup file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupPolicy {
    /// Rename to `<path><suffix>`; failures are logged and ignored
    Tolerant { suffix: &'static str },
    /// Remove any old `<path><suffix>`, then rename; any failure aborts
    Strict { suffix: &'static str },
}

impl BackupPolicy {
    /// `.bak` backup used for the REJECT map
    pub const BAK: Self = Self::Tolerant { suffix: ".bak" };
    /// `.prev` backup used for the virtual trap map
    pub const PREV: Self = Self::Strict { suffix: ".prev" };
}

/// `/etc/postfix/map` + `.bak` -> `/etc/postfix/map.bak`
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// `<address>\tREJECT\n`
pub fn reject_line(address: &str) -> String {
    format!("{}\t{}\n", address, REJECT_ACTION)
}

/// `<address>\t<trap mailbox>\n`
pub fn trap_line(address: &str, reply_trap_address: &str) -> String {
    format!("{}\t{}\n", address, reply_trap_address)
}

/// header_checks rule redirecting mail whose From: or Reply-To: names `address`
pub fn header_rule(address: &str, quarantine_address: &str, escape: bool) -> String {
    let pattern = if escape {
        regex::escape(address)
    } else {
        address.to_string()
    };
    format!(
        "/(From:|Reply-To:).*{}/    REDIRECT {}\n",
        pattern, quarantine_address
    )
}

/// Concatenate one rendered line per address
pub fn render<I, S, F>(addresses: I, line: F) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(&str) -> String,
{
    addresses
        .into_iter()
        .map(|address| line(address.as_ref()))
        .collect()
}

/// Replaces lookup files through a [`FileSystem`]
pub struct LookupWriter<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
}

impl<'a, F: FileSystem + ?Sized> LookupWriter<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self { fs }
    }

    /// Move the current file out of the way. Returns the backup path when one
    /// was made.
    pub fn backup(
        &self,
        path: &Path,
        policy: BackupPolicy,
    ) -> Result<Option<PathBuf>, PhishTrapError> {
        match policy {
            BackupPolicy::Tolerant { suffix } => {
                let backup = backup_path(path, suffix);
                match self.fs.rename(path, &backup) {
                    Ok(()) => {
                        debug!("Backed up {} to {}", path.display(), backup.display());
                        Ok(Some(backup))
                    }
                    Err(e) => {
                        warn!("Could not back up {}: {}", path.display(), e);
                        Ok(None)
                    }
                }
            }
            BackupPolicy::Strict { suffix } => {
                let backup = backup_path(path, suffix);
                if self.fs.is_file(&backup) {
                    self.fs
                        .remove_file(&backup)
                        .map_err(|e| PhishTrapError::write(&backup, e))?;
                }
                self.fs
                    .rename(path, &backup)
                    .map_err(|e| PhishTrapError::write(path, e))?;
                debug!("Backed up {} to {}", path.display(), backup.display());
                Ok(Some(backup))
            }
        }
    }

    /// Write the complete contents of `path`, creating or truncating it
    pub fn write(&self, path: &Path, contents: &str) -> Result<(), PhishTrapError> {
        self.fs
            .write(path, contents.as_bytes())
            .map_err(|e| PhishTrapError::write(path, e))
    }

    /// Back up, then write the new version
    pub fn replace(
        &self,
        path: &Path,
        policy: BackupPolicy,
        contents: &str,
    ) -> Result<Option<PathBuf>, PhishTrapError> {
        let backup = self.backup(path, policy)?;
        self.write(path, contents)?;
        Ok(backup)
    }
}
