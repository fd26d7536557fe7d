//! Merging fetched addresses into the persisted trap list.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

use crate::cleared::ClearedList;
use crate::error::PhishTrapError;
use crate::fs_abstraction::FileSystem;

/// Result of merging incoming addresses into an existing list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Existing plus new addresses, sorted
    pub addresses: Vec<String>,
    /// Length of the list before the merge
    pub previous: usize,
    /// Number of addresses that were not listed yet
    pub added: usize,
    /// Number of listed addresses dropped because they were cleared
    pub removed: usize,
}

impl MergeOutcome {
    /// Nothing new was added, so the lookup files need no rewrite
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Append every incoming address not already listed, then sort. Addresses
/// on the cleared list are left out, including ones already listed.
///
/// Membership is an exact string comparison; callers lowercase beforehand.
pub fn merge(
    existing: &[String],
    incoming: &[String],
    cleared: &ClearedList,
) -> MergeOutcome {
    debug!(
        "Merging {} addresses into {} existing addresses",
        incoming.len(),
        existing.len()
    );

    let mut addresses: Vec<String> = Vec::with_capacity(existing.len() + incoming.len());
    let mut removed = 0;
    for address in existing {
        if cleared.clears(address, None) {
            debug!("Dropping cleared address {}", address);
            removed += 1;
        } else {
            addresses.push(address.clone());
        }
    }

    let mut seen: HashSet<String> = addresses.iter().cloned().collect();
    let mut added = 0;
    for address in incoming {
        if cleared.clears(address, None) {
            debug!("Skipping cleared address {}", address);
        } else if seen.insert(address.clone()) {
            addresses.push(address.clone());
            added += 1;
        } else {
            debug!("Already listing {}", address);
        }
    }

    addresses.sort();

    MergeOutcome {
        addresses,
        previous: existing.len(),
        added,
        removed,
    }
}

/// Read the address column of a lookup file (`key<whitespace>value` lines).
///
/// A missing file is an empty list; other read errors are fatal.
pub fn read_address_list<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
) -> Result<Vec<String>, PhishTrapError> {
    let content = match fs.read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("{} does not exist yet, starting from an empty list", path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(PhishTrapError::Fetch(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    Ok(content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_lowercase)
        .collect())
}
