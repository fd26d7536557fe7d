//! Addresses cleared from the reply list.
//!
//! The feed maintainers publish a companion list of `address,YYYYMMDD`
//! lines for addresses that were reported by mistake or have been shut
//! down. A clearing only applies to reports made on or before its date; a
//! later report lists the address again.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::error::PhishTrapError;
use crate::fetcher::{Fetcher, Source};
use crate::filter::parse_date_stamp;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearedList {
    /// Newest clearing date per lowercased address
    entries: HashMap<String, NaiveDate>,
}

impl ClearedList {
    /// Parse `address,YYYYMMDD` lines. `#` lines and blank lines are
    /// skipped; any other malformed line rejects the whole list.
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Self, PhishTrapError> {
        let mut entries: HashMap<String, NaiveDate> = HashMap::new();

        for line in lines.iter().map(AsRef::as_ref) {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split(',').collect();
            if fields.len() != 2 {
                return Err(PhishTrapError::parse(
                    line,
                    format!("expected 2 fields, found {}", fields.len()),
                ));
            }

            let address = fields[0].trim().to_lowercase();
            if !address.contains('@') {
                return Err(PhishTrapError::parse(line, "not a mail address"));
            }
            let cleared = parse_date_stamp(fields[1])
                .ok_or_else(|| PhishTrapError::parse(line, "date stamp is not YYYYMMDD"))?;

            entries
                .entry(address)
                .and_modify(|date| *date = (*date).max(cleared))
                .or_insert(cleared);
        }

        Ok(Self { entries })
    }

    /// Fetch and parse the list at `location`; no location means nothing is
    /// cleared.
    pub async fn load(fetcher: &Fetcher, location: Option<&str>) -> Result<Self, PhishTrapError> {
        let Some(location) = location else {
            return Ok(Self::default());
        };

        let lines = fetcher.fetch(&Source::parse(location)).await?;
        let list = Self::parse(&lines)?;
        debug!("{} cleared addresses", list.len());
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `address` is cleared for a report made on `reported`.
    /// Undated addresses are cleared whenever they are listed.
    pub fn clears(&self, address: &str, reported: Option<NaiveDate>) -> bool {
        match (self.entries.get(address), reported) {
            (Some(cleared), Some(reported)) => reported <= *cleared,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Drop cleared addresses from a set of newest report dates
    pub fn active(&self, reported: BTreeMap<String, NaiveDate>) -> BTreeSet<String> {
        reported
            .into_iter()
            .filter(|(address, date)| {
                let cleared = self.clears(address, Some(*date));
                if cleared {
                    debug!("Skipping cleared address {}", address);
                }
                !cleared
            })
            .map(|(address, _)| address)
            .collect()
    }
}
