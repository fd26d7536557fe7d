//! Feed parsing and the two address selection policies.
//!
//! - [`RecencyPolicy`] keeps addresses reported inside a trailing window and
//!   treats any malformed line as fatal.
//! - [`ValidityPolicy`] keeps anything shaped like a mail address and drops
//!   the rest.
//!
//! Feed lines look like `address,code,YYYYMMDD`; `#` starts a comment. The
//! code is one or more reply types from [`REPLY_TYPES`].

use chrono::{Days, NaiveDate};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::PhishTrapError;

/// Loose mail address shape. The `.` before the TLD is deliberately left
/// unescaped, so it matches any character.
static ADDRESS_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[[:word:]][[:word:].-]*@[[:word:].-]+.[[:word:]]{2,4}")
        .expect("address pattern is valid")
});

/// Reply types a feed record may carry, one letter each
pub const REPLY_TYPES: &str = "ABCDE";

/// One parsed feed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    /// Lowercased address
    pub address: String,
    /// Reply type letters, uppercased
    pub code: String,
    /// Date the address was reported
    pub reported: NaiveDate,
}

impl AddressRecord {
    /// Parse a line positionally into exactly three fields.
    pub fn parse_line(line: &str) -> Result<Self, PhishTrapError> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 3 {
            return Err(PhishTrapError::parse(
                line,
                format!("expected 3 fields, found {}", fields.len()),
            ));
        }

        let code = parse_reply_type(fields[1]).ok_or_else(|| {
            PhishTrapError::parse(line, format!("reply type must be one of {}", REPLY_TYPES))
        })?;
        let reported = parse_date_stamp(fields[2])
            .ok_or_else(|| PhishTrapError::parse(line, "date stamp is not YYYYMMDD"))?;

        Ok(Self {
            address: fields[0].trim().to_lowercase(),
            code,
            reported,
        })
    }
}

/// Uppercased reply type letters, `None` when empty or outside [`REPLY_TYPES`]
pub fn parse_reply_type(field: &str) -> Option<String> {
    let code = field.trim().to_ascii_uppercase();
    if code.is_empty() || !code.chars().all(|c| REPLY_TYPES.contains(c)) {
        return None;
    }
    Some(code)
}

/// Parse the leading `YYYYMMDD` of a date field; anything after it is ignored.
pub fn parse_date_stamp(field: &str) -> Option<NaiveDate> {
    let stamp = field.trim().get(..8)?;
    if !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year = stamp[0..4].parse().ok()?;
    let month = stamp[4..6].parse().ok()?;
    let day = stamp[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#')
}

/// Keeps addresses reported strictly after `today - window_days`.
#[derive(Debug, Clone, Copy)]
pub struct RecencyPolicy {
    today: NaiveDate,
    window_days: u32,
}

impl RecencyPolicy {
    pub fn new(today: NaiveDate, window_days: u32) -> Self {
        Self { today, window_days }
    }

    /// Policy anchored at the local calendar date
    pub fn from_today(window_days: u32) -> Self {
        Self::new(chrono::Local::now().date_naive(), window_days)
    }

    /// Oldest date that is no longer current
    pub fn cutoff(&self) -> NaiveDate {
        self.today
            .checked_sub_days(Days::new(u64::from(self.window_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn is_current(&self, reported: NaiveDate) -> bool {
        reported > self.cutoff()
    }

    /// Current addresses with their newest report date. The first malformed
    /// line aborts the pass.
    pub fn select<S: AsRef<str>>(
        &self,
        lines: &[S],
    ) -> Result<BTreeMap<String, NaiveDate>, PhishTrapError> {
        let mut addresses: BTreeMap<String, NaiveDate> = BTreeMap::new();

        for line in lines.iter().map(AsRef::as_ref) {
            if is_comment(line) || line.trim().is_empty() {
                continue;
            }

            let record = AddressRecord::parse_line(line)?;
            if self.is_current(record.reported) {
                addresses
                    .entry(record.address)
                    .and_modify(|date| *date = (*date).max(record.reported))
                    .or_insert(record.reported);
            }
        }

        debug!(
            "{} addresses reported after {}",
            addresses.len(),
            self.cutoff().format("%Y-%m-%d")
        );
        Ok(addresses)
    }

    /// Current addresses, sorted
    pub fn apply<S: AsRef<str>>(&self, lines: &[S]) -> Result<BTreeSet<String>, PhishTrapError> {
        Ok(self.select(lines)?.into_keys().collect())
    }
}

/// Keeps lines whose first field looks like a mail address.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidityPolicy;

impl ValidityPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Whether a lowercased candidate has the shape of an address
    pub fn is_valid(&self, candidate: &str) -> bool {
        !candidate.is_empty() && ADDRESS_SHAPE.is_match(candidate)
    }

    /// Select well-formed addresses in feed order. Duplicates are kept.
    pub fn apply<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        let mut addresses = Vec::new();

        for line in lines.iter().map(AsRef::as_ref) {
            let line = line.trim();
            if line.is_empty() || is_comment(line) {
                continue;
            }

            let candidate = first_field(line).to_lowercase();
            if self.is_valid(&candidate) {
                addresses.push(candidate);
            } else {
                debug!("Didn't match **{}**", candidate);
            }
        }

        addresses
    }
}

/// A single address given on the command line, used without validation
pub fn single_address(arg: &str) -> Vec<String> {
    vec![first_field(arg).trim().to_lowercase()]
}

fn first_field(line: &str) -> &str {
    line.split(',').next().unwrap_or_default()
}
