//! The two update pipelines.
//!
//! - [`reject`] rebuilds the REJECT map from recently reported addresses.
//! - [`trap`] merges addresses into the virtual trap map and header checks.

pub mod reject;
pub mod trap;
