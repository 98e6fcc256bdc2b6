//! Tracks how the message strings of one exception type evolve across the
//! revision history of a source tree: scan a sequence of revisions, fold the
//! sightings into per-message revision ranges, and report what changed
//! between adjacent revisions.

pub mod config;
pub mod range;
pub mod report;
pub mod scan;
pub mod store;
pub mod vcs;
