//! Relevance filtering for keyword-search hits.
//!
//! The upstream search is keyword based, so it returns records that merely
//! mention a word similar to the package name. A record is kept when the
//! package name appears (case-insensitively) in its English description or in
//! any CPE identifier of its affected configurations. The match is kept
//! deliberately loose; affected-version matching is not attempted.

use crate::source::RawVulnerability;

/// Returns true if `record` plausibly describes `package_name`.
pub fn is_relevant(record: &RawVulnerability, package_name: &str) -> bool {
    let needle = package_name.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }

    let in_description = record
        .english_description()
        .is_some_and(|d| d.to_lowercase().contains(&needle));

    in_description
        || record
            .platform_identifiers()
            .any(|cpe| cpe.to_lowercase().contains(&needle))
}
