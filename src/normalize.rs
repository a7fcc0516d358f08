//! Canonical form for vehicle plates and unit names.
//!
//! Every identifier from every source goes through [`normalize_key`] before
//! it takes part in a join or a grouping, so `ABC-1234`, `abc 1234` and
//! `ABC1234` all meet on the same key.

use crate::config::KeyPolicy;

/// Canonicalises a free-form identifier under the given policy.
///
/// The function is idempotent for both policies.
pub fn normalize_key(raw: &str, policy: KeyPolicy) -> String {
    match policy {
        KeyPolicy::Lenient => raw
            .to_uppercase()
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .collect(),
        KeyPolicy::Strict => raw
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .collect(),
    }
}

/// [`normalize_key`] with the default lenient policy.
pub fn normalize(raw: &str) -> String {
    normalize_key(raw, KeyPolicy::Lenient)
}
