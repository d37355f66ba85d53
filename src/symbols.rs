//! Symbol discovery and active-set selection.

use std::collections::HashSet;

/// Case-insensitive normalization used as the canonical lookup key
/// everywhere a symbol name is compared.
pub fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Compute the effective active set for one pipeline iteration.
///
/// `requested` of `None` selects every currently-available symbol.
/// Otherwise the result is the case-insensitive intersection of `requested`
/// with `available`, preserving `available`'s original casing and order,
/// and silently dropping requested names that aren't currently available.
pub fn effective_active_set(available: &[String], requested: Option<&[String]>) -> Vec<String> {
    match requested {
        None => available.to_vec(),
        Some(list) => {
            let wanted: HashSet<String> = list.iter().map(|s| normalize(s)).collect();
            let mut seen = HashSet::new();
            available
                .iter()
                .filter(|name| {
                    let key = normalize(name);
                    wanted.contains(&key) && seen.insert(key)
                })
                .cloned()
                .collect()
        }
    }
}
