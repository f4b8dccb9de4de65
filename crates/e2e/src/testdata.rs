//! Ephemeral test data
//!
//! Names are `<prefix>-<millis>-<random>` with fixed-width parts so that no
//! generated name is a substring of another; table lookups match rows by text.

use std::collections::HashSet;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

const SUFFIX_LEN: usize = 10;

/// Prefix for generated API key names
pub const API_KEY_PREFIX: &str = "stormcheck";

/// A collision-resistant display name: `prefix-<13 digit millis>-<10 alphanumerics>`
pub fn unique_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}-{:013}-{}", prefix, Utc::now().timestamp_millis(), suffix)
}

/// Name for a freshly created API key
pub fn api_key_name() -> String {
    unique_name(API_KEY_PREFIX)
}

/// Generate `count` names, all distinct
pub fn unique_names(prefix: &str, count: usize) -> Vec<String> {
    let mut seen = HashSet::with_capacity(count);
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let name = unique_name(prefix);
        if seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}
