//! JSON codecs for the two cache entry shapes.
//!
//! A backend mapping is the `{ "<name>_<type>" -> backend-native id }` object
//! stored under user-email and team-name keys. The user list is a flat JSON
//! array of directory usernames.

use std::collections::BTreeMap;

use crate::error::{CacheError, CacheResult};

/// Parse a backend mapping entry. Malformed JSON is a hard error for the
/// key it belongs to; the caller surfaces it as a per-backend failure.
pub fn parse_backend_mapping(key: &str, raw: &str) -> CacheResult<BTreeMap<String, String>> {
    serde_json::from_str(raw).map_err(|e| CacheError::MalformedEntry {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Serialize a backend mapping entry.
pub fn render_backend_mapping(mapping: &BTreeMap<String, String>) -> String {
    // BTreeMap serialization is deterministic, so rewrites are stable.
    serde_json::to_string(mapping).unwrap_or_else(|_| "{}".to_string())
}

/// Parse the `user_list` entry.
pub fn parse_user_list(raw: &str) -> CacheResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| CacheError::MalformedEntry {
        key: crate::USER_LIST_KEY.to_string(),
        message: e.to_string(),
    })
}

/// Serialize the `user_list` entry.
pub fn render_user_list(users: &[String]) -> String {
    serde_json::to_string(users).unwrap_or_else(|_| "[]".to_string())
}
