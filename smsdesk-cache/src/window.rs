use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Windows older than this are treated as absent.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

const ALL: &str = "all";

/// Cache key derived from a pagination window and its filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey(String);

impl WindowKey {
    /// Missing or empty filters both map to `all`.
    pub fn new(offset: u64, service: Option<&str>, country: Option<&str>) -> Self {
        let service = service.filter(|s| !s.is_empty()).unwrap_or(ALL);
        let country = country.filter(|c| !c.is_empty()).unwrap_or(ALL);
        Self(format!("{offset}:{service}:{country}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fetched window. Replaced as a whole, never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheWindow<T> {
    pub key: String,
    pub payload: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> CacheWindow<T> {
    pub fn new(key: impl Into<String>, payload: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload,
            fetched_at,
        }
    }
}

/// `true` while `now - fetched_at < ttl`.
///
/// A `fetched_at` in the future (clock moved backwards) counts as fresh.
pub fn is_valid<T>(window: &CacheWindow<T>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match now.signed_duration_since(window.fetched_at).to_std() {
        Ok(age) => age < ttl,
        Err(_) => true,
    }
}
