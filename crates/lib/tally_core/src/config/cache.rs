//! In-memory settings cache with TTL-based expiration.
//!
//! Caches both hits and misses: `Some(None)` means the store was consulted and
//! held no override for that key.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Default TTL for cached settings: 30 seconds.
pub const DEFAULT_SETTINGS_TTL_MS: i64 = 30_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Settings cache keyed by settings key.
#[derive(Debug)]
pub struct SettingsCache {
    entries: HashMap<String, CacheEntry>,
    /// TTL for entries (milliseconds).
    pub ttl_ms: i64,
}

impl SettingsCache {
    /// Create a new cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl_ms(DEFAULT_SETTINGS_TTL_MS)
    }

    pub fn with_ttl_ms(ttl_ms: i64) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms,
        }
    }

    /// Outer `None`: not cached or expired. Inner `None`: cached miss.
    pub fn get(&self, key: &str) -> Option<Option<String>> {
        self.entries.get(key).and_then(|entry| {
            if Utc::now() < entry.expires_at {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    /// Insert or update a cached value.
    pub fn set(&mut self, key: &str, value: Option<String>) {
        let expires_at = Utc::now() + chrono::Duration::milliseconds(self.ttl_ms);
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Remove a specific entry from the cache.
    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove all entries from the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self::new()
    }
}
