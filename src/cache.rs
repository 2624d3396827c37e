use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};

/// Maximum number of cache entries before eviction kicks in
const MAX_CACHE_ENTRIES: usize = 1000;

/// Key under which the full actor directory snapshot is stored.
pub const ACTOR_DIRECTORY_KEY: &str = "actors:all";

/// Cache entry with expiration and access tracking
#[derive(Clone)]
struct CacheEntry {
    data: String,
    expires_at: Instant,
    last_accessed: Instant,
    size_bytes: usize,
}

/// TTL cache for read-mostly snapshots (the actor directory, mainly).
/// A zero TTL disables caching entirely.
pub struct TtlCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Get cached data if it exists and hasn't expired
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled() {
            return None;
        }

        if let Some(mut entry) = self.entries.get_mut(key) {
            if Instant::now() < entry.expires_at {
                entry.last_accessed = Instant::now();
                if let Ok(data) = serde_json::from_str(&entry.data) {
                    return Some(data);
                }
            } else {
                drop(entry);
                self.entries.remove(key);
            }
        }

        None
    }

    /// Store `data` under `key` for the configured TTL
    pub fn set<T: Serialize>(&self, key: &str, data: &T) -> Result<(), serde_json::Error> {
        if !self.enabled() {
            return Ok(());
        }

        if self.entries.len() >= MAX_CACHE_ENTRIES {
            self.evict_lru_entries();
        }

        let json_data = serde_json::to_string(data)?;
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                size_bytes: json_data.len(),
                data: json_data,
                expires_at: now + self.ttl,
                last_accessed: now,
            },
        );
        Ok(())
    }

    /// Removes the oldest 20% of entries by last access
    fn evict_lru_entries(&self) {
        let current_size = self.entries.len();
        let target_remove = current_size / 5;
        if target_remove == 0 {
            return;
        }

        let mut entries: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_accessed))
            .collect();
        entries.sort_by_key(|(_, last_accessed)| *last_accessed);

        for (key, _) in entries.iter().take(target_remove) {
            self.entries.remove(key);
        }

        tracing::info!(
            "🗑️  Cache eviction: removed {} LRU entries (cache size: {} -> {})",
            target_remove,
            current_size,
            self.entries.len()
        );
    }

    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let before_count = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        let removed = before_count - self.entries.len();

        if removed > 0 {
            tracing::info!("🧹 Cleaned up {} expired cache entries", removed);
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut total_size_bytes = 0;
        let mut expired_count = 0;

        for entry in self.entries.iter() {
            total_size_bytes += entry.value().size_bytes;
            if now >= entry.value().expires_at {
                expired_count += 1;
            }
        }

        CacheStats {
            entry_count: self.entries.len(),
            total_size_bytes,
            expired_count,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_size_bytes: usize,
    pub expired_count: usize,
}
