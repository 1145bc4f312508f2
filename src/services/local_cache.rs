// Local in-process result cache
//
// First cache tier consulted by the base executor: bounded, TTL'd, with LRU
// eviction when full. Keys are the exact SQL text of the query.
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    rows: Vec<Value>,
    cached_at: Instant,
    ttl: Duration,
    last_accessed: Instant,
    hit_count: u64,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// Hit ratio in [0.0, 1.0]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct LocalResultCache {
    entries: Mutex<HashMap<String, Entry>>,
    max_size: usize,
    default_ttl: Duration,
    stats: Mutex<CacheStats>,
}

impl LocalResultCache {
    pub fn new(max_size: usize, default_ttl_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size,
            default_ttl: Duration::from_secs(default_ttl_secs),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Get cached rows for `sql` if present and not expired
    pub fn get(&self, sql: &str) -> Option<Vec<Value>> {
        let mut entries = self.entries.lock().unwrap();
        let mut stats = self.stats.lock().unwrap();

        if let Some(entry) = entries.get_mut(sql) {
            if entry.is_expired() {
                entries.remove(sql);
                stats.misses += 1;
                stats.expirations += 1;
                tracing::debug!("Local cache expired for sql: {}", sql);
                return None;
            }

            entry.hit_count += 1;
            entry.last_accessed = Instant::now();
            stats.hits += 1;
            tracing::debug!("Local cache hit (hit_count: {})", entry.hit_count);
            return Some(entry.rows.clone());
        }

        stats.misses += 1;
        None
    }

    /// Store rows under `sql`, evicting the least recently used entry if full
    pub fn put(&self, sql: &str, rows: Vec<Value>, ttl: Option<Duration>) {
        let mut entries = self.entries.lock().unwrap();

        if entries.len() >= self.max_size && !entries.contains_key(sql) {
            self.evict_lru(&mut entries);
        }

        let now = Instant::now();
        entries.insert(
            sql.to_string(),
            Entry {
                rows,
                cached_at: now,
                ttl: ttl.unwrap_or(self.default_ttl),
                last_accessed: now,
                hit_count: 0,
            },
        );

        tracing::debug!("Local cache populated (size: {})", entries.len());
    }

    /// Drop the entry for `sql` if present
    pub fn remove(&self, sql: &str) {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(sql).is_some() {
            tracing::debug!("Local cache entry removed");
        }
    }

    fn evict_lru(&self, entries: &mut HashMap<String, Entry>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            entries.remove(&key);
            self.stats.lock().unwrap().evictions += 1;
            tracing::debug!("Evicted local cache entry: {}", key);
        }
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        let count = entries.len();
        entries.clear();
        tracing::info!("Cleared {} local cache entries", count);
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn size(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
