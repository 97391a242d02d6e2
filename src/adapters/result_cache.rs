//! Bounded LRU cache of generated values keyed by schema fingerprint.

use lru::LruCache;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 256;

struct CacheEntry {
    value: Value,
    written_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe LRU cache with optional time-to-live.
///
/// `get` promotes the entry; an expired entry is removed on access and
/// reported as a miss.
pub struct ResultCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        Self::build(capacity, Some(ttl))
    }

    fn build(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        // A panic mid-operation cannot leave the LRU structurally broken.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.written_at.elapsed() >= ttl)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if !self.is_expired(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace; evicts the least recently used entry when full.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.lock().put(
            key.into(),
            CacheEntry {
                value,
                written_at: Instant::now(),
            },
        );
    }

    /// Presence check that does not touch recency.
    pub fn has(&self, key: &str) -> bool {
        self.lock()
            .peek(key)
            .is_some_and(|entry| !self.is_expired(entry))
    }

    pub fn delete(&self, key: &str) -> bool {
        self.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        CacheStats {
            size: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Deterministic cache key for a schema plus generation options.
///
/// Object keys are hashed in document order. Generated objects follow the
/// order of `properties`, so schemas that differ only in key order get
/// separate entries.
pub fn fingerprint(
    schema: &Value,
    root: Option<&Value>,
    strict: bool,
    property_name: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hash_value(&mut hasher, schema);
    if let Some(root) = root {
        hasher.update(b"|root:");
        hash_value(&mut hasher, root);
    }
    hasher.update(if strict { b"|strict" as &[u8] } else { b"|lenient" });
    if let Some(name) = property_name {
        hasher.update(b"|prop:");
        hasher.update(name.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn hash_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(b) => hasher.update(if *b { b"t" } else { b"f" }),
        Value::Number(n) => {
            hasher.update(b"#");
            hasher.update(n.to_string().as_bytes());
        }
        Value::String(s) => {
            hasher.update(b"s");
            hasher.update((s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                hash_value(hasher, item);
            }
            hasher.update(b"]");
        }
        Value::Object(map) => {
            hasher.update(b"{");
            for (key, item) in map {
                hasher.update((key.len() as u64).to_le_bytes());
                hasher.update(key.as_bytes());
                hash_value(hasher, item);
            }
            hasher.update(b"}");
        }
    }
}
