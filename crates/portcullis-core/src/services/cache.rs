//! Response cache with single-flight coalescing and byte-capped LRU eviction.
//!
//! Built from scratch for this gateway using `dashmap` for concurrent keyed
//! state and `globset` for pattern-based invalidation.
//! The single-flight coordination is a leader/follower pattern over a
//! `DashMap<String, Arc<Notify>>`: the map entry is only locked long enough to
//! register or find the waiter, never across the upstream call itself.

use crate::models::cache_entry::CacheEntry;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use globset::GlobBuilder;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One cached entry plus the unhashed `upstream/path` it was stored under,
/// kept only so invalidation can glob-match against something readable.
struct Stored {
    entry: CacheEntry,
    subject: String,
}

pub struct Cache {
    store: DashMap<String, Stored>,
    pending: DashMap<String, Arc<Notify>>,
    access_order: Mutex<VecDeque<String>>,
    total_bytes: AtomicUsize,
    max_bytes: usize,
}

pub enum CacheLookup {
    Hit(CacheEntry),
    Miss(FetchGuard),
}

/// Held by the single caller responsible for fetching and populating an
/// entry. Dropping it without calling [`FetchGuard::complete`] (e.g. on
/// error) releases the slot and wakes any followers, who then retry the
/// lookup and become the new leader.
pub struct FetchGuard {
    key: String,
    notify: Arc<Notify>,
    completed: bool,
}

impl Cache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            store: DashMap::new(),
            pending: DashMap::new(),
            access_order: Mutex::new(VecDeque::new()),
            total_bytes: AtomicUsize::new(0),
            max_bytes,
        }
    }

    /// GET/HEAD only; a bearer/basic `Authorization` header on the request
    /// disables caching entirely, per cacheability rules.
    pub fn is_cacheable_request(method: &str, has_authorization_header: bool) -> bool {
        matches!(method.to_ascii_uppercase().as_str(), "GET" | "HEAD") && !has_authorization_header
    }

    /// 2xx only, and `Cache-Control: no-store` disables storage for that response.
    pub fn is_cacheable_response(status: u16, cache_control: Option<&str>) -> bool {
        let no_store = cache_control.map(|v| v.to_ascii_lowercase().contains("no-store")).unwrap_or(false);
        (200..300).contains(&status) && !no_store
    }

    /// `min(upstream max-age, default_secs)`, falling back to `default_secs`
    /// when the upstream sent no `Cache-Control: max-age`.
    pub fn resolve_ttl_secs(cache_control: Option<&str>, default_secs: u64) -> u64 {
        let max_age = cache_control.and_then(parse_max_age);
        match max_age {
            Some(upstream_secs) => upstream_secs.min(default_secs),
            None => default_secs,
        }
    }

    pub fn compute_key(upstream: &str, method: &str, path: &str, query: &str, vary_values: &[String]) -> (String, String) {
        let mut sorted_query: Vec<&str> = query.split('&').filter(|s| !s.is_empty()).collect();
        sorted_query.sort_unstable();
        let mut sorted_vary = vary_values.to_vec();
        sorted_vary.sort_unstable();

        let subject = format!("{}{}", upstream, path);
        let fingerprint_source =
            format!("{}|{}|{}|{}|{}", upstream, method.to_ascii_uppercase(), path, sorted_query.join("&"), sorted_vary.join(","));

        let mut hasher = Sha256::new();
        hasher.update(fingerprint_source.as_bytes());
        let key = hex_encode(&hasher.finalize());
        (key, subject)
    }

    /// Looks up `key`. A hit returns the cached entry. A miss either returns
    /// a [`FetchGuard`] (caller becomes the fetch leader) or, if another
    /// caller is already fetching, awaits that fetch and re-checks the store.
    pub async fn get_or_lock(&self, key: &str) -> CacheLookup {
        loop {
            if let Some(stored) = self.store.get(key) {
                if !stored.entry.is_expired(Utc::now()) {
                    self.touch(key);
                    return CacheLookup::Hit(stored.entry.clone());
                }
                drop(stored);
                self.remove(key);
            }

            let notify = Arc::new(Notify::new());
            let waiter = match self.pending.entry(key.to_string()) {
                Entry::Occupied(existing) => Some(existing.get().clone()),
                Entry::Vacant(vacant) => {
                    vacant.insert(notify);
                    None
                }
            };

            match waiter {
                Some(existing_notify) => {
                    existing_notify.notified().await;
                    continue;
                }
                None => {
                    return CacheLookup::Miss(FetchGuard {
                        key: key.to_string(),
                        notify: self.pending.get(key).expect("just inserted").clone(),
                        completed: false,
                    });
                }
            }
        }
    }

    /// Called by the fetch leader with the freshly-fetched entry. Stores it,
    /// evicts if the byte cap is now exceeded, and releases followers.
    pub fn complete(&self, mut guard: FetchGuard, entry: CacheEntry, subject: String) {
        self.insert(entry, subject);
        guard.completed = true;
        self.pending.remove(&guard.key);
        guard.notify.notify_waiters();
    }

    fn insert(&self, entry: CacheEntry, subject: String) {
        let size = entry.size_bytes();
        let key = entry.key.clone();
        self.store.insert(key.clone(), Stored { entry, subject });
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
        self.touch(&key);
        self.evict_if_needed();
    }

    fn remove(&self, key: &str) {
        if let Some((_, stored)) = self.store.remove(key) {
            self.total_bytes.fetch_sub(stored.entry.size_bytes(), Ordering::Relaxed);
        }
        self.access_order.lock().unwrap().retain(|k| k != key);
    }

    fn touch(&self, key: &str) {
        let mut order = self.access_order.lock().unwrap();
        order.retain(|k| k != key);
        order.push_back(key.to_string());
    }

    fn evict_if_needed(&self) {
        while self.total_bytes.load(Ordering::Relaxed) > self.max_bytes {
            let oldest = { self.access_order.lock().unwrap().pop_front() };
            match oldest {
                Some(key) => self.remove(&key),
                None => break,
            }
        }
    }

    /// Purges every stored entry whose `upstream/path` subject matches the
    /// glob `pattern` (e.g. `orders/*`). Returns the number of entries removed.
    pub fn invalidate(&self, pattern: &str) -> Result<usize, globset::Error> {
        let glob = GlobBuilder::new(pattern).literal_separator(false).build()?.compile_matcher();
        let matching_keys: Vec<String> = self
            .store
            .iter()
            .filter(|entry| glob.is_match(&entry.value().subject))
            .map(|entry| entry.key().clone())
            .collect();

        let count = matching_keys.len();
        for key in matching_keys {
            self.remove(&key);
        }
        Ok(count)
    }
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|directive| {
        let directive = directive.trim();
        let value = directive.strip_prefix("max-age=")?;
        value.parse::<u64>().ok()
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn entry(key: &str, body: &str, ttl_secs: i64) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            key: key.to_string(),
            status: 200,
            headers: vec![],
            body: Bytes::from(body.to_string()),
            stored_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        }
    }

    #[test]
    fn get_request_without_auth_is_cacheable() {
        assert!(Cache::is_cacheable_request("GET", false));
        assert!(!Cache::is_cacheable_request("GET", true));
        assert!(!Cache::is_cacheable_request("POST", false));
    }

    #[test]
    fn no_store_disables_response_caching() {
        assert!(Cache::is_cacheable_response(200, None));
        assert!(!Cache::is_cacheable_response(200, Some("no-store")));
        assert!(!Cache::is_cacheable_response(404, None));
    }

    #[test]
    fn ttl_is_min_of_upstream_and_default() {
        assert_eq!(Cache::resolve_ttl_secs(Some("max-age=10"), 300), 10);
        assert_eq!(Cache::resolve_ttl_secs(Some("max-age=600"), 300), 300);
        assert_eq!(Cache::resolve_ttl_secs(None, 300), 300);
    }

    #[test]
    fn key_is_stable_for_same_inputs_regardless_of_query_order() {
        let (key_a, _) = Cache::compute_key("orders", "GET", "/api/orders", "b=2&a=1", &[]);
        let (key_b, _) = Cache::compute_key("orders", "GET", "/api/orders", "a=1&b=2", &[]);
        assert_eq!(key_a, key_b);
    }

    #[tokio::test]
    async fn single_flight_follower_sees_leader_result() {
        let cache = Cache::new(1024 * 1024);
        let (key, subject) = Cache::compute_key("orders", "GET", "/api/orders", "", &[]);

        let lookup = cache.get_or_lock(&key).await;
        let guard = match lookup {
            CacheLookup::Miss(g) => g,
            CacheLookup::Hit(_) => panic!("expected a miss on first lookup"),
        };

        cache.complete(guard, entry(&key, "payload", 60), subject);

        match cache.get_or_lock(&key).await {
            CacheLookup::Hit(e) => assert_eq!(e.body, Bytes::from("payload")),
            CacheLookup::Miss(_) => panic!("expected a hit after completion"),
        }
    }

    #[test]
    fn invalidate_purges_matching_subjects() {
        let cache = Cache::new(1024 * 1024);
        cache.insert(entry("k1", "a", 60), "orders/api/orders/1".to_string());
        cache.insert(entry("k2", "b", 60), "orders/api/orders/2".to_string());
        cache.insert(entry("k3", "c", 60), "users/api/users/1".to_string());

        let removed = cache.invalidate("orders/*").unwrap();
        assert_eq!(removed, 2);
        assert!(cache.store.contains_key("k3"));
    }

    #[test]
    fn eviction_drops_oldest_entries_past_the_byte_cap() {
        let cache = Cache::new(10);
        cache.insert(entry("k1", "12345", 60), "s/1".to_string());
        cache.insert(entry("k2", "12345", 60), "s/2".to_string());
        cache.insert(entry("k3", "12345", 60), "s/3".to_string());

        assert!(!cache.store.contains_key("k1"));
        assert!(cache.store.contains_key("k3"));
    }
}
