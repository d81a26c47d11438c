//! Cached response representation used by [`crate::services::cache`].

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// SHA-256 fingerprint of upstream + method + path + sorted query + vary headers.
    pub key: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: bytes::Bytes,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn size_bytes(&self) -> usize {
        self.body.len()
    }
}
