//! A bounded, LRU-evicted cache of per-host leaf certificates, owned by
//! the MITM proxy alongside the CA key file (spec.md §5: "the MITM proxy
//! owns ... the leaf certificate cache").

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Default capacity, chosen to comfortably cover the distinct hosts a
/// single agent session talks to without unbounded growth. `[SUPPLEMENT]`:
/// spec.md names the cache but not a size; see DESIGN.md.
pub const DEFAULT_CAPACITY: usize = 4096;

/// A leaf certificate plus its private key, both PEM-encoded.
#[derive(Debug, Clone)]
pub struct LeafCert {
    /// The certificate, PEM-encoded.
    pub cert_pem: String,
    /// The private key, PEM-encoded.
    pub key_pem: String,
}

struct Inner {
    capacity: usize,
    entries: HashMap<String, LeafCert>,
    order: VecDeque<String>,
}

/// Thread-safe bounded LRU cache keyed by SNI/host.
pub struct CertCache {
    inner: Mutex<Inner>,
}

impl CertCache {
    /// Construct a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(Inner { capacity, entries: HashMap::new(), order: VecDeque::new() }) }
    }

    /// Fetch a cached certificate for `host`, marking it most-recently-used.
    #[must_use]
    pub fn get(&self, host: &str) -> Option<LeafCert> {
        let mut inner = self.inner.lock().expect("cert cache lock poisoned");
        if !inner.entries.contains_key(host) {
            return None;
        }
        inner.order.retain(|h| h != host);
        inner.order.push_back(host.to_string());
        inner.entries.get(host).cloned()
    }

    /// Insert or replace the certificate for `host`, evicting the
    /// least-recently-used entry if the cache is at capacity.
    pub fn insert(&self, host: &str, cert: LeafCert) {
        let mut inner = self.inner.lock().expect("cert cache lock poisoned");
        if inner.entries.contains_key(host) {
            inner.order.retain(|h| h != host);
        } else if inner.entries.len() >= inner.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
            }
        }
        inner.order.push_back(host.to_string());
        inner.entries.insert(host.to_string(), cert);
    }

    /// Current number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cert cache lock poisoned").entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CertCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert(tag: &str) -> LeafCert {
        LeafCert { cert_pem: format!("cert-{tag}"), key_pem: format!("key-{tag}") }
    }

    #[test]
    fn evicts_least_recently_used_once_full() {
        let cache = CertCache::new(2);
        cache.insert("a.com", cert("a"));
        cache.insert("b.com", cert("b"));
        cache.get("a.com");
        cache.insert("c.com", cert("c"));

        assert!(cache.get("a.com").is_some());
        assert!(cache.get("b.com").is_none());
        assert!(cache.get("c.com").is_some());
    }

    #[test]
    fn reinserting_an_existing_host_refreshes_recency() {
        let cache = CertCache::new(2);
        cache.insert("a.com", cert("a"));
        cache.insert("b.com", cert("b"));
        cache.insert("a.com", cert("a2"));
        cache.insert("c.com", cert("c"));

        assert!(cache.get("a.com").is_some());
        assert!(cache.get("b.com").is_none());
    }
}
