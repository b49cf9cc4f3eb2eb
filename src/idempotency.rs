// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Idempotency cache for wallet-creation replays.
//!
//! A retrying caller that presents the same idempotency key within the
//! TTL gets the original creation result back, byte for byte, without
//! touching the providers or the store. LRU-bounded so a flood of keys
//! cannot grow memory without bound.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::models::WalletCreationResult;

/// Default number of cached creation results.
pub const DEFAULT_IDEMPOTENCY_CAPACITY: usize = 1024;

/// Default retention window for a cached result.
pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct CacheEntry {
    result: WalletCreationResult,
    inserted_at: Instant,
}

/// Bounded, TTL-evicting cache keyed by caller idempotency key.
pub struct IdempotencyCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fetch a cached result, evicting it if the TTL has lapsed.
    pub fn get(&self, key: &str) -> Option<WalletCreationResult> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.result.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    /// Cache a successful creation result. Only called after commit;
    /// failed attempts are never cached.
    pub fn put(&self, key: &str, result: WalletCreationResult) {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.put(
            key.to_string(),
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new(DEFAULT_IDEMPOTENCY_CAPACITY, DEFAULT_IDEMPOTENCY_TTL)
    }
}
