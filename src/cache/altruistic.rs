//! Altruistic cache tier — partitions storage into a personal quota and a
//! community ("altruistic") quota, evicting altruistic entries first under
//! pressure (spec §4.3).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use crate::block::{Block, Cid};

use super::{BlockInfo, Cache, Origin};

#[derive(Debug, Clone)]
pub struct AltruisticCacheConfig {
    pub personal_quota_bytes: u64,
    pub altruistic_quota_bytes: u64,
}

impl Default for AltruisticCacheConfig {
    fn default() -> Self {
        Self { personal_quota_bytes: 128 * 1024 * 1024, altruistic_quota_bytes: 128 * 1024 * 1024 }
    }
}

struct Entry {
    block: Block,
    popularity: u64,
    last_access: Instant,
    origin: Origin,
}

struct Inner {
    entries: HashMap<Cid, Entry>,
    personal_bytes: u64,
    altruistic_bytes: u64,
}

pub struct AltruisticCache {
    config: AltruisticCacheConfig,
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuotaUtilization {
    pub personal_bytes: u64,
    pub personal_count: usize,
    pub altruistic_bytes: u64,
    pub altruistic_count: usize,
}

impl AltruisticCache {
    pub fn new(config: AltruisticCacheConfig) -> Self {
        Self { config, inner: Mutex::new(Inner { entries: HashMap::new(), personal_bytes: 0, altruistic_bytes: 0 }) }
    }

    pub fn quota_utilization(&self) -> QuotaUtilization {
        let inner = self.inner.lock().unwrap();
        let (personal_count, altruistic_count) = inner
            .entries
            .values()
            .fold((0usize, 0usize), |(p, a), e| match e.origin {
                Origin::Personal => (p + 1, a),
                Origin::Altruistic => (p, a + 1),
            });
        QuotaUtilization {
            personal_bytes: inner.personal_bytes,
            personal_count,
            altruistic_bytes: inner.altruistic_bytes,
            altruistic_count,
        }
    }

    fn credit(inner: &mut Inner, origin: Origin, size: u64) {
        match origin {
            Origin::Personal => inner.personal_bytes += size,
            Origin::Altruistic => inner.altruistic_bytes += size,
        }
    }

    fn debit(inner: &mut Inner, origin: Origin, size: u64) {
        match origin {
            Origin::Personal => inner.personal_bytes = inner.personal_bytes.saturating_sub(size),
            Origin::Altruistic => inner.altruistic_bytes = inner.altruistic_bytes.saturating_sub(size),
        }
    }

    /// Evict altruistic entries (oldest-first) before touching any personal
    /// entry, per spec §4.3.
    fn evict_under_pressure(&self, inner: &mut Inner) {
        while inner.altruistic_bytes > self.config.altruistic_quota_bytes {
            let victim = inner
                .entries
                .values()
                .filter(|e| e.origin == Origin::Altruistic)
                .min_by_key(|e| e.last_access)
                .map(|e| e.block.id());
            match victim {
                Some(cid) => {
                    if let Some(removed) = inner.entries.remove(&cid) {
                        Self::debit(inner, Origin::Altruistic, removed.block.len() as u64);
                        tracing::debug!(%cid, "evicted altruistic block under quota pressure");
                    }
                }
                None => break,
            }
        }

        while inner.personal_bytes > self.config.personal_quota_bytes {
            let victim = inner
                .entries
                .values()
                .filter(|e| e.origin == Origin::Personal)
                .min_by_key(|e| e.last_access)
                .map(|e| e.block.id());
            match victim {
                Some(cid) => {
                    if let Some(removed) = inner.entries.remove(&cid) {
                        Self::debit(inner, Origin::Personal, removed.block.len() as u64);
                        tracing::debug!(%cid, "evicted personal block under quota pressure");
                    }
                }
                None => break,
            }
        }
    }
}

impl Cache for AltruisticCache {
    fn get(&self, cid: &Cid) -> Option<Block> {
        let mut inner = self.inner.lock().unwrap();
        let block = inner.entries.get(cid).map(|e| e.block.clone());
        if let Some(e) = inner.entries.get_mut(cid) {
            e.last_access = Instant::now();
        }
        block
    }

    fn has(&self, cid: &Cid) -> bool {
        self.inner.lock().unwrap().entries.contains_key(cid)
    }

    /// Blocks stored through the base `Cache` trait default to personal
    /// origin; use [`AltruisticCache::store_with_origin`] to tag them
    /// explicitly.
    fn store(&self, block: Block) {
        self.store_with_origin(block, Origin::Personal);
    }

    fn increment_popularity(&self, cid: &Cid) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner.entries.get_mut(cid) {
            e.popularity = e.popularity.saturating_add(1);
        }
    }

    fn store_with_origin(&self, block: Block, origin: Origin) {
        let cid = block.id();
        let size = block.len() as u64;
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner.entries.remove(&cid) {
            Self::debit(&mut inner, existing.origin, existing.block.len() as u64);
        }

        Self::credit(&mut inner, origin, size);
        inner.entries.insert(cid, Entry { block, popularity: 0, last_access: Instant::now(), origin });

        self.evict_under_pressure(&mut inner);
    }

    fn get_randomizers(&self, n: usize) -> Vec<BlockInfo> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .values()
            .take(n)
            .map(|e| BlockInfo { cid: e.block.id(), block: e.block.clone(), size: e.block.len(), popularity: e.popularity, last_access: e.last_access, origin: e.origin })
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::sample_block;

    #[test]
    fn routes_to_matching_partition() {
        let cache = AltruisticCache::new(AltruisticCacheConfig::default());
        cache.store_with_origin(sample_block(1, 16), Origin::Personal);
        cache.store_with_origin(sample_block(2, 16), Origin::Altruistic);

        let util = cache.quota_utilization();
        assert_eq!(util.personal_bytes, 16);
        assert_eq!(util.altruistic_bytes, 16);
    }

    #[test]
    fn altruistic_entries_evicted_before_personal() {
        let config = AltruisticCacheConfig { personal_quota_bytes: 1024, altruistic_quota_bytes: 16 };
        let cache = AltruisticCache::new(config);

        let personal = sample_block(1, 16);
        let altruistic = sample_block(2, 16);
        cache.store_with_origin(personal.clone(), Origin::Personal);
        cache.store_with_origin(altruistic.clone(), Origin::Altruistic);

        // A second altruistic block pushes the altruistic quota over budget.
        let altruistic2 = sample_block(3, 16);
        cache.store_with_origin(altruistic2.clone(), Origin::Altruistic);

        assert!(cache.has(&personal.id()));
        assert!(!cache.has(&altruistic.id()));
        assert!(cache.has(&altruistic2.id()));
    }

    #[test]
    fn default_store_uses_personal_origin() {
        let cache = AltruisticCache::new(AltruisticCacheConfig::default());
        let block = sample_block(7, 8);
        Cache::store(&cache, block.clone());
        assert_eq!(cache.quota_utilization().personal_count, 1);
        assert_eq!(cache.quota_utilization().altruistic_count, 0);
    }
}
