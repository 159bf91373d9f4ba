//! Standard cache tier — bounded-entry LRU with a popularity counter
//! tracked separately from recency, matching the cache-algorithm split
//! this repository's `cache-rs` reference draws between "recency" and
//! "frequency" signals (its `LruCache` vs. `LfuCache`): this tier uses
//! recency for eviction and keeps frequency only as sampling metadata.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

use crate::block::{Block, Cid};

use super::{BlockInfo, Cache, Origin};

#[derive(Debug, Clone)]
pub struct StandardCacheConfig {
    pub max_entries: usize,
}

impl Default for StandardCacheConfig {
    fn default() -> Self {
        Self { max_entries: 10_000 }
    }
}

struct Entry {
    block: Block,
    popularity: u64,
    last_access: Instant,
}

struct Inner {
    entries: HashMap<Cid, Entry>,
    // Front = least recently used, back = most recently used.
    order: VecDeque<Cid>,
}

pub struct StandardCache {
    config: StandardCacheConfig,
    inner: Mutex<Inner>,
}

impl StandardCache {
    pub fn new(config: StandardCacheConfig) -> Self {
        Self { config, inner: Mutex::new(Inner { entries: HashMap::new(), order: VecDeque::new() }) }
    }

    fn touch(inner: &mut Inner, cid: &Cid) {
        if let Some(pos) = inner.order.iter().position(|c| c == cid) {
            inner.order.remove(pos);
        }
        inner.order.push_back(*cid);
    }

    fn evict_if_needed(&self, inner: &mut Inner) {
        while inner.entries.len() > self.config.max_entries {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

impl Cache for StandardCache {
    fn get(&self, cid: &Cid) -> Option<Block> {
        let mut inner = self.inner.lock().unwrap();
        let found = inner.entries.get(cid).map(|e| e.block.clone());
        if found.is_some() {
            if let Some(e) = inner.entries.get_mut(cid) {
                e.last_access = Instant::now();
            }
            Self::touch(&mut inner, cid);
        }
        found
    }

    fn has(&self, cid: &Cid) -> bool {
        self.inner.lock().unwrap().entries.contains_key(cid)
    }

    fn store(&self, block: Block) {
        let cid = block.id();
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(cid, Entry { block, popularity: 0, last_access: Instant::now() });
        Self::touch(&mut inner, &cid);
        self.evict_if_needed(&mut inner);
    }

    fn increment_popularity(&self, cid: &Cid) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner.entries.get_mut(cid) {
            e.popularity = e.popularity.saturating_add(1);
        }
    }

    fn get_randomizers(&self, n: usize) -> Vec<BlockInfo> {
        let inner = self.inner.lock().unwrap();
        // Bias toward recency (back of `order`) without excluding cold
        // entries: walk from most- to least-recently-used.
        inner
            .order
            .iter()
            .rev()
            .take(n)
            .filter_map(|cid| {
                inner.entries.get(cid).map(|e| BlockInfo {
                    cid: *cid,
                    block: e.block.clone(),
                    size: e.block.len(),
                    popularity: e.popularity,
                    last_access: e.last_access,
                    origin: Origin::Personal,
                })
            })
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
    fn stores_and_fetches() {
        let cache = StandardCache::new(StandardCacheConfig::default());
        let block = sample_block(1, 8);
        let cid = block.id();
        cache.store(block.clone());
        assert!(cache.has(&cid));
        assert_eq!(cache.get(&cid).unwrap().as_bytes(), block.as_bytes());
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = StandardCache::new(StandardCacheConfig { max_entries: 2 });
        let a = sample_block(1, 4);
        let b = sample_block(2, 4);
        let c = sample_block(3, 4);

        cache.store(a.clone());
        cache.store(b.clone());
        cache.get(&a.id()); // a is now most-recently used; b becomes LRU
        cache.store(c.clone());

        assert!(!cache.has(&b.id()));
        assert!(cache.has(&a.id()));
        assert!(cache.has(&c.id()));
    }

    #[test]
    fn popularity_increments_independently_of_recency() {
        let cache = StandardCache::new(StandardCacheConfig::default());
        let block = sample_block(7, 4);
        cache.store(block.clone());
        cache.increment_popularity(&block.id());
        cache.increment_popularity(&block.id());

        let sampled = cache.get_randomizers(10);
        let entry = sampled.iter().find(|e| e.cid == block.id()).unwrap();
        assert_eq!(entry.popularity, 2);
    }

    #[test]
    fn zero_popularity_entries_are_still_sampled() {
        let cache = StandardCache::new(StandardCacheConfig::default());
        cache.store(sample_block(1, 4));
        let sampled = cache.get_randomizers(10);
        assert_eq!(sampled.len(), 1);
        assert_eq!(sampled[0].popularity, 0);
    }
}
