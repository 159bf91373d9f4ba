//! Adaptive cache tier — size- and item-bounded, partitioned into hot,
//! warm, and cold access-pattern tiers, with a pluggable eviction policy
//! and a cancellable preload operation (spec §4.3).
//!
//! The tier split mirrors the multi-queue designs surveyed in this
//! repository's `cache-rs` reference (its SLRU segmented-queue promotion
//! between probationary and protected segments); here promotion moves an
//! entry hot → warm → cold as its access frequency decays rather than
//! through a fixed two-segment queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Instant;

use crate::block::{Block, Cid};
use crate::context::CancellationToken;

use super::{BlockInfo, Cache, Origin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

#[derive(Debug, Clone)]
pub struct AdaptiveCacheConfig {
    pub max_size_bytes: u64,
    pub max_items: usize,
    pub hot_tier_ratio: f64,
    pub warm_tier_ratio: f64,
    pub prediction_window: usize,
    pub eviction_batch_size: usize,
    pub exchange_interval_secs: u64,
    pub prediction_interval_secs: u64,
}

impl Default for AdaptiveCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 256 * 1024 * 1024,
            max_items: 50_000,
            hot_tier_ratio: 0.2,
            warm_tier_ratio: 0.3,
            prediction_window: 100,
            eviction_batch_size: 16,
            exchange_interval_secs: 300,
            prediction_interval_secs: 60,
        }
    }
}

/// Scores an entry for eviction priority: higher means "evict me first".
/// The default policy favors cold, unpopular, least-recently-used entries;
/// the randomizer-aware policy additionally discounts blocks C4 samples
/// often, per spec §4.3 ("penalizes eviction of blocks sampled frequently").
pub trait EvictionPolicy: Send + Sync {
    fn eviction_score(&self, entry: &CacheEntry) -> f64;
}

#[derive(Default)]
pub struct DefaultEvictionPolicy;

impl EvictionPolicy for DefaultEvictionPolicy {
    fn eviction_score(&self, entry: &CacheEntry) -> f64 {
        let age_secs = entry.last_access.elapsed().as_secs_f64();
        let tier_weight = match entry.tier {
            Tier::Cold => 3.0,
            Tier::Warm => 1.5,
            Tier::Hot => 0.5,
        };
        tier_weight * age_secs / (1.0 + entry.popularity as f64)
    }
}

/// Penalizes eviction of blocks C4 samples often, tracked via an external
/// sample-count map the selector updates as it draws candidates.
pub struct RandomizerAwareEvictionPolicy {
    sample_counts: RwLock<HashMap<Cid, u64>>,
}

impl Default for RandomizerAwareEvictionPolicy {
    fn default() -> Self {
        Self { sample_counts: RwLock::new(HashMap::new()) }
    }
}

impl RandomizerAwareEvictionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&self, cid: &Cid) {
        let mut counts = self.sample_counts.write().unwrap();
        *counts.entry(*cid).or_insert(0) += 1;
    }
}

impl EvictionPolicy for RandomizerAwareEvictionPolicy {
    fn eviction_score(&self, entry: &CacheEntry) -> f64 {
        let base = DefaultEvictionPolicy.eviction_score(entry);
        let sampled = self.sample_counts.read().unwrap().get(&entry.cid).copied().unwrap_or(0);
        base / (1.0 + sampled as f64)
    }
}

pub struct CacheEntry {
    pub cid: Cid,
    pub block: Block,
    pub size: usize,
    pub popularity: u64,
    pub last_access: Instant,
    pub access_count: u64,
    pub tier: Tier,
}

struct Inner {
    entries: HashMap<Cid, CacheEntry>,
    total_bytes: u64,
}

pub struct AdaptiveCache {
    config: AdaptiveCacheConfig,
    policy: Box<dyn EvictionPolicy>,
    inner: Mutex<Inner>,
    evictions: AtomicU64,
}

impl AdaptiveCache {
    pub fn new(config: AdaptiveCacheConfig) -> Self {
        Self::with_policy(config, Box::new(DefaultEvictionPolicy))
    }

    pub fn with_policy(config: AdaptiveCacheConfig, policy: Box<dyn EvictionPolicy>) -> Self {
        Self { config, policy, inner: Mutex::new(Inner { entries: HashMap::new(), total_bytes: 0 }), evictions: AtomicU64::new(0) }
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn retier(entry: &mut CacheEntry, hot_threshold: u64, warm_threshold: u64) {
        entry.tier = if entry.access_count >= hot_threshold {
            Tier::Hot
        } else if entry.access_count >= warm_threshold {
            Tier::Warm
        } else {
            Tier::Cold
        };
    }

    fn hot_threshold(&self) -> u64 {
        (self.config.prediction_window as f64 * self.config.hot_tier_ratio).ceil() as u64
    }

    fn warm_threshold(&self) -> u64 {
        (self.config.prediction_window as f64 * self.config.warm_tier_ratio).ceil() as u64
    }

    fn evict_until_within_bounds(&self, inner: &mut Inner) {
        while inner.entries.len() > self.config.max_items || inner.total_bytes > self.config.max_size_bytes {
            let victim = inner
                .entries
                .values()
                .max_by(|a, b| self.policy.eviction_score(a).partial_cmp(&self.policy.eviction_score(b)).unwrap())
                .map(|e| e.cid);
            match victim {
                Some(cid) => {
                    if let Some(removed) = inner.entries.remove(&cid) {
                        inner.total_bytes = inner.total_bytes.saturating_sub(removed.size as u64);
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(%cid, tier = ?removed.tier, "evicted block from adaptive cache");
                    }
                }
                None => break,
            }
        }
    }

    /// Proactively fetch predicted CIDs not already cached, storing each as
    /// a decoded block (spec §9 resolves the `preloadBlocks` ambiguity this
    /// way). Cancellable: checked before each fetch.
    pub fn preload<F>(
        &self,
        ctx: &CancellationToken,
        predicted: &[Cid],
        mut fetcher: F,
    ) -> Result<usize, crate::error::Cancelled>
    where
        F: FnMut(&Cid) -> Option<Block>,
    {
        let mut fetched = 0;
        for cid in predicted {
            ctx.check()?;
            if self.has(cid) {
                continue;
            }
            if let Some(block) = fetcher(cid) {
                self.store(block);
                fetched += 1;
            }
        }
        Ok(fetched)
    }
}

impl Cache for AdaptiveCache {
    fn get(&self, cid: &Cid) -> Option<Block> {
        let mut inner = self.inner.lock().unwrap();
        let hot_threshold = self.hot_threshold();
        let warm_threshold = self.warm_threshold();
        let block = inner.entries.get(cid).map(|e| e.block.clone());
        if block.is_some() {
            if let Some(e) = inner.entries.get_mut(cid) {
                e.last_access = Instant::now();
                e.access_count += 1;
                Self::retier(e, hot_threshold, warm_threshold);
            }
        }
        block
    }

    fn has(&self, cid: &Cid) -> bool {
        self.inner.lock().unwrap().entries.contains_key(cid)
    }

    fn store(&self, block: Block) {
        let cid = block.id();
        let size = block.len();
        let mut inner = self.inner.lock().unwrap();
        inner.total_bytes += size as u64;
        inner.entries.insert(
            cid,
            CacheEntry { cid, block, size, popularity: 0, last_access: Instant::now(), access_count: 0, tier: Tier::Cold },
        );
        self.evict_until_within_bounds(&mut inner);
    }

    fn increment_popularity(&self, cid: &Cid) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner.entries.get_mut(cid) {
            e.popularity = e.popularity.saturating_add(1);
        }
    }

    fn get_randomizers(&self, n: usize) -> Vec<BlockInfo> {
        let inner = self.inner.lock().unwrap();
        let mut candidates: Vec<&CacheEntry> = inner.entries.values().collect();
        candidates.sort_by(|a, b| b.tier_rank().cmp(&a.tier_rank()).then(b.popularity.cmp(&a.popularity)));
        candidates
            .into_iter()
            .take(n)
            .map(|e| BlockInfo { cid: e.cid, block: e.block.clone(), size: e.size, popularity: e.popularity, last_access: e.last_access, origin: Origin::Personal })
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

impl CacheEntry {
    fn tier_rank(&self) -> u8 {
        match self.tier {
            Tier::Hot => 2,
            Tier::Warm => 1,
            Tier::Cold => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::sample_block;

    #[test]
    fn stores_and_fetches() {
        let cache = AdaptiveCache::new(AdaptiveCacheConfig::default());
        let block = sample_block(1, 16);
        cache.store(block.clone());
        assert_eq!(cache.get(&block.id()).unwrap().as_bytes(), block.as_bytes());
    }

    #[test]
    fn evicts_when_item_bound_exceeded() {
        let config = AdaptiveCacheConfig { max_items: 2, ..AdaptiveCacheConfig::default() };
        let cache = AdaptiveCache::new(config);
        cache.store(sample_block(1, 4));
        cache.store(sample_block(2, 4));
        cache.store(sample_block(3, 4));
        assert!(cache.len() <= 2);
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn evicts_when_byte_bound_exceeded() {
        let config = AdaptiveCacheConfig { max_size_bytes: 20, max_items: 100, ..AdaptiveCacheConfig::default() };
        let cache = AdaptiveCache::new(config);
        cache.store(sample_block(1, 16));
        cache.store(sample_block(2, 16));
        assert!(cache.len() <= 1);
    }

    #[test]
    fn frequent_access_promotes_to_hot_tier() {
        let config = AdaptiveCacheConfig { prediction_window: 4, hot_tier_ratio: 0.5, warm_tier_ratio: 0.25, ..AdaptiveCacheConfig::default() };
        let cache = AdaptiveCache::new(config);
        let block = sample_block(9, 4);
        cache.store(block.clone());
        for _ in 0..3 {
            cache.get(&block.id());
        }
        let inner = cache.inner.lock().unwrap();
        assert_eq!(inner.entries.get(&block.id()).unwrap().tier, Tier::Hot);
    }

    #[test]
    fn preload_skips_already_cached_and_respects_cancellation() {
        let cache = AdaptiveCache::new(AdaptiveCacheConfig::default());
        let existing = sample_block(1, 4);
        cache.store(existing.clone());

        let predicted = vec![existing.id(), sample_block(2, 4).id()];
        let ctx = CancellationToken::none();
        let fetched = cache
            .preload(&ctx, &predicted, |cid| {
                if *cid == existing.id() {
                    None
                } else {
                    Some(sample_block(2, 4))
                }
            })
            .unwrap();
        assert_eq!(fetched, 1);

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(cache.preload(&cancelled, &predicted, |_| None).is_err());
    }

    #[test]
    fn randomizer_aware_policy_protects_sampled_blocks() {
        let policy = RandomizerAwareEvictionPolicy::new();
        let sampled = sample_block(1, 4);
        let unsampled = sample_block(2, 4);
        policy.record_sample(&sampled.id());

        let cache = AdaptiveCache::with_policy(
            AdaptiveCacheConfig { max_items: 1, ..AdaptiveCacheConfig::default() },
            Box::new(policy),
        );
        cache.store(sampled.clone());
        cache.store(unsampled.clone());

        assert_eq!(cache.len(), 1);
        assert!(cache.has(&sampled.id()));
        assert!(!cache.has(&unsampled.id()));
    }
}
