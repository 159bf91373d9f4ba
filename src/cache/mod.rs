//! Cache tiers (component C3).
//!
//! `Cache` is a capability set — `{get, store, has, increment_popularity,
//! get_randomizers}` — modeled as a trait, the way the teacher's `Codec`
//! trait (`codec/mod.rs`) abstracts over compression algorithms behind one
//! small interface. The altruistic cache extends it with
//! `store_with_origin` rather than widening the base trait, matching spec
//! §9's "tagged variants express the origin enum" design note.
//!
//! Three concrete tiers share this interface: [`standard::StandardCache`]
//! (plain LRU), [`adaptive::AdaptiveCache`] (hot/warm/cold, pluggable
//! eviction, preload), and [`altruistic::AltruisticCache`] (personal vs.
//! community quota). All three must be safe for concurrent access (spec
//! §5) — each owns its locking internally; callers never see a lock guard.

use std::time::Instant;

use crate::block::{Block, Cid};

pub mod adaptive;
pub mod altruistic;
pub mod standard;

/// Whether a cached block was stored on behalf of the user's own files or
/// retained purely to help the shared randomizer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Personal,
    Altruistic,
}

/// A cache entry, returned by value from sampling so callers never hold a
/// cache's internal lock (spec §5: "`get_randomizers` returns a *copy*").
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub cid: Cid,
    pub block: Block,
    pub size: usize,
    pub popularity: u64,
    pub last_access: Instant,
    pub origin: Origin,
}

impl BlockInfo {
    fn new(block: Block, origin: Origin) -> Self {
        let size = block.len();
        let cid = block.id();
        Self { cid, block, size, popularity: 0, last_access: Instant::now(), origin }
    }
}

/// The common cache capability set (spec §4.3).
///
/// Popularity is a weak signal only: ties are broken by recency and a
/// zero-popularity entry is still eligible for sampling (spec §4.3).
pub trait Cache: Send + Sync {
    fn get(&self, cid: &Cid) -> Option<Block>;
    fn has(&self, cid: &Cid) -> bool;
    fn store(&self, block: Block);
    fn increment_popularity(&self, cid: &Cid);

    /// Store tagging provenance. Tiers without origin semantics (standard,
    /// adaptive) fall back to a plain [`Cache::store`]; [`altruistic::AltruisticCache`]
    /// overrides this to route by quota partition (spec §9: "tagged
    /// variants express the origin enum" without widening the base trait).
    fn store_with_origin(&self, block: Block, _origin: Origin) {
        self.store(block);
    }

    /// Sample up to `n` entries eligible as randomizers. Any block
    /// qualifies by default (spec §4.3); tiered caches may bias toward
    /// high-popularity entries but must not exclude cold ones outright.
    fn get_randomizers(&self, n: usize) -> Vec<BlockInfo>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn sample_block(byte: u8, size: usize) -> Block {
        Block::new(vec![byte; size], size).unwrap()
    }
}
