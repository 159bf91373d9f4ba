//! Randomizer selector (component C4) — chooses two distinct randomizer
//! blocks per data block, preferring cache reuse over fresh generation and
//! applying diversity and availability controls when configured (spec
//! §4.4).

pub mod availability;
pub mod diversity;

use std::sync::Arc;

use rand::RngCore;
use thiserror::Error;

use crate::block::{self, Block, BlockError, Cid};
use crate::cache::{BlockInfo, Cache, Origin};
use crate::context::CancellationToken;
use crate::storage::{StorageBackend, StorageError};

use availability::AvailabilityController;
use diversity::DiversityState;

#[derive(Error, Debug)]
pub enum RandomizerError {
    #[error("block size must be positive, got {0}")]
    InvalidBlockSize(i64),
    #[error(transparent)]
    Generation(#[from] BlockError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("operation cancelled")]
    Cancelled,
}

impl From<crate::error::Cancelled> for RandomizerError {
    fn from(_: crate::error::Cancelled) -> Self {
        RandomizerError::Cancelled
    }
}

/// The result of `select_randomizers`: two distinct randomizer blocks plus
/// however many bytes were newly written to the backend producing them.
#[derive(Debug, Clone)]
pub struct Selection {
    pub r1: Block,
    pub cid1: Cid,
    pub r2: Block,
    pub cid2: Cid,
    pub new_bytes_stored: u64,
}

const SAMPLE_SIZE: usize = 20;

pub struct RandomizerSelector {
    cache: Arc<dyn Cache>,
    storage: Arc<dyn StorageBackend>,
    diversity: Option<DiversityState>,
    availability: Option<AvailabilityController>,
}

impl RandomizerSelector {
    pub fn new(cache: Arc<dyn Cache>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { cache, storage, diversity: None, availability: None }
    }

    pub fn with_diversity(mut self, diversity: DiversityState) -> Self {
        self.diversity = Some(diversity);
        self
    }

    pub fn with_availability(mut self, availability: AvailabilityController) -> Self {
        self.availability = Some(availability);
        self
    }

    pub fn diversity(&self) -> Option<&DiversityState> {
        self.diversity.as_ref()
    }

    pub fn availability(&self) -> Option<&AvailabilityController> {
        self.availability.as_ref()
    }

    /// The public contract (spec §4.4): returns two distinct randomizer
    /// blocks of exactly `block_size` bytes, preferring cache hits, and
    /// reports how many fresh bytes (if any) were written to the backend.
    pub fn select_randomizers(&self, ctx: &CancellationToken, block_size: usize) -> Result<Selection, RandomizerError> {
        if block_size == 0 {
            return Err(RandomizerError::InvalidBlockSize(0));
        }
        ctx.check()?;

        let candidates: Vec<BlockInfo> =
            self.cache.get_randomizers(SAMPLE_SIZE).into_iter().filter(|c| c.size == block_size).collect();

        match candidates.len() {
            n if n >= 2 => self.select_from_pool(ctx, candidates),
            1 => self.select_with_one_candidate(ctx, candidates.into_iter().next().unwrap(), block_size),
            _ => self.generate_fresh_pair(ctx, block_size),
        }
    }

    /// Step 2: two or more eligible candidates — run diversity-and-availability
    /// selection and record the outcome.
    fn select_from_pool(&self, ctx: &CancellationToken, candidates: Vec<BlockInfo>) -> Result<Selection, RandomizerError> {
        let (first, second) = self.choose_two(ctx, candidates)?;

        if let Some(diversity) = &self.diversity {
            diversity.record_selection(&first.cid);
            diversity.record_selection(&second.cid);
        }
        self.cache.increment_popularity(&first.cid);
        self.cache.increment_popularity(&second.cid);

        Ok(Selection { r1: first.block, cid1: first.cid, r2: second.block, cid2: second.cid, new_bytes_stored: 0 })
    }

    /// Step 3: exactly one eligible candidate — pair it with a fresh block.
    fn select_with_one_candidate(
        &self,
        ctx: &CancellationToken,
        candidate: BlockInfo,
        block_size: usize,
    ) -> Result<Selection, RandomizerError> {
        let fresh = Block::new_random(block_size)?;
        ctx.check()?;
        let outcome = self.storage.put(ctx, &fresh)?;

        self.cache.store_with_origin(fresh.clone(), Origin::Altruistic);
        self.cache.increment_popularity(&candidate.cid);

        Ok(Selection { r1: candidate.block, cid1: candidate.cid, r2: fresh.clone(), cid2: fresh.id(), new_bytes_stored: outcome.new_bytes })
    }

    /// Step 4: zero eligible candidates — generate and persist both blocks.
    fn generate_fresh_pair(&self, ctx: &CancellationToken, block_size: usize) -> Result<Selection, RandomizerError> {
        let pair = block::new_distinct_random_blocks(2, block_size)?;
        let r1 = pair[0].clone();
        let r2 = pair[1].clone();

        ctx.check()?;
        let outcome1 = self.storage.put(ctx, &r1)?;
        ctx.check()?;
        let outcome2 = self.storage.put(ctx, &r2)?;

        self.cache.store_with_origin(r1.clone(), Origin::Altruistic);
        self.cache.store_with_origin(r2.clone(), Origin::Altruistic);

        Ok(Selection { cid1: r1.id(), r1, cid2: r2.id(), r2, new_bytes_stored: outcome1.new_bytes + outcome2.new_bytes })
    }

    /// Diversity-and-availability selection (spec §4.4 step 2 detail,
    /// sub-steps a–e). Availability/diversity subsystem failures degrade to
    /// the next simpler strategy rather than surfacing (spec §4.4 failure
    /// policy).
    fn choose_two(&self, ctx: &CancellationToken, candidates: Vec<BlockInfo>) -> Result<(BlockInfo, BlockInfo), RandomizerError> {
        let pool = match &self.availability {
            None => candidates,
            Some(availability) => {
                let cids: Vec<Cid> = candidates.iter().map(|c| c.cid).collect();
                match availability.check_availability(ctx, self.storage.as_ref(), &cids) {
                    Ok(statuses) => {
                        let filtered: Vec<BlockInfo> =
                            candidates.iter().filter(|c| statuses.get(&c.cid).copied().unwrap_or(false)).cloned().collect();
                        if filtered.len() >= 2 {
                            filtered
                        } else {
                            candidates
                        }
                    }
                    // Availability subsystem failure degrades silently.
                    Err(_) => candidates,
                }
            }
        };

        match &self.diversity {
            None => Ok(uniform_pick_two(pool)),
            Some(diversity) => Ok(weighted_pick_two(pool, diversity)),
        }
    }
}

fn uniform_pick_two(mut pool: Vec<BlockInfo>) -> (BlockInfo, BlockInfo) {
    use rand::seq::SliceRandom;
    pool.shuffle(&mut rand::rngs::OsRng);
    let second = pool.pop().unwrap();
    let first = pool.pop().unwrap();
    (first, second)
}

fn weighted_pick_two(mut pool: Vec<BlockInfo>, diversity: &DiversityState) -> (BlockInfo, BlockInfo) {
    let weights: Vec<f64> = pool.iter().map(|c| diversity.score(&c.cid, c.popularity as f64 + 1.0)).collect();
    let total: f64 = weights.iter().sum();

    if total <= 0.0 {
        return uniform_pick_two(pool);
    }

    let first_idx = weighted_draw(&weights);
    let first = pool.remove(first_idx);

    let remaining_weights: Vec<f64> = pool.iter().map(|c| diversity.score(&c.cid, c.popularity as f64 + 1.0)).collect();
    let remaining_total: f64 = remaining_weights.iter().sum();
    let second = if remaining_total <= 0.0 {
        pool.remove(0)
    } else {
        pool.remove(weighted_draw(&remaining_weights))
    };

    (first, second)
}

/// Draw a cryptographically secure 64-bit integer, map into `[0, total)`,
/// and walk the cumulative distribution; ties to the last candidate on
/// floating-point overshoot (spec §4.4).
fn weighted_draw(weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    let raw = rand::rngs::OsRng.next_u64();
    let target = (raw as f64 / u64::MAX as f64) * total;

    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if target < cumulative {
            return i;
        }
    }
    weights.len() - 1
}
