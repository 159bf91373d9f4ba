//! Availability controls (component C10, availability half) — probes
//! whether candidate randomizer CIDs are actually retrievable from the
//! storage facade, caching results for a bounded TTL (spec §4.10).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::block::Cid;
use crate::context::CancellationToken;
use crate::storage::{BlockAddress, StorageBackend, StorageError};

#[derive(Debug, Clone, Copy)]
pub struct AvailabilityStatus {
    pub available: bool,
    pub last_checked: Instant,
}

#[derive(Debug, Clone)]
pub struct AvailabilityConfig {
    pub ttl: Duration,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(60) }
    }
}

/// Reader-heavy on lookup, writer-heavy on probe (spec §5): guarded by a
/// reader-writer lock rather than a plain mutex.
pub struct AvailabilityController {
    config: AvailabilityConfig,
    statuses: RwLock<HashMap<Cid, AvailabilityStatus>>,
    probed: std::sync::atomic::AtomicU64,
    available: std::sync::atomic::AtomicU64,
}

impl AvailabilityController {
    pub fn new(config: AvailabilityConfig) -> Self {
        Self {
            config,
            statuses: RwLock::new(HashMap::new()),
            probed: std::sync::atomic::AtomicU64::new(0),
            available: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Probe `cids` against `backend`, reusing any cached status still
    /// within the TTL. Returns `cid -> available` for every input CID.
    pub fn check_availability(
        &self,
        ctx: &CancellationToken,
        backend: &dyn StorageBackend,
        cids: &[Cid],
    ) -> Result<HashMap<Cid, bool>, StorageError> {
        use std::sync::atomic::Ordering;

        let mut result = HashMap::with_capacity(cids.len());
        let mut to_probe = Vec::new();

        {
            let statuses = self.statuses.read().unwrap();
            for cid in cids {
                match statuses.get(cid) {
                    Some(status) if status.last_checked.elapsed() < self.config.ttl => {
                        result.insert(*cid, status.available);
                    }
                    _ => to_probe.push(*cid),
                }
            }
        }

        for cid in to_probe {
            ctx.check()?;
            let available = backend.has(ctx, &BlockAddress::new(cid))?;
            self.probed.fetch_add(1, Ordering::Relaxed);
            if available {
                self.available.fetch_add(1, Ordering::Relaxed);
            }
            self.statuses.write().unwrap().insert(cid, AvailabilityStatus { available, last_checked: Instant::now() });
            result.insert(cid, available);
        }

        Ok(result)
    }

    /// `available_count / probed_count` over the life of this controller
    /// (spec §4.10: "over a recent window" — approximated here as the
    /// controller's full lifetime since no separate rolling window is
    /// specified numerically).
    pub fn availability_score(&self) -> f64 {
        use std::sync::atomic::Ordering;
        let probed = self.probed.load(Ordering::Relaxed);
        if probed == 0 {
            return 1.0;
        }
        self.available.load(Ordering::Relaxed) as f64 / probed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::storage::memory::MemoryBackend;

    #[test]
    fn unknown_cids_are_probed_and_cached() {
        let backend = MemoryBackend::new();
        let ctx = CancellationToken::none();
        let block = Block::new(vec![1u8; 4], 4).unwrap();
        backend.put(&ctx, &block).unwrap();

        let controller = AvailabilityController::new(AvailabilityConfig::default());
        let missing = Cid([0xFF; 32]);
        let result = controller.check_availability(&ctx, &backend, &[block.id(), missing]).unwrap();

        assert_eq!(result.get(&block.id()), Some(&true));
        assert_eq!(result.get(&missing), Some(&false));
        assert_eq!(controller.availability_score(), 0.5);
    }

    #[test]
    fn cached_status_within_ttl_skips_reprobe() {
        let backend = MemoryBackend::new();
        let ctx = CancellationToken::none();
        let block = Block::new(vec![2u8; 4], 4).unwrap();
        backend.put(&ctx, &block).unwrap();

        let controller = AvailabilityController::new(AvailabilityConfig { ttl: Duration::from_secs(60) });
        controller.check_availability(&ctx, &backend, &[block.id()]).unwrap();
        backend.delete(&ctx, &BlockAddress::new(block.id())).unwrap();

        // Still within TTL: reports the stale cached answer, doesn't re-probe.
        let result = controller.check_availability(&ctx, &backend, &[block.id()]).unwrap();
        assert_eq!(result.get(&block.id()), Some(&true));
    }
}
