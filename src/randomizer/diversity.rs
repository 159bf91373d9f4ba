//! Diversity controls (component C10, diversity half) — tracks how often
//! each randomizer CID has been selected and scales selection weight down
//! as a CID becomes over-represented (spec §4.10).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::block::Cid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyCurve {
    Linear,
    Quadratic,
}

#[derive(Debug, Clone)]
pub struct DiversityConfig {
    pub max_history: usize,
    pub concentration_cap: f64,
    pub penalty_curve: PenaltyCurve,
    pub min_score: f64,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self { max_history: 100_000, concentration_cap: 0.1, penalty_curve: PenaltyCurve::Quadratic, min_score: 0.01 }
    }
}

struct Inner {
    counts: HashMap<Cid, u64>,
    total: u64,
}

/// Writer-heavy selection history (spec §5); reads of scores may be
/// slightly stale relative to concurrent writes — no cross-field
/// serialization is promised.
pub struct DiversityState {
    config: DiversityConfig,
    inner: Mutex<Inner>,
}

impl DiversityState {
    pub fn new(config: DiversityConfig) -> Self {
        Self { config, inner: Mutex::new(Inner { counts: HashMap::new(), total: 0 }) }
    }

    pub fn record_selection(&self, cid: &Cid) {
        let mut inner = self.inner.lock().unwrap();
        *inner.counts.entry(*cid).or_insert(0) += 1;
        inner.total += 1;

        if inner.counts.len() > self.config.max_history {
            // Drop the least-selected entry to bound memory, per the
            // "bounded by a max-history policy" lifecycle note.
            if let Some(victim) = inner.counts.iter().min_by_key(|(_, &c)| c).map(|(cid, _)| *cid) {
                inner.counts.remove(&victim);
            }
        }
    }

    fn usage_ratio(inner: &Inner, cid: &Cid) -> f64 {
        if inner.total == 0 {
            return 0.0;
        }
        let count = inner.counts.get(cid).copied().unwrap_or(0) as f64;
        count / inner.total as f64
    }

    /// `base` scaled down as the CID's usage ratio exceeds the concentration
    /// cap; never below `min_score`.
    pub fn score(&self, cid: &Cid, base: f64) -> f64 {
        let inner = self.inner.lock().unwrap();
        let ratio = Self::usage_ratio(&inner, cid);
        if ratio <= self.config.concentration_cap {
            return base.max(self.config.min_score);
        }

        let over = (ratio - self.config.concentration_cap) / (1.0 - self.config.concentration_cap).max(f64::EPSILON);
        let penalty = match self.config.penalty_curve {
            PenaltyCurve::Linear => over,
            PenaltyCurve::Quadratic => over * over,
        };
        (base * (1.0 - penalty).max(0.0)).max(self.config.min_score)
    }

    pub fn max_usage_ratio(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        inner.counts.values().copied().max().map(|max| max as f64 / inner.total.max(1) as f64).unwrap_or(0.0)
    }

    pub fn unique_randomizers_count(&self) -> usize {
        self.inner.lock().unwrap().counts.len()
    }

    pub fn total_selections(&self) -> u64 {
        self.inner.lock().unwrap().total
    }
}
