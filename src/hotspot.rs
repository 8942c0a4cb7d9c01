//! `CacheHotspot`: the per-instruction-key aggregate that flows through
//! C2 → C3 → C6 → C4 → C5 (spec §3).

use crate::sample::{MissSample, SourceLocation};
use serde::{Deserialize, Serialize};

/// Dominant access-pattern class assigned by the Pattern Analyzer (C3), or a
/// deterministic stand-in value for synthetic hotspots (C6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessPattern {
    Sequential,
    Strided,
    Random,
    GatherScatter,
    Indirect,
    NestedLoop,
    LoopCarriedDep,
}

impl Default for AccessPattern {
    fn default() -> Self {
        AccessPattern::Random
    }
}

/// `[min, max]` span of memory addresses touched by a hotspot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AddressRange {
    pub min: u64,
    pub max: u64,
}

impl AddressRange {
    /// Working-set span in bytes (`range_end - range_start`, glossary).
    pub fn span(&self) -> u64 {
        self.max.saturating_sub(self.min)
    }

    fn widen(&mut self, addr: u64) {
        if addr < self.min {
            self.min = addr;
        }
        if addr > self.max {
            self.max = addr;
        }
    }
}

/// Aggregated per-instruction-key statistics, bounded sample retention, and
/// the fields recomputed by C3 (`access_stride`, `dominant_pattern`,
/// `is_false_sharing`) and by downstream classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHotspot {
    pub key: u64,
    pub location: SourceLocation,
    pub total_accesses: u64,
    pub total_misses: u64,
    pub address_range: AddressRange,
    /// Miss counts per level, 1-indexed: `level_counts[1]` is L1,
    /// `level_counts[2]` is L2, `level_counts[3]` is L3/LLC (shared slot,
    /// see `MissedLevel::index`). Index 0 and index 4 are unused padding
    /// that keeps the 1-based indexing spec'd in §3 literal in code.
    pub level_counts: [u64; 5],
    pub avg_latency_cycles: f64,
    pub access_stride: i64,
    pub dominant_pattern: AccessPattern,
    pub samples: Vec<MissSample>,
    pub is_false_sharing: bool,
    /// Entropy / autocorrelation / reuse-distance summary recomputed by C3
    /// ("severity_fields" in spec §3) — informative, not read by C4's
    /// detectors directly.
    pub pattern_metrics: PatternMetrics,
    max_samples: usize,
}

/// Reuse-distance summary statistics over a bounded lookback window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReuseDistanceStats {
    pub mean: f64,
    pub min: u32,
    pub max: u32,
    pub samples_considered: usize,
}

/// Secondary pattern metrics computed by C3 beyond stride/classification:
/// bit-frequency entropy of addresses, lag-1 autocorrelation of deltas, and
/// reuse-distance statistics (spec §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternMetrics {
    pub entropy: f64,
    pub autocorrelation_lag1: f64,
    pub reuse_distance: ReuseDistanceStats,
}

impl CacheHotspot {
    /// Creates a hotspot from its first observed sample.
    pub fn new(key: u64, first_sample: &MissSample, max_samples: usize) -> Self {
        let mut hotspot = Self {
            key,
            location: first_sample.location.clone(),
            total_accesses: 0,
            total_misses: 0,
            address_range: AddressRange {
                min: first_sample.memory_addr,
                max: first_sample.memory_addr,
            },
            level_counts: [0; 5],
            avg_latency_cycles: 0.0,
            access_stride: 0,
            dominant_pattern: AccessPattern::default(),
            samples: Vec::new(),
            is_false_sharing: false,
            pattern_metrics: PatternMetrics::default(),
            max_samples,
        };
        hotspot.ingest(first_sample);
        hotspot
    }

    /// Applies one sample's effect on the aggregate: counts, address range,
    /// level counts, running-mean latency, and bounded retention
    /// (first-fill-then-discard, spec §3).
    pub fn ingest(&mut self, sample: &MissSample) {
        self.total_accesses += 1;
        self.total_misses += 1;
        self.address_range.widen(sample.memory_addr);
        self.level_counts[sample.missed_level.index()] += 1;

        // Numerically stable running mean (Welford's incremental update).
        let n = self.total_misses as f64;
        self.avg_latency_cycles += (sample.latency_cycles as f64 - self.avg_latency_cycles) / n;

        if self.samples.len() < self.max_samples {
            self.samples.push(sample.clone());
        }
    }

    /// Builds a hotspot directly from stand-in values rather than real
    /// samples (C6 synthetic-hotspot seeding, spec §4.6). `samples` stays
    /// empty — there is no real ingestion history to retain.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn synthetic(
        key: u64,
        location: SourceLocation,
        total_accesses: u64,
        total_misses: u64,
        avg_latency_cycles: f64,
        address_range: AddressRange,
        access_stride: i64,
        dominant_pattern: AccessPattern,
        max_samples: usize,
    ) -> Self {
        Self {
            key,
            location,
            total_accesses,
            total_misses,
            address_range,
            level_counts: [0; 5],
            avg_latency_cycles,
            access_stride,
            dominant_pattern,
            samples: Vec::new(),
            is_false_sharing: false,
            pattern_metrics: PatternMetrics::default(),
            max_samples,
        }
    }

    pub fn miss_rate(&self) -> f64 {
        self.total_misses as f64 / self.total_accesses.max(1) as f64
    }

    /// `⌈range / line_size⌉ + 1`, used by the false-sharing detector (§4.3).
    pub fn cache_lines_touched(&self, line_size_bytes: u32) -> u64 {
        let span = self.address_range.span();
        span.div_ceil(line_size_bytes as u64) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::MissedLevel;

    fn sample(addr: u64, latency: u32) -> MissSample {
        MissSample {
            instruction_addr: 0x1000,
            memory_addr: addr,
            timestamp_ns: 0,
            cpu_id: 0,
            thread_id: 0,
            access_size: 8,
            is_write: false,
            latency_cycles: latency,
            missed_level: MissedLevel::L2,
            location: SourceLocation::new("a.c", "f", 10, 1),
        }
    }

    #[test]
    fn ingest_tracks_invariants() {
        let mut h = CacheHotspot::new(0x1000, &sample(100, 50), 2);
        h.ingest(&sample(50, 150));
        assert!(h.total_misses <= h.total_accesses);
        assert_eq!(h.address_range.min, 50);
        assert_eq!(h.address_range.max, 100);
        assert!((h.miss_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn retention_caps_at_k_first_fill_then_discard() {
        let mut h = CacheHotspot::new(0x1000, &sample(1, 10), 2);
        h.ingest(&sample(2, 10));
        h.ingest(&sample(3, 10)); // dropped: retention already at K=2
        assert_eq!(h.samples.len(), 2);
        assert_eq!(h.samples[0].memory_addr, 1);
        assert_eq!(h.samples[1].memory_addr, 2);
        assert_eq!(h.total_misses, 3);
    }

    #[test]
    fn running_mean_latency_is_stable() {
        let mut h = CacheHotspot::new(0x1000, &sample(1, 100), 10);
        h.ingest(&sample(2, 200));
        h.ingest(&sample(3, 300));
        assert!((h.avg_latency_cycles - 200.0).abs() < 1e-9);
    }
}
