//! Pattern Analyzer (C3, spec §4.3). Pure function of a hotspot's retained
//! samples: stride detection, entropy, autocorrelation, reuse distance, and
//! the false-sharing flag. Runs after C2's `process()` enriches hotspots in
//! place; never touches `total_accesses`/`total_misses`/`address_range`.

use crate::config::AnalysisConfig;
use crate::hotspot::{AccessPattern, CacheHotspot, ReuseDistanceStats};
use crate::sample::MissSample;

/// 64-byte cache line, fixed by the glossary definition of reuse distance
/// and false sharing — not read from the `CacheModel`.
const CACHE_LINE_BYTES: u64 = 64;
/// Reuse-distance lookback bound (spec §4.3: "bounded lookback of 1000 samples").
const REUSE_LOOKBACK: usize = 1000;

/// Enriches one hotspot's pattern fields in place. Called once per hotspot
/// by `Aggregator::process`, safe to call concurrently across distinct
/// hotspots (no shared state).
pub fn analyze_hotspot(hotspot: &mut CacheHotspot, config: &AnalysisConfig) {
    if hotspot.samples.len() >= config.min_samples_for_stride {
        let (stride, pattern) = stride_and_pattern(&hotspot.samples);
        hotspot.access_stride = stride;
        hotspot.dominant_pattern = pattern;

        hotspot.pattern_metrics.entropy = bit_frequency_entropy(&hotspot.samples);
        hotspot.pattern_metrics.autocorrelation_lag1 = autocorrelation_lag1(&hotspot.samples);
        hotspot.pattern_metrics.reuse_distance = reuse_distance_stats(&hotspot.samples);
    }

    if config.false_sharing_enabled && hotspot.samples.len() >= config.min_samples_for_false_sharing {
        hotspot.is_false_sharing = detect_false_sharing(hotspot);
    }
}

/// Sorts a *copy* of the retained samples by `memory_addr` (stable, so ties
/// keep ingestion order — spec §4.3/§5 determinism), computes adjacent
/// deltas, rejects `delta == 0` or `delta >= 4096`, and if at least half the
/// deltas survive, returns their mean as `access_stride` plus the resulting
/// classification. The original `samples` vector (and its ingestion order,
/// which C4's false-sharing heuristic relies on) is left untouched.
fn stride_and_pattern(samples: &[MissSample]) -> (i64, AccessPattern) {
    let mut sorted: Vec<&MissSample> = samples.iter().collect();
    sorted.sort_by_key(|s| s.memory_addr);

    let total_pairs = sorted.len().saturating_sub(1);
    if total_pairs == 0 {
        return (0, AccessPattern::Random);
    }

    let surviving: Vec<u64> = sorted
        .windows(2)
        .map(|w| w[1].memory_addr - w[0].memory_addr)
        .filter(|&delta| delta != 0 && delta < 4096)
        .collect();

    if surviving.len() * 2 < total_pairs {
        return (0, AccessPattern::Random);
    }

    let mean = surviving.iter().sum::<u64>() as f64 / surviving.len() as f64;
    let pattern = if mean == 1.0 {
        AccessPattern::Sequential
    } else if mean <= 64.0 {
        AccessPattern::Strided
    } else {
        AccessPattern::Random
    };
    (mean.round() as i64, pattern)
}

/// Bit-frequency (binary) entropy over the low 64 bits of `memory_addr`,
/// normalized to `[0,1]` by dividing the 64-bit sum by 64.
fn bit_frequency_entropy(samples: &[MissSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mut set_counts = [0u64; 64];
    for sample in samples {
        for (bit, count) in set_counts.iter_mut().enumerate() {
            if sample.memory_addr & (1u64 << bit) != 0 {
                *count += 1;
            }
        }
    }

    let total: f64 = set_counts
        .iter()
        .map(|&count| binary_entropy(count as f64 / n))
        .sum();
    total / 64.0
}

fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

/// Lag-1 autocorrelation of the delta sequence (sorted-address adjacent
/// differences), i.e. `corr(delta[i], delta[i+1])`.
fn autocorrelation_lag1(samples: &[MissSample]) -> f64 {
    let mut sorted: Vec<u64> = samples.iter().map(|s| s.memory_addr).collect();
    sorted.sort_unstable();
    let deltas: Vec<f64> = sorted.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    if deltas.len() < 2 {
        return 0.0;
    }

    let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
    let variance: f64 = deltas.iter().map(|d| (d - mean).powi(2)).sum();
    if variance == 0.0 {
        return 0.0;
    }

    let covariance: f64 = deltas
        .windows(2)
        .map(|w| (w[0] - mean) * (w[1] - mean))
        .sum();
    covariance / variance
}

/// For each sample (in ingestion order), distance back to the most recent
/// sample sharing its 64-byte cache line, bounded by a 1000-sample lookback.
fn reuse_distance_stats(samples: &[MissSample]) -> ReuseDistanceStats {
    let mut distances: Vec<u32> = Vec::new();

    for (i, sample) in samples.iter().enumerate() {
        let line = sample.memory_addr / CACHE_LINE_BYTES;
        let lookback_start = i.saturating_sub(REUSE_LOOKBACK);
        if let Some(distance) = samples[lookback_start..i]
            .iter()
            .rev()
            .position(|prior| prior.memory_addr / CACHE_LINE_BYTES == line)
        {
            distances.push((distance + 1) as u32);
        }
    }

    if distances.is_empty() {
        return ReuseDistanceStats::default();
    }

    let sum: u64 = distances.iter().map(|&d| d as u64).sum();
    ReuseDistanceStats {
        mean: sum as f64 / distances.len() as f64,
        min: *distances.iter().min().unwrap(),
        max: *distances.iter().max().unwrap(),
        samples_considered: distances.len(),
    }
}

/// `is_false_sharing` iff `popcount(cpu_mask) >= 2 && cache_lines <= 2 &&
/// miss_rate > 0.3` (spec §4.3). CPU ids are folded into a 64-bit mask —
/// multi-socket systems rarely exceed 64 logical CPUs, and a fold keeps the
/// popcount check conservative rather than silently wrong for wider ids.
fn detect_false_sharing(hotspot: &CacheHotspot) -> bool {
    let mut cpu_mask: u64 = 0;
    let mut write_cpu_mask: u64 = 0;
    for sample in &hotspot.samples {
        let bit = 1u64 << (sample.cpu_id & 63);
        cpu_mask |= bit;
        if sample.is_write {
            write_cpu_mask |= bit;
        }
    }
    let _ = write_cpu_mask; // carried for downstream correlation, not part of this predicate

    let cache_lines = hotspot.cache_lines_touched(CACHE_LINE_BYTES as u32);
    cpu_mask.count_ones() >= 2 && cache_lines <= 2 && hotspot.miss_rate() > 0.3
}
