//! Sample Ingest & Hotspot Aggregator (C2, spec §4.2).
//!
//! The hotspot table is the only piece of state the core mutates across
//! calls. It is guarded by a single mutex (spec §5): `add_samples` and
//! `process` are the only methods that take the lock for writing;
//! `get_hotspots` takes it briefly to clone a consistent snapshot.

use std::collections::HashMap;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{instrument, warn};

use crate::config::{AggregationPolicy, AnalysisConfig};
use crate::error::{CoreError, Result};
use crate::hotspot::CacheHotspot;
use crate::pattern_analyzer;
use crate::sample::MissSample;

impl AggregationPolicy {
    fn key_for(self, instruction_addr: u64) -> u64 {
        match self {
            AggregationPolicy::ByInstruction => instruction_addr,
            AggregationPolicy::ByFunction => instruction_addr & !0xFFF,
        }
    }
}

/// Outcome of one `add_samples` call: how many new/updated hotspots
/// accepted samples, and how many samples were dropped because accepting
/// them would have created a hotspot beyond `max_hotspots`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityReport {
    pub accepted: usize,
    pub dropped: usize,
}

struct Table {
    hotspots: HashMap<u64, CacheHotspot>,
    /// First-seen order of keys, used as a stable tie-break so `get_hotspots`
    /// and stride detection are deterministic across repeated runs.
    insertion_order: HashMap<u64, usize>,
}

impl Table {
    fn new() -> Self {
        Self {
            hotspots: HashMap::new(),
            insertion_order: HashMap::new(),
        }
    }
}

/// Accepts batches of `MissSample`s and maintains the bounded, keyed
/// collection of `CacheHotspot`s.
pub struct Aggregator {
    config: AnalysisConfig,
    table: Mutex<Table>,
}

impl Aggregator {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            table: Mutex::new(Table::new()),
        })
    }

    /// Ingests a batch of samples, creating new hotspots or updating
    /// existing ones. O(N) in batch size.
    #[instrument(skip(self, batch), fields(batch_len = batch.len()))]
    pub fn add_samples(&self, batch: &[MissSample]) -> Result<CapacityReport> {
        let mut table = self.table.lock();
        let mut report = CapacityReport::default();

        for sample in batch {
            let key = self.config.aggregation_policy.key_for(sample.instruction_addr);

            if let Some(hotspot) = table.hotspots.get_mut(&key) {
                hotspot.ingest(sample);
                report.accepted += 1;
                continue;
            }

            if table.hotspots.len() >= self.config.max_hotspots {
                report.dropped += 1;
                continue;
            }

            table
                .hotspots
                .try_reserve(1)
                .map_err(|e| CoreError::ResourceExhausted(e.to_string()))?;
            let index = table.insertion_order.len();
            table.insertion_order.insert(key, index);
            table.hotspots.insert(
                key,
                CacheHotspot::new(key, sample, self.config.max_samples_per_hotspot),
            );
            report.accepted += 1;
        }

        if report.dropped > 0 {
            warn!(
                dropped = report.dropped,
                max_hotspots = self.config.max_hotspots,
                "hotspot capacity reached; dropping samples for new keys"
            );
        }

        Ok(report)
    }

    /// Finalizes aggregation: runs C3's pattern inference (stride, entropy,
    /// reuse distance, false sharing) over every hotspot in place, in
    /// parallel across hotspots (spec §5: C3 is embarrassingly parallel).
    #[instrument(skip(self))]
    pub fn process(&self) -> Result<()> {
        let mut table = self.table.lock();
        let mut values: Vec<&mut CacheHotspot> = table.hotspots.values_mut().collect();
        values
            .par_iter_mut()
            .for_each(|hotspot| pattern_analyzer::analyze_hotspot(hotspot, &self.config));
        Ok(())
    }

    /// Returns hotspots passing both thresholds, sorted by `total_misses`
    /// descending; ties broken by first-seen insertion order for
    /// determinism (idempotence property, spec §8).
    pub fn get_hotspots(&self, min_samples: usize, min_miss_rate: f64) -> Vec<CacheHotspot> {
        let table = self.table.lock();
        let mut result: Vec<(usize, &CacheHotspot)> = table
            .hotspots
            .iter()
            .filter(|(_, h)| h.samples.len() >= min_samples && h.miss_rate() >= min_miss_rate)
            .map(|(key, h)| (table.insertion_order[key], h))
            .collect();

        result.sort_by(|a, b| b.1.total_misses.cmp(&a.1.total_misses).then(a.0.cmp(&b.0)));
        result.into_iter().map(|(_, h)| h.clone()).collect()
    }

    /// Number of distinct hotspot keys currently tracked.
    pub fn hotspot_count(&self) -> usize {
        self.table.lock().hotspots.len()
    }

    /// Inserts a synthesized hotspot (used by C6 when no dynamic data
    /// exists). Bypasses the per-batch capacity bookkeeping since synthetic
    /// hotspots are created once, outside normal ingestion.
    pub(crate) fn insert_synthetic(&self, hotspot: CacheHotspot) {
        let mut table = self.table.lock();
        let index = table.insertion_order.len();
        table.insertion_order.insert(hotspot.key, index);
        table.hotspots.insert(hotspot.key, hotspot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{MissedLevel, SourceLocation};

    fn sample(addr: u64, instr: u64) -> MissSample {
        MissSample {
            instruction_addr: instr,
            memory_addr: addr,
            timestamp_ns: 0,
            cpu_id: 0,
            thread_id: 0,
            access_size: 8,
            is_write: false,
            latency_cycles: 100,
            missed_level: MissedLevel::L2,
            location: SourceLocation::new("a.c", "f", 1, 1),
        }
    }

    #[test]
    fn add_samples_creates_and_updates_hotspots() {
        let agg = Aggregator::new(AnalysisConfig::default()).unwrap();
        agg.add_samples(&[sample(100, 0x1000), sample(104, 0x1000)]).unwrap();
        assert_eq!(agg.hotspot_count(), 1);
        let hotspots = agg.get_hotspots(0, 0.0);
        assert_eq!(hotspots[0].total_misses, 2);
    }

    #[test]
    fn capacity_is_soft_and_existing_keys_keep_updating() {
        let mut config = AnalysisConfig::default();
        config.max_hotspots = 1;
        let agg = Aggregator::new(config).unwrap();
        let report = agg
            .add_samples(&[sample(1, 0x1000), sample(2, 0x2000), sample(3, 0x1000)])
            .unwrap();
        assert_eq!(agg.hotspot_count(), 1);
        assert_eq!(report.accepted, 2); // first sample creates, third updates
        assert_eq!(report.dropped, 1); // second tries to create beyond cap
    }

    #[test]
    fn get_hotspots_sorted_by_misses_descending() {
        let agg = Aggregator::new(AnalysisConfig::default()).unwrap();
        agg.add_samples(&[sample(1, 0x1000)]).unwrap();
        agg.add_samples(&[sample(2, 0x2000), sample(3, 0x2000), sample(4, 0x2000)])
            .unwrap();
        let hotspots = agg.get_hotspots(0, 0.0);
        assert_eq!(hotspots[0].key, 0x2000);
        assert_eq!(hotspots[1].key, 0x1000);
    }

    #[test]
    fn process_is_idempotent() {
        let agg = Aggregator::new(AnalysisConfig::default()).unwrap();
        agg.add_samples(&[sample(1, 0x1000), sample(2, 0x1000)]).unwrap();
        agg.process().unwrap();
        let first = agg.get_hotspots(0, 0.0);
        agg.process().unwrap();
        let second = agg.get_hotspots(0, 0.0);
        assert_eq!(first[0].access_stride, second[0].access_stride);
        assert_eq!(first[0].dominant_pattern, second[0].dominant_pattern);
    }
}
