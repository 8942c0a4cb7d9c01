//! Tunables threaded explicitly into the pipeline (spec §9 redesign: no
//! process-wide global state).

use crate::error::{CoreError, Result};

/// Key policy used by the aggregator (C2) to bucket samples into hotspots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AggregationPolicy {
    /// `key = instruction_addr`.
    ByInstruction,
    /// `key = instruction_addr & !0xFFF` (4 KiB-aligned).
    ByFunction,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        AggregationPolicy::ByInstruction
    }
}

/// Every tunable named across spec §4, collected into one explicit config
/// value rather than scattered constants or global flags.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisConfig {
    /// Aggregation key policy (fixed at construction of the aggregator).
    pub aggregation_policy: AggregationPolicy,
    /// Soft cap on distinct hotspot keys tracked concurrently. Default 1000.
    pub max_hotspots: usize,
    /// Bounded per-hotspot sample retention, first-fill-then-discard. Default 100.
    pub max_samples_per_hotspot: usize,
    /// Minimum retained samples before stride detection runs. Default 2.
    pub min_samples_for_stride: usize,
    /// Minimum retained samples before the false-sharing scan runs. Default 10.
    pub min_samples_for_false_sharing: usize,
    /// Whether the false-sharing scan (C3) is enabled at all. Default true.
    pub false_sharing_enabled: bool,
    /// Minimum confidence required to keep an unclassified hotspot's best
    /// detector result (spec §4.4). Default 0.5.
    pub min_confidence_threshold: f64,
    /// Global floor on `expected_improvement_pct` surviving C5's filters.
    /// Default 10.0.
    pub min_expected_improvement: f64,
    /// Lower bound used by `get_hotspots(min_samples, min_miss_rate)` callers
    /// that want the config's own defaults rather than ad hoc values.
    pub default_min_samples: usize,
    /// Matching default miss-rate floor for `get_hotspots`.
    pub default_min_miss_rate: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            aggregation_policy: AggregationPolicy::default(),
            max_hotspots: 1000,
            max_samples_per_hotspot: 100,
            min_samples_for_stride: 2,
            min_samples_for_false_sharing: 10,
            false_sharing_enabled: true,
            min_confidence_threshold: 0.5,
            min_expected_improvement: 10.0,
            default_min_samples: 1,
            default_min_miss_rate: 0.0,
        }
    }
}

impl AnalysisConfig {
    /// Validates internal consistency; called once at `Core::new`.
    pub fn validate(&self) -> Result<()> {
        if self.max_hotspots == 0 {
            return Err(CoreError::InvalidArgument(
                "max_hotspots must be > 0".into(),
            ));
        }
        if self.max_samples_per_hotspot == 0 {
            return Err(CoreError::InvalidArgument(
                "max_samples_per_hotspot must be > 0".into(),
            ));
        }
        if self.min_samples_for_stride == 0 {
            return Err(CoreError::InvalidArgument(
                "min_samples_for_stride must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence_threshold) {
            return Err(CoreError::InvalidArgument(
                "min_confidence_threshold must be in [0,1]".into(),
            ));
        }
        Ok(())
    }
}
