//! Pipeline Orchestrator (C7, spec §4.7): owns the hotspot arena and drives
//! the fixed `add_samples → process → (synthesize) → classify → recommend`
//! sequence behind one `analyze` call.

use crate::aggregator::Aggregator;
use crate::cache_model::CacheModel;
use crate::classifier::{self, ClassifiedPattern};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::hotspot::CacheHotspot;
use crate::recommendation::{self, Recommendation};
use crate::sample::MissSample;
use crate::static_bridge::{self, StaticPattern};
use tracing::{debug, instrument};

/// Owns the single-writer hotspot table and the read-only cache model; the
/// arena-by-index design (spec §9) means `ClassifiedPattern`/`Recommendation`
/// carry plain `usize` references into the `Vec<CacheHotspot>` this returns,
/// never lifetimes back into `Core`.
pub struct Core {
    aggregator: Aggregator,
    model: CacheModel,
    config: AnalysisConfig,
}

impl Core {
    pub fn new(model: CacheModel, config: AnalysisConfig) -> Result<Self> {
        let aggregator = Aggregator::new(config.clone())?;
        Ok(Self {
            aggregator,
            model,
            config,
        })
    }

    /// Runs the full pipeline over one batch. Safe to call repeatedly; each
    /// call's samples accumulate into the same hotspot table (spec §5).
    #[instrument(skip(self, samples, static_patterns), fields(samples = samples.len(), static_patterns = static_patterns.len()))]
    pub fn analyze(
        &self,
        samples: &[MissSample],
        static_patterns: &[StaticPattern],
    ) -> Result<(Vec<CacheHotspot>, Vec<ClassifiedPattern>, Vec<Recommendation>)> {
        self.aggregator.add_samples(samples)?;
        self.aggregator.process()?;

        let mut hotspots = self.aggregator.get_hotspots(
            self.config.default_min_samples,
            self.config.default_min_miss_rate,
        );
        let mut classified = classifier::classify_all(&hotspots, &self.model, &self.config);

        if samples.is_empty() && !static_patterns.is_empty() {
            let base = hotspots.len();
            let (synthetic_hotspots, synthetic_classified) =
                static_bridge::synthesize(static_patterns, self.config.max_samples_per_hotspot);
            for hotspot in &synthetic_hotspots {
                self.aggregator.insert_synthetic(hotspot.clone());
            }
            hotspots.extend(synthetic_hotspots);
            classified.extend(synthetic_classified.into_iter().map(|mut pattern| {
                pattern.hotspot_ref += base;
                pattern
            }));
        }

        static_bridge::correlate(&mut classified, &hotspots, static_patterns);

        let recommendations = recommendation::recommend_all(&classified, &hotspots, &self.model, &self.config);

        debug!(
            hotspots = hotspots.len(),
            classified = classified.len(),
            recommendations = recommendations.len(),
            "analyze finished"
        );
        Ok((hotspots, classified, recommendations))
    }

    pub fn cache_model(&self) -> &CacheModel {
        &self.model
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn hotspot_count(&self) -> usize {
        self.aggregator.hotspot_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_model::{CacheKind, CacheLevel};
    use crate::hotspot::AccessPattern;
    use crate::sample::{MissedLevel, SourceLocation};

    fn model() -> CacheModel {
        CacheModel::new(
            vec![CacheLevel {
                level: 1,
                kind: CacheKind::Data,
                size_bytes: 32 * 1024,
                line_size_bytes: 64,
                associativity: 8,
                sets: 64,
                latency_cycles: 4,
                shared: false,
                sharing_cpus: 1,
                inclusive: false,
            }],
            1,
            4096,
            1 << 34,
        )
        .unwrap()
    }

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
            missed_level: MissedLevel::L1,
            location: SourceLocation::new("mm.c", "mmul", 12, 1),
        }
    }

    #[test]
    fn analyze_over_dynamic_samples_produces_classified_patterns_and_recommendations() {
        let core = Core::new(model(), AnalysisConfig::default()).unwrap();
        let samples: Vec<MissSample> = (0..20).map(|i| sample(i, 0x1000)).collect();
        let (hotspots, classified, recommendations) = core.analyze(&samples, &[]).unwrap();
        assert_eq!(hotspots.len(), 1);
        assert_eq!(classified.len(), 1);
        assert!(!recommendations.is_empty());
    }

    #[test]
    fn analyze_with_zero_samples_and_static_patterns_synthesizes_hotspots() {
        let core = Core::new(model(), AnalysisConfig::default()).unwrap();
        let statics = vec![StaticPattern {
            location: SourceLocation::new("mm.c", "mmul", 12, 1),
            array_or_field_name: "a".to_string(),
            struct_name: None,
            pattern_class: AccessPattern::NestedLoop,
            stride: 4096,
            loop_depth: 2,
            is_struct_access: false,
        }];
        let (hotspots, classified, recommendations) = core.analyze(&[], &statics).unwrap();
        assert_eq!(hotspots.len(), 1);
        assert_eq!(classified.len(), 1);
        assert!((classified[0].severity_score - 75.0).abs() < 1e-9);
        assert!(!recommendations.is_empty());
    }

    #[test]
    fn analyze_with_zero_samples_and_no_static_patterns_yields_nothing() {
        let core = Core::new(model(), AnalysisConfig::default()).unwrap();
        let (hotspots, classified, recommendations) = core.analyze(&[], &[]).unwrap();
        assert!(hotspots.is_empty());
        assert!(classified.is_empty());
        assert!(recommendations.is_empty());
    }
}
