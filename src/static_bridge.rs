//! Static-Pattern Bridge (C6, spec §4.6). `StaticPattern` is an external,
//! read-only feed from an AST-level analyzer outside this crate; this module
//! only seeds synthetic hotspots when no dynamic data exists, and correlates
//! static patterns onto dynamic classifications by source location.

use serde::{Deserialize, Serialize};

use crate::classifier::{Antipattern, ClassifiedPattern, PrimaryMissType};
use crate::hotspot::{AccessPattern, AddressRange, CacheHotspot};
use crate::sample::SourceLocation;

/// At most this many static patterns seed synthetic hotspots (spec §4.6).
const MAX_SYNTHETIC_HOTSPOTS: usize = 10;
/// Synthetic-hotspot marker bit, keeps synthesized keys out of the range a
/// real `instruction_addr`/`instruction_addr & !0xFFF` would ever produce.
const SYNTHETIC_KEY_MARKER: u64 = 1 << 63;
const SYNTHETIC_TOTAL_ACCESSES: u64 = 100;
const SYNTHETIC_TOTAL_MISSES: u64 = 30; // miss_rate == 0.3
const SYNTHETIC_AVG_LATENCY_CYCLES: f64 = 200.0;
const SYNTHETIC_RANGE_MIN: u64 = 0x1000000;
const SYNTHETIC_RANGE_MAX: u64 = 0x1100000;
const SYNTHETIC_FALLBACK_FUNCTION: &str = "<synthetic>";

/// External, AST-derived access pattern for one array/field use site (spec
/// §3). Read-only inside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticPattern {
    pub location: SourceLocation,
    pub array_or_field_name: String,
    pub struct_name: Option<String>,
    pub pattern_class: AccessPattern,
    pub stride: i64,
    pub loop_depth: u32,
    pub is_struct_access: bool,
}

/// Builds synthetic hotspots and their (canned) classifications from up to
/// the first 10 static patterns. The fixed classification values (severity
/// 75, confidence 0.8, CAPACITY, `0b111`) are spec'd directly — they aren't
/// meant to flow through C4's detector formulas, which can't reproduce them
/// for these stand-in statistics (detect_thrashing only ever yields >= 80).
/// See DESIGN.md.
///
/// `hotspot_ref` in the returned `ClassifiedPattern`s is local to the
/// returned `Vec<CacheHotspot>` (0-based); the caller must offset it by
/// however many dynamic hotspots precede it in the combined arena.
pub fn synthesize(
    static_patterns: &[StaticPattern],
    max_samples_per_hotspot: usize,
) -> (Vec<CacheHotspot>, Vec<ClassifiedPattern>) {
    let mut hotspots = Vec::new();
    let mut classified = Vec::new();

    for (index, pattern) in static_patterns.iter().take(MAX_SYNTHETIC_HOTSPOTS).enumerate() {
        let mut location = pattern.location.clone();
        if location.function.is_empty() {
            location.function = SYNTHETIC_FALLBACK_FUNCTION.to_string();
        }

        let hotspot = CacheHotspot::synthetic(
            SYNTHETIC_KEY_MARKER | index as u64,
            location,
            SYNTHETIC_TOTAL_ACCESSES,
            SYNTHETIC_TOTAL_MISSES,
            SYNTHETIC_AVG_LATENCY_CYCLES,
            AddressRange {
                min: SYNTHETIC_RANGE_MIN,
                max: SYNTHETIC_RANGE_MAX,
            },
            pattern.stride,
            pattern.pattern_class,
            max_samples_per_hotspot,
        );

        let performance_impact = crate::classifier::performance_impact(&hotspot, Antipattern::Thrashing);
        let description = crate::classifier::describe(Antipattern::Thrashing, &hotspot);
        let root_cause = crate::classifier::root_cause(Antipattern::Thrashing, PrimaryMissType::Capacity);

        classified.push(ClassifiedPattern {
            hotspot_ref: index,
            antipattern: Antipattern::Thrashing,
            severity_score: 75.0,
            confidence: 0.8,
            primary_miss_type: PrimaryMissType::Capacity,
            affected_levels_bitmask: 0b111,
            performance_impact,
            description,
            root_cause,
            correlated_static: Vec::new(),
        });

        hotspots.push(hotspot);
    }

    (hotspots, classified)
}

/// Attaches, to each classified pattern, the indices of every `StaticPattern`
/// whose `(file, line)` matches its hotspot's location. Informative only —
/// never changes `antipattern`/`severity_score`/etc.
pub fn correlate(
    classified: &mut [ClassifiedPattern],
    hotspots: &[CacheHotspot],
    static_patterns: &[StaticPattern],
) {
    for pattern in classified.iter_mut() {
        let Some(hotspot) = hotspots.get(pattern.hotspot_ref) else {
            continue;
        };
        pattern.correlated_static = static_patterns
            .iter()
            .enumerate()
            .filter(|(_, sp)| {
                sp.location.file == hotspot.location.file && sp.location.line == hotspot.location.line
            })
            .map(|(idx, _)| idx)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(file: &str, function: &str, line: u32) -> StaticPattern {
        StaticPattern {
            location: SourceLocation::new(file, function, line, 1),
            array_or_field_name: "a".to_string(),
            struct_name: None,
            pattern_class: AccessPattern::NestedLoop,
            stride: 4096,
            loop_depth: 2,
            is_struct_access: false,
        }
    }

    #[test]
    fn synthesize_caps_at_ten_and_uses_fixed_classification() {
        let patterns: Vec<StaticPattern> = (0..15).map(|i| pattern("mm.c", "mmul", i)).collect();
        let (hotspots, classified) = synthesize(&patterns, 100);
        assert_eq!(hotspots.len(), MAX_SYNTHETIC_HOTSPOTS);
        assert_eq!(classified.len(), MAX_SYNTHETIC_HOTSPOTS);
        for (hotspot, pattern) in hotspots.iter().zip(classified.iter()) {
            assert!((hotspot.miss_rate() - 0.3).abs() < 1e-9);
            assert_eq!(pattern.antipattern, Antipattern::Thrashing);
            assert!((pattern.severity_score - 75.0).abs() < 1e-9);
            assert_eq!(pattern.affected_levels_bitmask, 0b111);
        }
    }

    #[test]
    fn synthesize_falls_back_to_fixed_function_name_when_missing() {
        let patterns = vec![pattern("mm.c", "", 12)];
        let (hotspots, _) = synthesize(&patterns, 100);
        assert_eq!(hotspots[0].location.function, SYNTHETIC_FALLBACK_FUNCTION);
    }

    #[test]
    fn correlate_attaches_matching_static_patterns_by_file_and_line() {
        let patterns = vec![pattern("mm.c", "mmul", 12), pattern("other.c", "f", 5)];
        let (hotspots, mut classified) = synthesize(&patterns[..1], 100);
        correlate(&mut classified, &hotspots, &patterns);
        assert_eq!(classified[0].correlated_static, vec![0]);
    }
}
