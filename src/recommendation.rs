//! Recommendation Engine (C5, spec §4.5). Generates typed, ranked
//! recommendations from classified patterns: one rule set keyed by the
//! hotspot's `dominant_pattern`, one keyed by its `antipattern`, a NUMA rule
//! that always fires on multi-node machines, then two-phase dedup, a
//! pairwise conflict filter, a global floor, and a final stable sort.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cache_model::CacheModel;
use crate::classifier::{Antipattern, ClassifiedPattern};
use crate::config::AnalysisConfig;
use crate::hotspot::{AccessPattern, CacheHotspot};

/// The ten recommendation types named in spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecType {
    LoopTiling,
    AccessReorder,
    CacheBlocking,
    LoopVectorize,
    PrefetchHints,
    DataLayoutChange,
    MemoryPooling,
    MemoryAlignment,
    LoopUnroll,
    NumaBinding,
}

/// One typed, ranked piece of optimization advice attached to a single
/// classified pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub rec_type: RecType,
    /// Index into the `classified` slice passed to `recommend_all`.
    pub pattern_ref: usize,
    pub priority: u8,
    pub expected_improvement_pct: f64,
    pub confidence: f64,
    pub implementation_difficulty: u8,
    pub rationale: String,
    pub code_template: &'static str,
    pub implementation_guide: &'static str,
    pub compiler_flags: Vec<&'static str>,
    pub is_automatic: bool,
    /// `(l1_tile, l2_tile)`, set only for `LoopTiling` recommendations.
    pub tile_size: Option<(u32, u32)>,
}

/// Generates, filters, deduplicates and ranks recommendations for every
/// classified pattern.
#[instrument(skip(classified, hotspots, model, config), fields(pattern_count = classified.len()))]
pub fn recommend_all(
    classified: &[ClassifiedPattern],
    hotspots: &[CacheHotspot],
    model: &CacheModel,
    config: &AnalysisConfig,
) -> Vec<Recommendation> {
    let mut candidates = Vec::new();
    for (pattern_ref, pattern) in classified.iter().enumerate() {
        let Some(hotspot) = hotspots.get(pattern.hotspot_ref) else {
            continue;
        };
        candidates.extend(generate_for(pattern_ref, pattern, hotspot, model));
    }

    let sensible: Vec<Recommendation> = candidates
        .into_iter()
        .filter(|rec| passes_phase_a(rec, resolve_hotspot(rec, classified, hotspots)))
        .collect();

    let deduped = dedup_phase_b(sensible, classified, hotspots);
    let conflict_filtered = filter_conflicts(deduped, classified, hotspots);

    let mut ranked: Vec<Recommendation> = conflict_filtered
        .into_iter()
        .filter(|rec| rec.expected_improvement_pct >= config.min_expected_improvement)
        .collect();

    ranked.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.expected_improvement_pct.partial_cmp(&a.expected_improvement_pct).unwrap())
            .then(b.confidence.partial_cmp(&a.confidence).unwrap())
            .then(a.implementation_difficulty.cmp(&b.implementation_difficulty))
    });
    debug!(recommendations = ranked.len(), "recommendation generation finished");
    ranked
}

fn resolve_hotspot<'a>(
    rec: &Recommendation,
    classified: &[ClassifiedPattern],
    hotspots: &'a [CacheHotspot],
) -> &'a CacheHotspot {
    let pattern = &classified[rec.pattern_ref];
    &hotspots[pattern.hotspot_ref]
}

const LOOP_BODY_TYPES: [RecType; 4] = [
    RecType::LoopVectorize,
    RecType::PrefetchHints,
    RecType::LoopTiling,
    RecType::CacheBlocking,
];
const DISALLOWED_FUNCTION_SUBSTRINGS: [&str; 4] = ["printf", "malloc", "free", "init"];

fn passes_phase_a(rec: &Recommendation, hotspot: &CacheHotspot) -> bool {
    if rec.confidence < 0.5 || rec.expected_improvement_pct < 15.0 {
        return false;
    }
    let function = hotspot.location.function.as_str();
    if LOOP_BODY_TYPES.contains(&rec.rec_type) && function == "main" {
        return false;
    }
    if DISALLOWED_FUNCTION_SUBSTRINGS
        .iter()
        .any(|needle| function.contains(needle))
    {
        return false;
    }
    if rec.rec_type == RecType::LoopVectorize && hotspot.location.line < 30 && rec.confidence < 0.8 {
        return false;
    }
    true
}

/// Logical scope for phase-B dedup (spec §4.5): same `rec_type` plus, for
/// whole-function rule types, the same function; for line-sensitive types,
/// the same function with overlapping `±5`-line windows (resolved via
/// union-find so overlap chains transitively, e.g. lines 10/14/18 all merge).
fn dedup_phase_b(
    recs: Vec<Recommendation>,
    classified: &[ClassifiedPattern],
    hotspots: &[CacheHotspot],
) -> Vec<Recommendation> {
    let n = recs.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    fn union(parent: &mut [usize], a: usize, b: usize) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent[ra] = rb;
        }
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if same_scope(&recs[i], &recs[j], classified, hotspots) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    let mut survivors = Vec::new();
    for members in groups.values() {
        let best = members
            .iter()
            .copied()
            .min_by(|&a, &b| {
                recs[a]
                    .priority
                    .cmp(&recs[b].priority)
                    .then(
                        recs[b]
                            .expected_improvement_pct
                            .partial_cmp(&recs[a].expected_improvement_pct)
                            .unwrap(),
                    )
            })
            .unwrap();
        survivors.push(best);
    }
    survivors.sort_unstable();
    survivors.into_iter().map(|i| recs[i].clone()).collect()
}

fn same_scope(
    a: &Recommendation,
    b: &Recommendation,
    classified: &[ClassifiedPattern],
    hotspots: &[CacheHotspot],
) -> bool {
    if a.rec_type != b.rec_type {
        return false;
    }
    let ha = resolve_hotspot(a, classified, hotspots);
    let hb = resolve_hotspot(b, classified, hotspots);

    match a.rec_type {
        RecType::LoopVectorize
        | RecType::PrefetchHints
        | RecType::CacheBlocking
        | RecType::LoopTiling
        | RecType::MemoryPooling => ha.location.function == hb.location.function,
        RecType::AccessReorder | RecType::DataLayoutChange => {
            ha.location.function == hb.location.function
                && (ha.location.line as i64 - hb.location.line as i64).abs() <= 5
        }
        RecType::MemoryAlignment | RecType::LoopUnroll | RecType::NumaBinding => false,
    }
}

/// LOOP_VECTORIZE vs DATA_LAYOUT_CHANGE at the same `(file, line)`: keep the
/// higher `expected_improvement_pct`.
fn filter_conflicts(
    recs: Vec<Recommendation>,
    classified: &[ClassifiedPattern],
    hotspots: &[CacheHotspot],
) -> Vec<Recommendation> {
    let mut dropped = vec![false; recs.len()];
    for i in 0..recs.len() {
        if dropped[i] {
            continue;
        }
        for j in (i + 1)..recs.len() {
            if dropped[j] {
                continue;
            }
            let conflicting = matches!(
                (recs[i].rec_type, recs[j].rec_type),
                (RecType::LoopVectorize, RecType::DataLayoutChange)
                    | (RecType::DataLayoutChange, RecType::LoopVectorize)
            );
            if !conflicting {
                continue;
            }
            let ha = resolve_hotspot(&recs[i], classified, hotspots);
            let hb = resolve_hotspot(&recs[j], classified, hotspots);
            if ha.location.file == hb.location.file && ha.location.line == hb.location.line {
                if recs[i].expected_improvement_pct >= recs[j].expected_improvement_pct {
                    dropped[j] = true;
                } else {
                    dropped[i] = true;
                }
            }
        }
    }
    recs.into_iter()
        .zip(dropped)
        .filter_map(|(rec, is_dropped)| if is_dropped { None } else { Some(rec) })
        .collect()
}

/// Priority is derived once per classified pattern from its `severity_score`
/// and shared by every recommendation it produces (spec §8 scenarios 2 and
/// 3 both show a single antipattern's recommendations sharing one priority
/// regardless of their individual `expected_improvement_pct`, which the
/// literal per-recommendation reading of §4.5 can't reproduce — see
/// DESIGN.md).
fn priority_for(severity_score: f64) -> u8 {
    if severity_score > 50.0 {
        1
    } else if severity_score > 30.0 {
        2
    } else {
        3
    }
}

fn prefetch_distance(pattern: AccessPattern) -> u32 {
    match pattern {
        AccessPattern::Strided => 16,
        AccessPattern::Sequential => 4,
        _ => 8,
    }
}

/// `l1_tile = min(32, floor(sqrt(L1.size / (3*8))))`,
/// `l2_tile = min(128, floor(sqrt(L2.size / (3*8))))`.
fn tile_sizes(model: &CacheModel) -> Option<(u32, u32)> {
    let l1 = model.l1()?;
    let l2 = model.l2()?;
    let l1_tile = (32u32).min(((l1.size_bytes as f64) / 24.0).sqrt().floor() as u32);
    let l2_tile = (128u32).min(((l2.size_bytes as f64) / 24.0).sqrt().floor() as u32);
    Some((l1_tile, l2_tile))
}

#[allow(clippy::too_many_arguments)]
fn rec(
    pattern_ref: usize,
    priority: u8,
    rec_type: RecType,
    improvement: f64,
    confidence: f64,
    difficulty: u8,
    rationale: impl Into<String>,
    code_template: &'static str,
    implementation_guide: &'static str,
    compiler_flags: &[&'static str],
    is_automatic: bool,
    tile_size: Option<(u32, u32)>,
) -> Recommendation {
    Recommendation {
        rec_type,
        pattern_ref,
        priority,
        expected_improvement_pct: improvement,
        confidence,
        implementation_difficulty: difficulty,
        rationale: rationale.into(),
        code_template,
        implementation_guide,
        compiler_flags: compiler_flags.to_vec(),
        is_automatic,
        tile_size,
    }
}

fn generate_for(
    pattern_ref: usize,
    classified: &ClassifiedPattern,
    hotspot: &CacheHotspot,
    model: &CacheModel,
) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let priority = priority_for(classified.severity_score.clamp(0.0, 100.0));

    match hotspot.dominant_pattern {
        AccessPattern::Sequential => {
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::LoopVectorize,
                40.0,
                0.9,
                3,
                "Sequential access vectorizes cleanly across cache lines.",
                templates::VECTORIZE,
                templates::GUIDE_VECTORIZE,
                &["-O3", "-ftree-vectorize", "-march=native"],
                true,
                None,
            ));
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::PrefetchHints,
                15.0,
                0.85,
                3,
                format!(
                    "Stream ahead with a software prefetch distance of {}.",
                    prefetch_distance(AccessPattern::Sequential)
                ),
                templates::PREFETCH,
                templates::GUIDE_PREFETCH,
                &["-fprefetch-loop-arrays"],
                true,
                None,
            ));
        }
        AccessPattern::Strided => {
            if hotspot.access_stride > 8 {
                if let Some((l1_tile, l2_tile)) = tile_sizes(model) {
                    recs.push(rec(
                        pattern_ref,
                        priority,
                        RecType::LoopTiling,
                        35.0,
                        0.8,
                        5,
                        format!("Stride {} exceeds a cache line; tile the loop nest.", hotspot.access_stride),
                        templates::TILING,
                        templates::GUIDE_TILING,
                        &[],
                        false,
                        Some((l1_tile, l2_tile)),
                    ));
                }
                recs.push(rec(
                    pattern_ref,
                    priority,
                    RecType::LoopVectorize,
                    25.0,
                    0.7,
                    3,
                    "Strided access can still vectorize using gather instructions.",
                    templates::VECTORIZE_GATHER,
                    templates::GUIDE_VECTORIZE,
                    &["-O3", "-mavx2"],
                    true,
                    None,
                ));
            }
        }
        AccessPattern::Random => {
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::DataLayoutChange,
                35.0,
                0.75,
                6,
                "Random access benefits from a layout with better locality.",
                templates::SOA,
                templates::GUIDE_SOA,
                &[],
                false,
                None,
            ));
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::MemoryPooling,
                20.0,
                0.65,
                4,
                "Pooled allocation keeps scattered objects within fewer pages.",
                templates::POOL,
                templates::GUIDE_POOL,
                &[],
                false,
                None,
            ));
        }
        AccessPattern::GatherScatter => {
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::DataLayoutChange,
                50.0,
                0.85,
                6,
                "AoS to SoA removes the gather entirely for the hot fields.",
                templates::SOA,
                templates::GUIDE_SOA,
                &[],
                false,
                None,
            ));
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::PrefetchHints,
                20.0,
                0.6,
                3,
                "Gather indices can be prefetched one iteration ahead.",
                templates::PREFETCH_GATHER,
                templates::GUIDE_PREFETCH,
                &[],
                true,
                None,
            ));
        }
        AccessPattern::NestedLoop => {
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::AccessReorder,
                60.0,
                0.8,
                2,
                "Loop nest order doesn't match the array's storage order.",
                templates::REORDER,
                templates::GUIDE_REORDER,
                &[],
                false,
                None,
            ));
        }
        AccessPattern::Indirect => {
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::CacheBlocking,
                30.0,
                0.7,
                5,
                "Indirect indexing benefits from blocking the working set.",
                templates::BLOCKING,
                templates::GUIDE_BLOCKING,
                &[],
                false,
                None,
            ));
        }
        AccessPattern::LoopCarriedDep => {
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::LoopUnroll,
                25.0,
                0.65,
                3,
                "Unrolling breaks the dependency chain so iterations overlap.",
                templates::UNROLL,
                templates::GUIDE_UNROLL,
                &["-funroll-loops"],
                true,
                None,
            ));
        }
    }

    match classified.antipattern {
        Antipattern::Thrashing => {
            if let Some((l1_tile, l2_tile)) = tile_sizes(model) {
                recs.push(rec(
                    pattern_ref,
                    priority,
                    RecType::LoopTiling,
                    45.0,
                    0.8,
                    5,
                    "Working set exceeds cache capacity; tile to fit.",
                    templates::TILING,
                    templates::GUIDE_TILING,
                    &[],
                    false,
                    Some((l1_tile, l2_tile)),
                ));
            }
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::CacheBlocking,
                45.0,
                0.8,
                5,
                "Block the iteration space so each block fits in cache.",
                templates::BLOCKING,
                templates::GUIDE_BLOCKING,
                &[],
                false,
                None,
            ));
        }
        Antipattern::FalseSharing => {
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::MemoryAlignment,
                30.0,
                0.9,
                2,
                "Pad fields so independent writers don't share a cache line.",
                templates::ALIGN,
                templates::GUIDE_ALIGN,
                &[],
                true,
                None,
            ));
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::AccessReorder,
                40.0,
                0.85,
                4,
                "Move the contended field to thread-local storage.",
                templates::THREAD_LOCAL,
                templates::GUIDE_THREAD_LOCAL,
                &[],
                false,
                None,
            ));
        }
        Antipattern::StreamingEviction => {
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::PrefetchHints,
                20.0,
                0.75,
                3,
                "Streamed data isn't reused; use non-temporal store/prefetch hints.",
                templates::PREFETCH_NON_TEMPORAL,
                templates::GUIDE_PREFETCH,
                &["-fprefetch-loop-arrays"],
                true,
                None,
            ));
        }
        Antipattern::BankConflicts => {
            recs.push(rec(
                pattern_ref,
                priority,
                RecType::MemoryAlignment,
                20.0,
                0.7,
                2,
                "Pad the stride so concurrent accesses land in different banks.",
                templates::ALIGN_PAD,
                templates::GUIDE_ALIGN,
                &[],
                true,
                None,
            ));
        }
        Antipattern::HotspotReuse
        | Antipattern::IrregularGatherScatter
        | Antipattern::Uncoalesced
        | Antipattern::LoopCarriedDep => {}
    }

    if model.numa_nodes() > 1 {
        recs.push(rec(
            pattern_ref,
            priority,
            RecType::NumaBinding,
            25.0,
            0.7,
            4,
            "Multiple NUMA nodes are in play; bind the hot thread and its memory together.",
            templates::NUMA,
            templates::GUIDE_NUMA,
            &["--cpunodebind", "--membind"],
            true,
            None,
        ));
    }

    recs
}

/// Read-only template strings (spec §9: "long inline code templates ... are
/// data, not code"). One constant per `(antipattern/access-pattern,
/// rec_type)` combination that needs distinct wording.
mod templates {
    pub const VECTORIZE: &str = "#pragma omp simd\nfor (i = 0; i < n; i++) { out[i] = f(in[i]); }";
    pub const VECTORIZE_GATHER: &str =
        "#pragma omp simd\nfor (i = 0; i < n; i += stride) { out[i] = f(in[i]); }";
    pub const PREFETCH: &str = "__builtin_prefetch(&buf[i + PREFETCH_DISTANCE], 0, 3);";
    pub const PREFETCH_GATHER: &str = "__builtin_prefetch(&buf[idx[i + 1]], 0, 1);";
    pub const PREFETCH_NON_TEMPORAL: &str = "_mm_prefetch((char*)&buf[i], _MM_HINT_NTA);";
    pub const TILING: &str =
        "for (ii = 0; ii < n; ii += TILE) for (jj = 0; jj < n; jj += TILE) for (i = ii; i < ii + TILE; i++) for (j = jj; j < jj + TILE; j++) body(i, j);";
    pub const SOA: &str = "struct Particles { float* x; float* y; float* z; };";
    pub const POOL: &str = "let pool = Pool::with_capacity(n); let handle = pool.alloc(value);";
    pub const REORDER: &str = "for (j = 0; j < cols; j++) for (i = 0; i < rows; i++) body(i, j);";
    pub const BLOCKING: &str = "for (block = 0; block < n; block += BLOCK) process_block(block, BLOCK);";
    pub const UNROLL: &str = "for (i = 0; i < n; i += 4) { body(i); body(i+1); body(i+2); body(i+3); }";
    pub const ALIGN: &str = "struct Counter { u64 value; u8 _pad[56]; } __attribute__((aligned(64)));";
    pub const ALIGN_PAD: &str = "struct Bank { u32 value; u32 _pad[7]; };";
    pub const THREAD_LOCAL: &str = "thread_local! { static COUNTER: Cell<u64> = Cell::new(0); }";
    pub const NUMA: &str = "numactl --cpunodebind=$NODE --membind=$NODE -- ./program";

    pub const GUIDE_VECTORIZE: &str =
        "Verify the compiler's vectorization report confirms the loop was vectorized.";
    pub const GUIDE_PREFETCH: &str = "Tune the prefetch distance against measured miss latency.";
    pub const GUIDE_TILING: &str = "Pick a tile size that keeps one tile resident per cache level.";
    pub const GUIDE_SOA: &str = "Migrate field-by-field, starting with the hottest field.";
    pub const GUIDE_POOL: &str = "Size the pool from the hotspot's observed allocation count.";
    pub const GUIDE_REORDER: &str = "Swap loop headers so the innermost index matches the storage stride.";
    pub const GUIDE_BLOCKING: &str = "Choose a block size that fits the target cache level.";
    pub const GUIDE_UNROLL: &str = "Unroll by the dependency chain's latency-to-throughput ratio.";
    pub const GUIDE_ALIGN: &str = "Align to the line size reported by the cache model, not a fixed constant.";
    pub const GUIDE_THREAD_LOCAL: &str = "Merge thread-local partial results at a synchronization point.";
    pub const GUIDE_NUMA: &str = "Bind both the executing thread and its backing allocation to the same node.";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_model::{CacheKind, CacheLevel};
    use crate::classifier::PrimaryMissType;
    use crate::sample::SourceLocation;

    fn model(numa_nodes: u32) -> CacheModel {
        CacheModel::new(
            vec![
                CacheLevel {
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
                },
                CacheLevel {
                    level: 2,
                    kind: CacheKind::Unified,
                    size_bytes: 256 * 1024,
                    line_size_bytes: 64,
                    associativity: 8,
                    sets: 512,
                    latency_cycles: 12,
                    shared: false,
                    sharing_cpus: 1,
                    inclusive: false,
                },
            ],
            numa_nodes,
            4096,
            1 << 34,
        )
        .unwrap()
    }

    fn hotspot_with(function: &str, line: u32, pattern: AccessPattern) -> CacheHotspot {
        let sample = crate::sample::MissSample {
            instruction_addr: 0x1000,
            memory_addr: 0x1000,
            timestamp_ns: 0,
            cpu_id: 0,
            thread_id: 0,
            access_size: 8,
            is_write: false,
            latency_cycles: 200,
            missed_level: crate::sample::MissedLevel::L2,
            location: SourceLocation::new("f.c", function, line, 1),
        };
        let mut h = CacheHotspot::new(0x1000, &sample, 10);
        h.dominant_pattern = pattern;
        for _ in 0..9 {
            h.ingest(&sample);
        }
        h
    }

    fn classified_for(hotspot_ref: usize, antipattern: Antipattern) -> ClassifiedPattern {
        ClassifiedPattern {
            hotspot_ref,
            antipattern,
            severity_score: 80.0,
            confidence: 0.9,
            primary_miss_type: PrimaryMissType::Capacity,
            affected_levels_bitmask: 0b11,
            performance_impact: 70.0,
            description: String::new(),
            root_cause: String::new(),
            correlated_static: Vec::new(),
        }
    }

    #[test]
    fn sequential_pattern_yields_vectorize_and_prefetch() {
        let hotspot = hotspot_with("mmul", 40, AccessPattern::Sequential);
        let classified = classified_for(0, Antipattern::Uncoalesced);
        let recs = recommend_all(&[classified], &[hotspot], &model(1), &AnalysisConfig::default());
        assert!(recs.iter().any(|r| r.rec_type == RecType::LoopVectorize));
        assert!(recs.iter().any(|r| r.rec_type == RecType::PrefetchHints));
    }

    #[test]
    fn main_function_drops_loop_body_recommendations() {
        let hotspot = hotspot_with("main", 40, AccessPattern::Sequential);
        let classified = classified_for(0, Antipattern::Uncoalesced);
        let recs = recommend_all(&[classified], &[hotspot], &model(1), &AnalysisConfig::default());
        assert!(recs.iter().all(|r| r.rec_type != RecType::LoopVectorize));
    }

    #[test]
    fn numa_binding_only_emitted_for_multi_node_machines() {
        let hotspot = hotspot_with("compute", 40, AccessPattern::Sequential);
        let classified = classified_for(0, Antipattern::Uncoalesced);
        let single = recommend_all(&[classified.clone()], &[hotspot.clone()], &model(1), &AnalysisConfig::default());
        assert!(single.iter().all(|r| r.rec_type != RecType::NumaBinding));

        let classified2 = classified_for(0, Antipattern::Uncoalesced);
        let multi = recommend_all(&[classified2], &[hotspot], &model(4), &AnalysisConfig::default());
        assert!(multi.iter().any(|r| r.rec_type == RecType::NumaBinding));
    }

    #[test]
    fn dedup_keeps_best_loop_vectorize_per_function() {
        let recs = vec![
            rec(0, 1, RecType::LoopVectorize, 40.0, 0.9, 3, "a", "t", "g", &[], true, None),
            rec(1, 1, RecType::LoopVectorize, 55.0, 0.9, 3, "b", "t", "g", &[], true, None),
            rec(2, 1, RecType::LoopVectorize, 35.0, 0.9, 3, "c", "t", "g", &[], true, None),
        ];
        let hotspots = vec![
            hotspot_with("compute", 10, AccessPattern::Sequential),
            hotspot_with("compute", 11, AccessPattern::Sequential),
            hotspot_with("compute", 12, AccessPattern::Sequential),
        ];
        let classified: Vec<ClassifiedPattern> = (0..3)
            .map(|i| classified_for(i, Antipattern::Uncoalesced))
            .collect();
        let survivors = dedup_phase_b(recs, &classified, &hotspots);
        assert_eq!(survivors.len(), 1);
        assert!((survivors[0].expected_improvement_pct - 55.0).abs() < 1e-9);
        assert_eq!(survivors[0].priority, 1);
    }

    #[test]
    fn tile_size_matches_l1_budget() {
        assert_eq!(tile_sizes(&model(1)), Some((32, 104)));
    }
}
