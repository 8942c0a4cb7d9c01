//! Raw input records: `SourceLocation` and `MissSample` (spec §3).

use serde::{Deserialize, Serialize};

/// A source position. Equality is `(file, line)` only — function and column
/// are carried for display but don't participate in dedup/correlation keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub function: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, function: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            function: function.into(),
            line,
            column,
        }
    }
}

impl PartialEq for SourceLocation {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file && self.line == other.line
    }
}
impl Eq for SourceLocation {}

/// Which cache level a sample's access missed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissedLevel {
    L1,
    L2,
    L3,
    Llc,
}

impl MissedLevel {
    /// 1-based index matching `CacheHotspot::level_counts`. `L3` and `Llc`
    /// share slot 3: a cache model's last-level cache is conventionally L3,
    /// and a sampler may tag the same physical miss either way, so both
    /// must land in the slot `classifier::level_counts_index` reads back for
    /// that model's top level — see DESIGN.md.
    pub fn index(self) -> usize {
        match self {
            MissedLevel::L1 => 1,
            MissedLevel::L2 => 2,
            MissedLevel::L3 | MissedLevel::Llc => 3,
        }
    }
}

/// One observation of a cache miss. Immutable after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissSample {
    pub instruction_addr: u64,
    pub memory_addr: u64,
    pub timestamp_ns: u64,
    pub cpu_id: u32,
    pub thread_id: u32,
    pub access_size: u32,
    pub is_write: bool,
    pub latency_cycles: u32,
    pub missed_level: MissedLevel,
    /// Source location attached by the (external) symbol resolver. Carried
    /// on the sample itself since the core doesn't resolve addresses.
    pub location: SourceLocation,
}
