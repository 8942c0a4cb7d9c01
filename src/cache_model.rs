//! Cache-Model View (C1): a read-only snapshot of the machine's cache
//! hierarchy, supplied by the external hardware-detection subsystem.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Kind of cache level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKind {
    Data,
    Instruction,
    Unified,
}

/// One level of the cache hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLevel {
    pub level: u8,
    pub kind: CacheKind,
    pub size_bytes: u64,
    pub line_size_bytes: u32,
    pub associativity: u32,
    pub sets: u32,
    pub latency_cycles: u32,
    pub shared: bool,
    pub sharing_cpus: u32,
    pub inclusive: bool,
}

/// Read-only descriptor of the machine's cache hierarchy. Produced by the
/// external Hardware subsystem; the core never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheModel {
    levels: Vec<CacheLevel>,
    numa_nodes: u32,
    page_size: u64,
    total_memory: u64,
}

impl CacheModel {
    /// Builds a model after validating spec §7's `InconsistentCacheModel`
    /// conditions: at least one level, all sizes positive.
    pub fn new(
        levels: Vec<CacheLevel>,
        numa_nodes: u32,
        page_size: u64,
        total_memory: u64,
    ) -> Result<Self> {
        if levels.is_empty() {
            return Err(CoreError::InconsistentCacheModel(
                "cache model must have at least one level".into(),
            ));
        }
        for level in &levels {
            if level.size_bytes == 0 || level.line_size_bytes == 0 || level.associativity == 0 {
                return Err(CoreError::InconsistentCacheModel(format!(
                    "level {} has a non-positive size/line_size/associativity",
                    level.level
                )));
            }
        }
        Ok(Self {
            levels,
            numa_nodes,
            page_size,
            total_memory,
        })
    }

    pub fn levels(&self) -> &[CacheLevel] {
        &self.levels
    }

    pub fn level(&self, level: u8) -> Option<&CacheLevel> {
        self.levels.iter().find(|l| l.level == level)
    }

    pub fn l1(&self) -> Option<&CacheLevel> {
        self.level(1)
    }

    pub fn l2(&self) -> Option<&CacheLevel> {
        self.level(2)
    }

    pub fn l3(&self) -> Option<&CacheLevel> {
        self.level(3)
    }

    pub fn numa_nodes(&self) -> u32 {
        self.numa_nodes
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}
